// uptime, thermal, cpufreq, free, df, ps and ifconfig parsing

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

use super::{non_empty, round_half_up};
use crate::models::{InterfaceCounters, ProcessCounts};

static UPTIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"up\s+((\d+\s+days?,\s+)?(\d+:\d+|\d+\s+min)),\s+(\d+)\s+users?,\s+load\s+average:\s+(\d+\.\d+)",
    )
    .expect("static regex is valid")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("static regex is valid"));
static RX_BYTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RX\s+(?:packets\s+\d+\s+)?bytes[:\s]+(\d+)").expect("static regex is valid")
});
static TX_BYTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TX\s+(?:packets\s+\d+\s+)?bytes[:\s]+(\d+)").expect("static regex is valid")
});

/// Fields of the `uptime` line.
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeLine {
    /// Free text, e.g. "1 day, 17 min" or "3:42".
    pub uptime: String,
    pub users: u32,
    /// 1-minute load average.
    pub load_average: f64,
}

/// `14:03:55 up 58 min,  2 users,  load average: 0.17, 0.14, 0.15`
pub fn parse_uptime(raw: &str) -> Option<UptimeLine> {
    let text = non_empty(Some(raw))?;
    let caps = UPTIME_RE.captures(text)?;
    Some(UptimeLine {
        uptime: caps.get(1)?.as_str().trim().to_string(),
        users: caps.get(4)?.as_str().parse().ok()?,
        load_average: caps.get(5)?.as_str().parse().ok()?,
    })
}

/// Load relative to core count, in percent, clamped to 0..=100.
pub fn cpu_usage_percent(load_average: f64, processors: u32) -> Option<f64> {
    if processors == 0 || !load_average.is_finite() {
        return None;
    }
    Some((100.0 * load_average / processors as f64).clamp(0.0, 100.0))
}

/// `uptime -s`: `2024-08-03 13:05:26`
pub fn parse_boot_date(raw: &str) -> Option<NaiveDateTime> {
    let text = non_empty(Some(raw))?;
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok()
}

/// `thermal_zone0/temp` reports millidegrees (`51608` is 51.608 °C).
pub fn parse_cpu_temp(raw: &str) -> Option<f64> {
    let milli: f64 = non_empty(Some(raw))?.parse().ok()?;
    Some(milli / 1000.0)
}

/// `vcgencmd measure_temp`: `temp=50.1'C`
pub fn parse_gpu_temp(raw: &str) -> Option<f64> {
    let text = non_empty(Some(raw))?;
    NUMBER_RE.find(text)?.as_str().parse().ok()
}

/// A bare frequency in kHz, as found in `scaling_cur_freq` / `scaling_max_freq`.
pub fn parse_frequency(raw: &str) -> Option<u64> {
    non_empty(Some(raw))?.parse().ok()
}

pub fn cpu_scaling_percent(current: u64, max: u64) -> Option<f64> {
    if max == 0 {
        return None;
    }
    Some(round_half_up(100.0 * current as f64 / max as f64))
}

/// `free`: second line, column 1 is total and column 6 is available.
pub fn parse_mem_usage(raw: &str) -> Option<f64> {
    let text = non_empty(Some(raw))?;
    let line = text.lines().nth(1)?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    let total: f64 = cols.get(1)?.parse().ok()?;
    let available: f64 = cols.get(6)?.parse().ok()?;
    if total <= 0.0 {
        return None;
    }
    Some(round_half_up(100.0 - (available / total) * 100.0))
}

/// `df /`: second line, column 4 is `Use%`.
pub fn parse_storage_usage(raw: &str) -> Option<f64> {
    let text = non_empty(Some(raw))?;
    let line = text.lines().nth(1)?;
    let used = line.split_whitespace().nth(4)?;
    used.trim_end_matches('%').parse().ok()
}

/// `ps ax`: STAT column starting with `R` is running (and active), `S` is active.
pub fn parse_processes(raw: &str) -> Option<ProcessCounts> {
    let text = non_empty(Some(raw))?;
    let mut counts = ProcessCounts::default();
    for line in text.lines().skip(1) {
        counts.total += 1;
        let Some(stat) = line.split_whitespace().nth(2) else {
            continue;
        };
        if stat.starts_with('R') {
            counts.running += 1;
            counts.active += 1;
        }
        if stat.starts_with('S') {
            counts.active += 1;
        }
    }
    Some(counts)
}

/// `ifconfig <iface>` in both the net-tools 1.x and 2.x layouts.
/// Missing counters stay at 0.
pub fn parse_interface_counters(raw: &str) -> InterfaceCounters {
    let Some(text) = non_empty(Some(raw)) else {
        return InterfaceCounters::default();
    };
    let grab = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    InterfaceCounters {
        rx_bytes: grab(&RX_BYTES_RE),
        tx_bytes: grab(&TX_BYTES_RE),
    }
}
