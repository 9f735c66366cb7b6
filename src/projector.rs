// Snapshots in, capability writes and edge events out.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use crate::delta::LogsDelta;
use crate::models::{
    CapabilityValue, CapabilityWrite, DeviceEvent, EXPOSED_PIN_COUNT, GpioState, StatSnapshot,
};
use crate::parser::round_half_up;
use crate::sink::DeviceSink;

pub const GPU_TEMP: &str = "measure_temperature.gpu";
pub const CPU_TEMP: &str = "measure_temperature.cpu";
pub const CPU_UTILIZATION: &str = "meter_cpu_utilization";
pub const CPU_SCALING: &str = "meter_cpu_scaling";
pub const MEM_UTILIZATION: &str = "meter_mem_utilization";
pub const STORAGE_UTILIZATION: &str = "meter_storage_utilization";
pub const PROCESSES_ACTIVE: &str = "meter_processes.active";
pub const PROCESSES_RUNNING: &str = "meter_processes.running";
pub const UPTIME: &str = "uptime";
pub const USERS: &str = "meter_users";
pub const DOWNLOAD_ETH0: &str = "meter_download_speed.eth0";
pub const UPLOAD_ETH0: &str = "meter_upload_speed.eth0";
pub const DOWNLOAD_WLAN0: &str = "meter_download_speed.wlan0";
pub const UPLOAD_WLAN0: &str = "meter_upload_speed.wlan0";

const STAT_CAPABILITIES: [&str; 14] = [
    GPU_TEMP,
    CPU_TEMP,
    CPU_UTILIZATION,
    CPU_SCALING,
    MEM_UTILIZATION,
    STORAGE_UTILIZATION,
    PROCESSES_ACTIVE,
    PROCESSES_RUNNING,
    UPTIME,
    USERS,
    DOWNLOAD_ETH0,
    UPLOAD_ETH0,
    DOWNLOAD_WLAN0,
    UPLOAD_WLAN0,
];

pub fn gpio_capability(pin: u8) -> String {
    format!("onoff.gpio{pin}")
}

/// Capability keys in registration order: stats first, then `onoff.gpio0..15`.
pub fn capability_catalog() -> Vec<String> {
    STAT_CAPABILITIES
        .iter()
        .map(|k| k.to_string())
        .chain((0..EXPOSED_PIN_COUNT).map(gpio_capability))
        .collect()
}

/// `round(8 * Δbytes / Δms) / 1000`, never negative (counter resets give 0).
pub fn throughput(old_bytes: u64, new_bytes: u64, elapsed_ms: i64) -> f64 {
    if elapsed_ms <= 0 || new_bytes <= old_bytes {
        return 0.0;
    }
    let bits = 8.0 * (new_bytes - old_bytes) as f64;
    round_half_up(bits / elapsed_ms as f64) / 1000.0
}

/// Timestamp for the next snapshot: `now`, or 1 ms past the previous one if
/// the clock did not move forward.
pub fn next_timestamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + TimeDelta::milliseconds(1),
        _ => now,
    }
}

/// Writes for one stats sample. Absent metrics are not written; throughput
/// needs a previous sample taken strictly earlier.
pub fn project_stats(previous: Option<&StatSnapshot>, current: &StatSnapshot) -> Vec<CapabilityWrite> {
    let mut writes = Vec::with_capacity(STAT_CAPABILITIES.len());
    let mut put = |key: &str, value: Option<CapabilityValue>| {
        if let Some(value) = value {
            writes.push(CapabilityWrite::new(key, value));
        }
    };

    put(GPU_TEMP, current.gpu_temp.map(Into::into));
    put(CPU_TEMP, current.cpu_temp.map(Into::into));
    put(CPU_UTILIZATION, current.cpu_usage.map(Into::into));
    put(CPU_SCALING, current.cpu_scaling.map(Into::into));
    put(MEM_UTILIZATION, current.mem_usage.map(Into::into));
    put(STORAGE_UTILIZATION, current.storage_usage.map(Into::into));
    put(PROCESSES_ACTIVE, current.processes.map(|p| p.active.into()));
    put(PROCESSES_RUNNING, current.processes.map(|p| p.running.into()));
    put(UPTIME, current.uptime.clone().map(Into::into));
    put(USERS, current.users.map(Into::into));

    if let Some(prev) = previous {
        let elapsed_ms = (current.timestamp - prev.timestamp).num_milliseconds();
        if elapsed_ms > 0 {
            let rate = |old: u64, new: u64| -> Option<CapabilityValue> {
                Some(CapabilityValue::Number(throughput(old, new, elapsed_ms)))
            };
            put(DOWNLOAD_ETH0, rate(prev.eth0.rx_bytes, current.eth0.rx_bytes));
            put(UPLOAD_ETH0, rate(prev.eth0.tx_bytes, current.eth0.tx_bytes));
            put(DOWNLOAD_WLAN0, rate(prev.wlan0.rx_bytes, current.wlan0.rx_bytes));
            put(UPLOAD_WLAN0, rate(prev.wlan0.tx_bytes, current.wlan0.tx_bytes));
        }
    }
    writes
}

/// Level writes for every exposed pin present in `current`, plus one edge
/// event per exposed pin whose level differs from `previous`.
pub fn project_gpio(
    previous: Option<&GpioState>,
    current: &GpioState,
) -> (Vec<CapabilityWrite>, Vec<DeviceEvent>) {
    let mut writes = Vec::new();
    let mut events = Vec::new();
    for (&pin, state) in current.range(..EXPOSED_PIN_COUNT) {
        writes.push(CapabilityWrite::new(gpio_capability(pin), state.level));
        let Some(old) = previous.and_then(|p| p.get(&pin)) else {
            continue;
        };
        if old.level != state.level {
            events.push(if state.level {
                DeviceEvent::GpioWentHigh { pin }
            } else {
                DeviceEvent::GpioWentLow { pin }
            });
        }
    }
    (writes, events)
}

/// Logins first, then logouts.
pub fn project_logins(delta: &LogsDelta) -> Vec<DeviceEvent> {
    delta
        .new_users
        .iter()
        .cloned()
        .map(DeviceEvent::UserLoggedIn)
        .chain(delta.gone_users.iter().cloned().map(DeviceEvent::UserLoggedOut))
        .collect()
}

/// Applies every write; a rejected write is logged and skipped.
/// Returns the number of rejected writes.
pub async fn apply_writes(sink: &dyn DeviceSink, writes: Vec<CapabilityWrite>) -> usize {
    let mut failed = 0;
    for write in writes {
        if let Err(e) = sink.set_capability(&write.key, write.value).await {
            warn!(error = %e, capability = %write.key, "capability write failed");
            failed += 1;
        }
    }
    failed
}
