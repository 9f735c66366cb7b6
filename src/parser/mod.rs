// Pure parsers: raw command stdout in, typed records out.
//
// Every parser is total. Missing or empty input yields an empty result and
// malformed lines leave fields absent; nothing here returns an error.

mod gpio;
mod identity;
mod login;
mod stats;
mod tables;

pub use gpio::parse_gpio_states;
pub use identity::{CpuInfo, IdentitySources, parse_cpu_info, parse_identity, parse_os_release};
pub use login::parse_last_logins;
pub use stats::{
    UptimeLine, cpu_scaling_percent, cpu_usage_percent, parse_boot_date, parse_cpu_temp,
    parse_frequency, parse_gpu_temp, parse_interface_counters, parse_mem_usage,
    parse_processes, parse_storage_usage, parse_uptime,
};
pub use tables::{parse_active_users, parse_containers};

/// Halves round towards positive infinity.
pub(crate) fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Trimmed text, or `None` when the command produced nothing.
fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
