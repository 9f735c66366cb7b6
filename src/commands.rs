// Shell commands issued to the remote host, verbatim.
// Anything interpolated into a command line is validated first.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ActionError;
use crate::models::MAX_PIN;

pub const CPU_INFO: &str = "cat /proc/cpuinfo";
pub const OS_RELEASE: &str = "cat /etc/os-release";
pub const OS_ARCH: &str = "uname -m";
pub const HOST_NAME: &str = "uname -n";
pub const UPTIME: &str = "uptime";
pub const BOOT_DATE: &str = "uptime -s";
pub const IFCONFIG_WLAN0: &str = "/sbin/ifconfig wlan0";
pub const IFCONFIG_ETH0: &str = "/sbin/ifconfig eth0";
pub const GPU_TEMP: &str = "vcgencmd measure_temp";
pub const CPU_TEMP: &str = "cat /sys/class/thermal/thermal_zone0/temp";
pub const CPU_CUR_FREQ: &str = "cat /sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";
pub const CPU_MAX_FREQ: &str = "cat /sys/devices/system/cpu/cpu0/cpufreq/scaling_max_freq";
pub const MEMORY: &str = "free";
pub const STORAGE: &str = "df /";
pub const PROCESSES: &str = "ps ax";
pub const USERS: &str = "w";
pub const LAST_LOGINS: &str = "last -10 --time-format iso";
pub const REBOOT: &str = "sudo systemctl reboot";
pub const POWER_OFF: &str = "sudo systemctl poweroff";
pub const SYSTEM_UPDATE: &str = "sudo apt-get update && sudo apt-get upgrade -y";
pub const GPIO_GET: &str = "raspi-gpio get";
pub const CONTAINER_LIST: &str = "sudo docker ps -a";

static CONTAINER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVerb {
    Start,
    Stop,
    Restart,
}

impl ContainerVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerVerb::Start => "start",
            ContainerVerb::Stop => "stop",
            ContainerVerb::Restart => "restart",
        }
    }
}

pub fn validate_pin(pin: u8) -> Result<u8, ActionError> {
    if pin > MAX_PIN {
        return Err(ActionError::InvalidArgument(format!(
            "GPIO pin must be 0-{MAX_PIN}, got {pin}"
        )));
    }
    Ok(pin)
}

pub fn gpio_set(pin: u8, high: bool) -> Result<String, ActionError> {
    let pin = validate_pin(pin)?;
    let level = if high { "dh" } else { "dl" };
    Ok(format!("raspi-gpio set {pin} {level}"))
}

pub fn container(verb: ContainerVerb, id: &str) -> Result<String, ActionError> {
    if !CONTAINER_ID_RE.is_match(id) {
        return Err(ActionError::InvalidArgument(format!(
            "invalid container id: {id:?}"
        )));
    }
    Ok(format!("sudo docker {} {id}", verb.as_str()))
}
