// /proc/cpuinfo, /etc/os-release and uname parsing

use regex::Regex;
use std::sync::LazyLock;

use super::non_empty;
use crate::models::SystemIdentity;

static PROCESSOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"processor\s+:").expect("static regex is valid"));
static REVISION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Revision\s+:\s+([^\n]+)").expect("static regex is valid"));
static SERIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Serial\s+:\s+([^\n]+)").expect("static regex is valid"));
static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Model\s+:\s+([^\n]+)").expect("static regex is valid"));
static OS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^NAME="([^"]+)""#).expect("static regex is valid"));
static OS_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"VERSION="([^"]+)""#).expect("static regex is valid"));

/// Fields of interest from `/proc/cpuinfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub processors: u32,
    pub revision: Option<String>,
    pub serial: Option<String>,
    pub model: Option<String>,
}

/// Raw outputs the identity is assembled from. `None` means the command failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySources<'a> {
    pub host_name: Option<&'a str>,
    pub os_arch: Option<&'a str>,
    pub cpu_info: Option<&'a str>,
    pub cpu_max_freq: Option<&'a str>,
    pub os_release: Option<&'a str>,
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_cpu_info(raw: &str) -> Option<CpuInfo> {
    let text = non_empty(Some(raw))?;
    Some(CpuInfo {
        processors: PROCESSOR_RE.find_iter(text).count() as u32,
        revision: first_capture(&REVISION_RE, text),
        serial: first_capture(&SERIAL_RE, text),
        model: first_capture(&MODEL_RE, text),
    })
}

/// Returns `(NAME, VERSION)` from `/etc/os-release`.
pub fn parse_os_release(raw: &str) -> (Option<String>, Option<String>) {
    match non_empty(Some(raw)) {
        Some(text) => (
            first_capture(&OS_NAME_RE, text),
            first_capture(&OS_VERSION_RE, text),
        ),
        None => (None, None),
    }
}

pub fn parse_identity(src: &IdentitySources<'_>) -> SystemIdentity {
    let cpu = src.cpu_info.and_then(parse_cpu_info);
    let (os_name, os_version) = src.os_release.map(parse_os_release).unwrap_or_default();
    SystemIdentity {
        host_name: non_empty(src.host_name).map(str::to_string),
        model: cpu.as_ref().and_then(|c| c.model.clone()),
        revision: cpu.as_ref().and_then(|c| c.revision.clone()),
        serial_number: cpu.as_ref().and_then(|c| c.serial.clone()),
        processor_count: cpu.as_ref().map(|c| c.processors),
        cpu_max_frequency: src.cpu_max_freq.and_then(super::parse_frequency),
        os_arch: non_empty(src.os_arch).map(str::to_string),
        os_name,
        os_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_model_line_wins() {
        let raw = "Model\t\t: Raspberry Pi 4 Model B Rev 1.1\nModel\t\t: Something else\n";
        let info = parse_cpu_info(raw).unwrap();
        assert_eq!(info.model.as_deref(), Some("Raspberry Pi 4 Model B Rev 1.1"));
        assert_eq!(info.processors, 0);
    }

    #[test]
    fn empty_cpuinfo_is_none() {
        assert!(parse_cpu_info("  \n").is_none());
    }
}
