// Static identity of the remote host

use serde::{Deserialize, Serialize};

/// Fetched once per boot and re-validated hourly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemIdentity {
    pub host_name: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub serial_number: Option<String>,
    pub processor_count: Option<u32>,
    /// kHz, from `scaling_max_freq`.
    pub cpu_max_frequency: Option<u64>,
    pub os_arch: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
}

impl SystemIdentity {
    /// Names of fields whose values differ from `other`.
    pub fn changed_fields(&self, other: &SystemIdentity) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.host_name != other.host_name {
            changed.push("hostName");
        }
        if self.model != other.model {
            changed.push("model");
        }
        if self.revision != other.revision {
            changed.push("revision");
        }
        if self.serial_number != other.serial_number {
            changed.push("serialNumber");
        }
        if self.processor_count != other.processor_count {
            changed.push("processorCount");
        }
        if self.cpu_max_frequency != other.cpu_max_frequency {
            changed.push("cpuMaxFrequency");
        }
        if self.os_arch != other.os_arch {
            changed.push("osArch");
        }
        if self.os_name != other.os_name {
            changed.push("osName");
        }
        if self.os_version != other.os_version {
            changed.push("osVersion");
        }
        changed
    }
}
