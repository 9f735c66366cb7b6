// Realtime resource statistics of the remote host

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Byte counters of one interface. Both stay 0 when the interface is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCounts {
    pub total: u32,
    pub active: u32,
    pub running: u32,
}

/// One slow-poll sample. Every metric is optional: a failed or unparseable
/// command leaves its field empty instead of failing the poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Remote local time as printed by `uptime -s`.
    pub boot_date: Option<NaiveDateTime>,
    pub uptime: Option<String>,
    pub users: Option<u32>,
    pub load_average: Option<f64>,
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub cpu_scaling: Option<f64>,
    pub mem_usage: Option<f64>,
    pub storage_usage: Option<f64>,
    pub processes: Option<ProcessCounts>,
    pub eth0: InterfaceCounters,
    pub wlan0: InterfaceCounters,
}

impl StatSnapshot {
    /// Empty snapshot taken at `timestamp`.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            boot_date: None,
            uptime: None,
            users: None,
            load_average: None,
            cpu_temp: None,
            gpu_temp: None,
            cpu_usage: None,
            cpu_scaling: None,
            mem_usage: None,
            storage_usage: None,
            processes: None,
            eth0: InterfaceCounters::default(),
            wlan0: InterfaceCounters::default(),
        }
    }
}
