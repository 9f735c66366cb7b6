// Capability values and discrete device events sent to the host platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LoginRecord;

/// A capability value as stored by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for CapabilityValue {
    fn from(v: bool) -> Self {
        CapabilityValue::Bool(v)
    }
}

impl From<f64> for CapabilityValue {
    fn from(v: f64) -> Self {
        CapabilityValue::Number(v)
    }
}

impl From<u32> for CapabilityValue {
    fn from(v: u32) -> Self {
        CapabilityValue::Number(v as f64)
    }
}

impl From<String> for CapabilityValue {
    fn from(v: String) -> Self {
        CapabilityValue::Text(v)
    }
}

/// A single capability update produced by the projector.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityWrite {
    pub key: String,
    pub value: CapabilityValue,
}

impl CapabilityWrite {
    pub fn new(key: impl Into<String>, value: impl Into<CapabilityValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Edge-triggered events; serialized as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    UserLoggedIn(LoginRecord),
    UserLoggedOut(LoginRecord),
    GpioWentHigh { pin: u8 },
    GpioWentLow { pin: u8 },
}

impl DeviceEvent {
    /// Stable name used for the event journal and flow triggers.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::UserLoggedIn(_) => "user_login",
            DeviceEvent::UserLoggedOut(_) => "user_logout",
            DeviceEvent::GpioWentHigh { .. } => "gpio_high",
            DeviceEvent::GpioWentLow { .. } => "gpio_low",
        }
    }
}

/// A device event as journaled and streamed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub event: DeviceEvent,
}
