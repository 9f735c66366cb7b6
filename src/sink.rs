// Seam between the engine and the host platform.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::models::{CapabilityValue, DeviceEvent, SystemIdentity};

/// Everything a device engine reports to the platform. One sink per device.
#[async_trait]
pub trait DeviceSink: Send + Sync {
    /// Replaces the capability list, in display order.
    async fn register_capabilities(&self, keys: &[String]);
    async fn set_capability(&self, key: &str, value: CapabilityValue) -> Result<(), SinkError>;
    async fn trigger(&self, event: DeviceEvent);
    async fn set_available(&self, available: bool, reason: Option<&str>);
    async fn update_identity(&self, identity: &SystemIdentity);
}
