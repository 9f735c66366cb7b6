// Platform side: capability store per device, event fan-out and the set of
// running device workers.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, info};

use crate::config::{DeviceConfig, DeviceSettingsPatch};
use crate::device::{self, Action, ActionOutput, DeviceDeps, DeviceHandle, ShellFactory};
use crate::error::{ActionError, SinkError};
use crate::models::{CapabilityValue, DeviceEvent, EventEnvelope, SystemIdentity};
use crate::sink::DeviceSink;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityEntry {
    pub key: String,
    pub value: Option<CapabilityValue>,
}

/// What the platform currently knows about one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: String,
    pub name: String,
    pub available: bool,
    pub unavailable_reason: Option<String>,
    pub identity: Option<SystemIdentity>,
    pub capabilities: Vec<CapabilityEntry>,
}

/// Capability store and event sink of one device.
pub struct DeviceStore {
    view: RwLock<DeviceView>,
    events_tx: broadcast::Sender<EventEnvelope>,
    journal_tx: mpsc::Sender<EventEnvelope>,
}

impl DeviceStore {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        events_tx: broadcast::Sender<EventEnvelope>,
        journal_tx: mpsc::Sender<EventEnvelope>,
    ) -> Self {
        Self {
            view: RwLock::new(DeviceView {
                id: id.into(),
                name: name.into(),
                available: false,
                unavailable_reason: Some("waiting for connection".into()),
                identity: None,
                capabilities: Vec::new(),
            }),
            events_tx,
            journal_tx,
        }
    }

    pub async fn view(&self) -> DeviceView {
        self.view.read().await.clone()
    }

    pub async fn capability(&self, key: &str) -> Option<CapabilityValue> {
        let view = self.view.read().await;
        view.capabilities
            .iter()
            .find(|c| c.key == key)
            .and_then(|c| c.value.clone())
    }
}

#[async_trait]
impl DeviceSink for DeviceStore {
    async fn register_capabilities(&self, keys: &[String]) {
        let mut view = self.view.write().await;
        let previous = std::mem::take(&mut view.capabilities);
        view.capabilities = keys
            .iter()
            .map(|key| CapabilityEntry {
                key: key.clone(),
                value: previous
                    .iter()
                    .find(|c| &c.key == key)
                    .and_then(|c| c.value.clone()),
            })
            .collect();
    }

    async fn set_capability(&self, key: &str, value: CapabilityValue) -> Result<(), SinkError> {
        let mut view = self.view.write().await;
        let entry = view
            .capabilities
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| SinkError::UnknownCapability(key.to_string()))?;
        if let CapabilityValue::Number(n) = value
            && !n.is_finite()
        {
            return Err(SinkError::Rejected {
                key: key.to_string(),
                reason: format!("{n} is not a finite number"),
            });
        }
        entry.value = Some(value);
        Ok(())
    }

    async fn trigger(&self, event: DeviceEvent) {
        let envelope = EventEnvelope {
            device_id: self.view.read().await.id.clone(),
            created_at: Utc::now(),
            event,
        };
        if self.events_tx.send(envelope.clone()).is_err() {
            debug!(operation = "broadcast_event", "no /ws/events clients");
        }
        if self.journal_tx.send(envelope).await.is_err() {
            debug!("event journal channel closed");
        }
    }

    async fn set_available(&self, available: bool, reason: Option<&str>) {
        let mut view = self.view.write().await;
        view.available = available;
        view.unavailable_reason = if available {
            None
        } else {
            reason.map(str::to_string)
        };
    }

    async fn update_identity(&self, identity: &SystemIdentity) {
        self.view.write().await.identity = Some(identity.clone());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("invalid settings: {0}")]
    InvalidSettings(anyhow::Error),
}

struct ManagedDevice {
    config: DeviceConfig,
    store: Arc<DeviceStore>,
    handle: DeviceHandle,
}

/// All configured devices and their workers.
pub struct Hub {
    devices: RwLock<BTreeMap<String, ManagedDevice>>,
    events_tx: broadcast::Sender<EventEnvelope>,
    journal_tx: mpsc::Sender<EventEnvelope>,
    shell_factory: ShellFactory,
}

impl Hub {
    pub fn new(
        events_tx: broadcast::Sender<EventEnvelope>,
        journal_tx: mpsc::Sender<EventEnvelope>,
        shell_factory: ShellFactory,
    ) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            events_tx,
            journal_tx,
            shell_factory,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events_tx.subscribe()
    }

    /// Starts a worker for `config`.
    pub async fn add_device(&self, config: DeviceConfig) -> anyhow::Result<()> {
        config.validate()?;
        let mut devices = self.devices.write().await;
        anyhow::ensure!(
            !devices.contains_key(&config.id),
            "device {} already exists",
            config.id
        );
        let store = Arc::new(DeviceStore::new(
            config.id.clone(),
            config.name.clone(),
            self.events_tx.clone(),
            self.journal_tx.clone(),
        ));
        let handle = device::spawn(DeviceDeps {
            id: config.id.clone(),
            settings: config.settings(),
            shell_factory: self.shell_factory.clone(),
            sink: store.clone(),
        });
        info!(device = %config.id, host = %config.host, "device added");
        devices.insert(
            config.id.clone(),
            ManagedDevice {
                config,
                store,
                handle,
            },
        );
        Ok(())
    }

    /// Tears the device down; `false` if it was not known.
    pub async fn remove_device(&self, id: &str) -> bool {
        let removed = self.devices.write().await.remove(id);
        match removed {
            Some(device) => {
                device.handle.teardown().await;
                info!(device = %id, "device removed");
                true
            }
            None => false,
        }
    }

    pub async fn device_ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    pub async fn list(&self) -> Vec<DeviceView> {
        let stores: Vec<Arc<DeviceStore>> = self
            .devices
            .read()
            .await
            .values()
            .map(|d| d.store.clone())
            .collect();
        let mut views = Vec::with_capacity(stores.len());
        for store in stores {
            views.push(store.view().await);
        }
        views
    }

    pub async fn store(&self, id: &str) -> Option<Arc<DeviceStore>> {
        self.devices.read().await.get(id).map(|d| d.store.clone())
    }

    pub async fn view(&self, id: &str) -> Option<DeviceView> {
        let store = self.store(id).await?;
        Some(store.view().await)
    }

    pub async fn action(&self, id: &str, action: Action) -> Result<ActionOutput, HubError> {
        let client = self
            .devices
            .read()
            .await
            .get(id)
            .map(|d| d.handle.client().clone())
            .ok_or_else(|| HubError::UnknownDevice(id.to_string()))?;
        Ok(client.action(action).await?)
    }

    /// Validates the patched config and hands the new settings to the worker.
    pub async fn apply_settings(
        &self,
        id: &str,
        patch: &DeviceSettingsPatch,
    ) -> Result<DeviceConfig, HubError> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(id)
            .ok_or_else(|| HubError::UnknownDevice(id.to_string()))?;
        let next = device
            .config
            .patched(patch)
            .map_err(HubError::InvalidSettings)?;
        device.handle.client().apply_settings(next.settings()).await?;
        device.config = next.clone();
        Ok(next)
    }

    /// Stops every worker; teardowns run concurrently.
    pub async fn shutdown(&self) {
        let devices = std::mem::take(&mut *self.devices.write().await);
        let count = devices.len();
        join_all(devices.into_iter().map(|(id, device)| async move {
            device.handle.teardown().await;
            debug!(device = %id, "device stopped");
        }))
        .await;
        info!(devices = count, "all devices stopped");
    }
}
