use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::DeviceSettings;
use crate::session::SshTarget;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    /// Journal writer flushes once this many events are buffered.
    pub flush_rate: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of device events kept in the broadcast channel for /ws/events (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (ws clients, events saved/pruned) at INFO level.
    pub stats_log_interval_secs: u64,
    /// How often to prune journal entries past retention.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_prune_interval_secs() -> u64 {
    3600
}

/// One monitored host.
#[derive(Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Fast (GPIO) poll; off when absent.
    #[serde(default)]
    pub polling_interval_secs: Option<u64>,
    pub polling_interval_slow_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    10
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("identity_file", &self.identity_file)
            .field("timeout_secs", &self.timeout_secs)
            .field("polling_interval_secs", &self.polling_interval_secs)
            .field("polling_interval_slow_secs", &self.polling_interval_slow_secs)
            .finish()
    }
}

/// Partial device update, as sent by the platform's settings dialog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettingsPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    /// `Some(0)` turns the fast poll off.
    pub polling_interval_secs: Option<u64>,
    pub polling_interval_slow_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettingsView {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub has_password: bool,
    pub identity_file: Option<PathBuf>,
    pub timeout_secs: u64,
    pub polling_interval_secs: Option<u64>,
    pub polling_interval_slow_secs: u64,
}

impl DeviceConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.id.is_empty(), "devices.id must be non-empty");
        // the id names the ssh control socket under the temp dir
        anyhow::ensure!(
            self.id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "devices.id may only contain ASCII letters, digits, '-' and '_', got {:?}",
            self.id
        );
        anyhow::ensure!(
            !self.host.is_empty(),
            "devices[{}].host must be non-empty",
            self.id
        );
        // ssh would read a leading '-' in the destination as an option
        anyhow::ensure!(
            !self.host.starts_with('-'),
            "devices[{}].host must not start with '-'",
            self.id
        );
        anyhow::ensure!(
            self.port > 0,
            "devices[{}].port must be between 1 and 65535, got {}",
            self.id,
            self.port
        );
        anyhow::ensure!(
            !self.username.is_empty(),
            "devices[{}].username must be non-empty",
            self.id
        );
        anyhow::ensure!(
            !self.username.starts_with('-'),
            "devices[{}].username must not start with '-'",
            self.id
        );
        anyhow::ensure!(
            self.timeout_secs > 0,
            "devices[{}].timeout_secs must be > 0, got {}",
            self.id,
            self.timeout_secs
        );
        anyhow::ensure!(
            self.polling_interval_secs != Some(0),
            "devices[{}].polling_interval_secs must be > 0 when set",
            self.id
        );
        anyhow::ensure!(
            self.polling_interval_slow_secs > 0,
            "devices[{}].polling_interval_slow_secs must be > 0, got {}",
            self.id,
            self.polling_interval_slow_secs
        );
        Ok(())
    }

    /// Applies a patch and validates the result; `self` is left untouched on error.
    pub fn patched(&self, patch: &DeviceSettingsPatch) -> anyhow::Result<DeviceConfig> {
        let mut next = self.clone();
        if let Some(ref host) = patch.host {
            next.host = host.clone();
        }
        if let Some(port) = patch.port {
            next.port = port;
        }
        if let Some(ref username) = patch.username {
            next.username = username.clone();
        }
        if let Some(ref password) = patch.password {
            next.password = (!password.is_empty()).then(|| password.clone());
        }
        if let Some(ref identity_file) = patch.identity_file {
            next.identity_file = Some(identity_file.clone());
        }
        if let Some(timeout_secs) = patch.timeout_secs {
            next.timeout_secs = timeout_secs;
        }
        if let Some(fast) = patch.polling_interval_secs {
            next.polling_interval_secs = (fast > 0).then_some(fast);
        }
        if let Some(slow) = patch.polling_interval_slow_secs {
            next.polling_interval_slow_secs = slow;
        }
        next.validate()?;
        Ok(next)
    }

    /// Settings as echoed back to clients; the password is never included.
    pub fn public_view(&self) -> DeviceSettingsView {
        DeviceSettingsView {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            has_password: self.password.is_some(),
            identity_file: self.identity_file.clone(),
            timeout_secs: self.timeout_secs,
            polling_interval_secs: self.polling_interval_secs,
            polling_interval_slow_secs: self.polling_interval_slow_secs,
        }
    }

    /// ControlMaster socket for this device.
    pub fn control_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("rpiwatch-{}.sock", self.id))
    }

    pub fn settings(&self) -> DeviceSettings {
        DeviceSettings {
            target: SshTarget {
                host: self.host.clone(),
                port: self.port,
                username: self.username.clone(),
                password: self.password.clone(),
                identity_file: self.identity_file.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
                control_path: self.control_path(),
            },
            polling_interval: self.polling_interval_secs.map(Duration::from_secs),
            polling_interval_slow: Duration::from_secs(self.polling_interval_slow_secs),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.flush_rate > 0,
            "database.flush_rate must be > 0, got {}",
            self.database.flush_rate
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.prune_interval_secs > 0,
            "monitoring.prune_interval_secs must be > 0, got {}",
            self.monitoring.prune_interval_secs
        );

        let mut seen = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            anyhow::ensure!(
                seen.insert(device.id.as_str()),
                "duplicate device id: {}",
                device.id
            );
        }
        Ok(())
    }
}
