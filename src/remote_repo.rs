// Fetch + parse against one remote host. Polls go through silent_execute
// (a missing tool is "no data"), actions through execute.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;

use crate::commands::{self, ContainerVerb};
use crate::error::{ActionError, SessionError};
use crate::models::{
    ActiveUser, ContainerRecord, GpioState, LoginRecord, StatSnapshot, SystemIdentity,
};
use crate::parser::{self, IdentitySources};
use crate::session::Session;

#[derive(Clone)]
pub struct RemoteRepo {
    session: Arc<Session>,
}

impl RemoteRepo {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn fetch(&self, command: &str) -> Result<Option<String>, SessionError> {
        self.session.silent_execute(command).await
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "get_sys_info"))]
    pub async fn get_sys_info(&self) -> Result<SystemIdentity, SessionError> {
        let host_name = self.fetch(commands::HOST_NAME).await?;
        let os_arch = self.fetch(commands::OS_ARCH).await?;
        let cpu_info = self.fetch(commands::CPU_INFO).await?;
        let cpu_max_freq = self.fetch(commands::CPU_MAX_FREQ).await?;
        let os_release = self.fetch(commands::OS_RELEASE).await?;
        Ok(parser::parse_identity(&IdentitySources {
            host_name: host_name.as_deref(),
            os_arch: os_arch.as_deref(),
            cpu_info: cpu_info.as_deref(),
            cpu_max_freq: cpu_max_freq.as_deref(),
            os_release: os_release.as_deref(),
        }))
    }

    /// One stats sample. `identity` supplies the core count and max frequency
    /// that usage and scaling percentages are relative to.
    #[instrument(skip(self, identity), fields(repo = "remote", operation = "get_stats"))]
    pub async fn get_stats(
        &self,
        identity: &SystemIdentity,
        timestamp: DateTime<Utc>,
    ) -> Result<StatSnapshot, SessionError> {
        let mut snapshot = StatSnapshot::empty(timestamp);

        if let Some(line) = self
            .fetch(commands::UPTIME)
            .await?
            .as_deref()
            .and_then(parser::parse_uptime)
        {
            snapshot.cpu_usage = identity
                .processor_count
                .and_then(|n| parser::cpu_usage_percent(line.load_average, n));
            snapshot.uptime = Some(line.uptime);
            snapshot.users = Some(line.users);
            snapshot.load_average = Some(line.load_average);
        }
        snapshot.boot_date = self
            .fetch(commands::BOOT_DATE)
            .await?
            .as_deref()
            .and_then(parser::parse_boot_date);

        if let Some(raw) = self.fetch(commands::IFCONFIG_ETH0).await? {
            snapshot.eth0 = parser::parse_interface_counters(&raw);
        }
        if let Some(raw) = self.fetch(commands::IFCONFIG_WLAN0).await? {
            snapshot.wlan0 = parser::parse_interface_counters(&raw);
        }

        snapshot.gpu_temp = self
            .fetch(commands::GPU_TEMP)
            .await?
            .as_deref()
            .and_then(parser::parse_gpu_temp);
        snapshot.cpu_temp = self
            .fetch(commands::CPU_TEMP)
            .await?
            .as_deref()
            .and_then(parser::parse_cpu_temp);

        let cur_freq = self
            .fetch(commands::CPU_CUR_FREQ)
            .await?
            .as_deref()
            .and_then(parser::parse_frequency);
        snapshot.cpu_scaling = match (cur_freq, identity.cpu_max_frequency) {
            (Some(cur), Some(max)) => parser::cpu_scaling_percent(cur, max),
            _ => None,
        };

        snapshot.mem_usage = self
            .fetch(commands::MEMORY)
            .await?
            .as_deref()
            .and_then(parser::parse_mem_usage);
        snapshot.storage_usage = self
            .fetch(commands::STORAGE)
            .await?
            .as_deref()
            .and_then(parser::parse_storage_usage);
        snapshot.processes = self
            .fetch(commands::PROCESSES)
            .await?
            .as_deref()
            .and_then(parser::parse_processes);

        Ok(snapshot)
    }

    /// `None` when `raspi-gpio` is unavailable.
    #[instrument(skip(self), fields(repo = "remote", operation = "get_gpio_states"))]
    pub async fn get_gpio_states(&self) -> Result<Option<GpioState>, SessionError> {
        Ok(self
            .fetch(commands::GPIO_GET)
            .await?
            .map(|raw| parser::parse_gpio_states(&raw)))
    }

    /// `None` when `last` failed; the caller must not treat that as an empty log.
    #[instrument(skip(self), fields(repo = "remote", operation = "get_last_logins"))]
    pub async fn get_last_logins(&self) -> Result<Option<Vec<LoginRecord>>, SessionError> {
        Ok(self
            .fetch(commands::LAST_LOGINS)
            .await?
            .map(|raw| parser::parse_last_logins(&raw)))
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "get_users"))]
    pub async fn get_users(&self) -> Result<Vec<ActiveUser>, ActionError> {
        let raw = self.session.execute(commands::USERS).await?;
        Ok(parser::parse_active_users(&raw))
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "get_containers"))]
    pub async fn get_containers(&self) -> Result<Vec<ContainerRecord>, ActionError> {
        let raw = self.session.execute(commands::CONTAINER_LIST).await?;
        Ok(parser::parse_containers(&raw))
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "container"))]
    pub async fn container(&self, verb: ContainerVerb, id: &str) -> Result<(), ActionError> {
        let command = commands::container(verb, id)?;
        self.session.execute(&command).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "set_gpio"))]
    pub async fn set_gpio(&self, pin: u8, high: bool) -> Result<(), ActionError> {
        let command = commands::gpio_set(pin, high)?;
        self.session.execute(&command).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "reboot"))]
    pub async fn reboot(&self) -> Result<(), ActionError> {
        self.session.execute(commands::REBOOT).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "power_off"))]
    pub async fn power_off(&self) -> Result<(), ActionError> {
        self.session.execute(commands::POWER_OFF).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "remote", operation = "system_update"))]
    pub async fn system_update(&self) -> Result<String, ActionError> {
        Ok(self.session.execute(commands::SYSTEM_UPDATE).await?)
    }

    /// Arbitrary command from the platform user; output is returned as-is.
    #[instrument(skip(self), fields(repo = "remote", operation = "run_command"))]
    pub async fn run_command(&self, command: &str) -> Result<String, ActionError> {
        if command.trim().is_empty() {
            return Err(ActionError::InvalidArgument("command is empty".into()));
        }
        Ok(self.session.execute(command).await?)
    }
}
