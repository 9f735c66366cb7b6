// One device's poll state and the work of a single cycle.
// The context is moved into the cycle task and handed back when it ends.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::delta::LoginTracker;
use crate::error::SessionError;
use crate::models::{GpioState, StatSnapshot, SystemIdentity};
use crate::projector::{
    apply_writes, capability_catalog, next_timestamp, project_gpio, project_logins, project_stats,
};
use crate::remote_repo::RemoteRepo;
use crate::scheduler::{CycleOutcome, PollPlan};
use crate::sink::DeviceSink;

pub struct PollContext {
    pub(crate) device_id: String,
    pub(crate) repo: RemoteRepo,
    pub(crate) sink: Arc<dyn DeviceSink>,
    pub(crate) identity: SystemIdentity,
    pub(crate) last_stats: Option<StatSnapshot>,
    /// Shared with action handlers answering `gpio_is_high`.
    pub(crate) last_gpio: Arc<RwLock<Option<GpioState>>>,
    pub(crate) logins: LoginTracker,
}

impl PollContext {
    pub fn new(
        device_id: impl Into<String>,
        repo: RemoteRepo,
        sink: Arc<dyn DeviceSink>,
        last_gpio: Arc<RwLock<Option<GpioState>>>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            repo,
            sink,
            identity: SystemIdentity::default(),
            last_stats: None,
            last_gpio,
            logins: LoginTracker::new(),
        }
    }

    /// Reconnects, fetches the identity and registers the capability list.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.repo.session().connect().await?;
        let identity = self.repo.get_sys_info().await?;
        info!(
            device = %self.device_id,
            host_name = identity.host_name.as_deref().unwrap_or("-"),
            model = identity.model.as_deref().unwrap_or("-"),
            "device initialized"
        );
        self.sink.update_identity(&identity).await;
        self.identity = identity;
        self.sink.register_capabilities(&capability_catalog()).await;
        self.sink.set_available(true, None).await;
        Ok(())
    }

    /// Slow, fast, then hourly work. Stops at the first connection error;
    /// parts finished before it still count as completed.
    pub async fn run_cycle(&mut self, plan: PollPlan) -> CycleOutcome {
        let mut completed = PollPlan::default();
        let result = async {
            if plan.slow {
                self.poll_slow().await?;
                completed.slow = true;
            }
            if plan.fast {
                self.poll_fast().await?;
                completed.fast = true;
            }
            if plan.hourly {
                self.poll_hourly().await?;
                completed.hourly = true;
            }
            Ok::<(), SessionError>(())
        }
        .await;

        if let Err(ref e) = result {
            warn!(device = %self.device_id, error = %e, operation = "poll", "poll cycle failed");
        }
        CycleOutcome {
            completed,
            failed: result.is_err(),
        }
    }

    async fn poll_slow(&mut self) -> Result<(), SessionError> {
        let timestamp = next_timestamp(self.last_stats.as_ref().map(|s| s.timestamp), Utc::now());
        let stats = self.repo.get_stats(&self.identity, timestamp).await?;
        let writes = project_stats(self.last_stats.as_ref(), &stats);
        apply_writes(self.sink.as_ref(), writes).await;
        self.last_stats = Some(stats);

        // A failed `last` leaves the retained log untouched.
        if let Some(log) = self.repo.get_last_logins().await? {
            let delta = self.logins.update(log);
            for event in project_logins(&delta) {
                info!(device = %self.device_id, event = event.kind(), "login change");
                self.sink.trigger(event).await;
            }
        }
        Ok(())
    }

    async fn poll_fast(&mut self) -> Result<(), SessionError> {
        let Some(gpio) = self.repo.get_gpio_states().await? else {
            return Ok(());
        };
        let (writes, events) = {
            let previous = self.last_gpio.read().await;
            project_gpio(previous.as_ref(), &gpio)
        };
        apply_writes(self.sink.as_ref(), writes).await;
        for event in events {
            self.sink.trigger(event).await;
        }
        *self.last_gpio.write().await = Some(gpio);
        Ok(())
    }

    async fn poll_hourly(&mut self) -> Result<(), SessionError> {
        let fresh = self.repo.get_sys_info().await?;
        let changed = fresh.changed_fields(&self.identity);
        if !changed.is_empty() {
            info!(device = %self.device_id, changed = ?changed, "system identity changed");
            self.sink.update_identity(&fresh).await;
            self.identity = fresh;
        }
        Ok(())
    }
}
