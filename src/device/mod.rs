// Device engine: one worker per monitored host, driven by the platform
// through a DeviceHandle and reporting back through a DeviceSink.

mod action;
mod poll;
mod worker;

pub use action::{Action, ActionOutput, handle_action};
pub use poll::PollContext;
pub use worker::{DeviceClient, DeviceDeps, DeviceHandle, spawn};

use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::Cadences;
use crate::session::{RemoteShell, SshShell, SshTarget};

/// Connection and cadence settings of one device.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub target: SshTarget,
    /// Fast (GPIO) cadence; disabled when `None`.
    pub polling_interval: Option<Duration>,
    pub polling_interval_slow: Duration,
}

impl DeviceSettings {
    pub fn cadences(&self) -> Cadences {
        Cadences {
            fast: self.polling_interval,
            slow: self.polling_interval_slow,
        }
    }
}

/// Builds the transport for a device; swapped for scripted shells in tests.
pub type ShellFactory = Arc<dyn Fn(&DeviceSettings) -> Arc<dyn RemoteShell> + Send + Sync>;

pub fn ssh_shell_factory() -> ShellFactory {
    Arc::new(|settings: &DeviceSettings| -> Arc<dyn RemoteShell> {
        Arc::new(SshShell::new(settings.target.clone()))
    })
}
