// Remote session: one connection per device, reconnect on demand.

mod ssh;

pub use ssh::{SshShell, SshTarget};

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::SessionError;

/// Result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Transport capability the session is built on.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn connect(&self) -> Result<(), SessionError>;
    /// Must be safe to call when not connected.
    async fn disconnect(&self);
    /// Only connection-level failures are errors; a non-zero exit is a
    /// successful `ExecOutput`.
    async fn exec(&self, command: &str) -> Result<ExecOutput, SessionError>;
}

pub struct Session {
    shell: Arc<dyn RemoteShell>,
    connected: AtomicBool,
    connect_lock: Mutex<()>,
}

impl Session {
    pub fn new(shell: Arc<dyn RemoteShell>) -> Self {
        Self {
            shell,
            connected: AtomicBool::new(false),
            connect_lock: Mutex::new(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Tears down any previous connection, then connects.
    #[instrument(skip(self), fields(operation = "connect"))]
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _guard = self.connect_lock.lock().await;
        self.reconnect_locked().await
    }

    async fn reconnect_locked(&self) -> Result<(), SessionError> {
        self.connected.store(false, Ordering::Release);
        self.shell.disconnect().await;
        self.shell.connect().await?;
        self.connected.store(true, Ordering::Release);
        debug!("session connected");
        Ok(())
    }

    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        self.shell.disconnect().await;
        self.connected.store(false, Ordering::Release);
    }

    /// Runs `command`, reconnecting first (once) if the session is down.
    pub async fn execute(&self, command: &str) -> Result<String, SessionError> {
        if !self.is_connected() {
            let _guard = self.connect_lock.lock().await;
            if !self.is_connected() {
                self.reconnect_locked().await?;
            }
        }

        let output = match self.shell.exec(command).await {
            Ok(o) => o,
            Err(e) => {
                if e.is_connection() {
                    self.connected.store(false, Ordering::Release);
                }
                return Err(e);
            }
        };
        if output.exit_code != 0 {
            return Err(SessionError::RemoteExec {
                command: command.to_string(),
                code: output.exit_code,
                output: format!("{}{}", output.stderr, output.stdout).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Like [`Session::execute`], but a non-zero exit yields `Ok(None)`.
    /// Connection failures still propagate.
    pub async fn silent_execute(&self, command: &str) -> Result<Option<String>, SessionError> {
        match self.execute(command).await {
            Ok(stdout) => Ok(Some(stdout)),
            Err(SessionError::RemoteExec { code, .. }) => {
                debug!(command, code, "command returned no data");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
