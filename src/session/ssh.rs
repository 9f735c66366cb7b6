// OpenSSH transport: a ControlMaster per device, commands multiplexed over its socket.
//
// Password logins go through `sshpass -e` (password in SSHPASS, never argv).

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{ExecOutput, RemoteShell};
use crate::error::SessionError;

/// ssh's own exit status for connection and protocol errors.
const SSH_FAILURE_CODE: i32 = 255;
/// sshpass exit status for a rejected password.
const SSHPASS_WRONG_PASSWORD: i32 = 5;
const CONTROL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub timeout: Duration,
    /// Unix socket of the ControlMaster.
    pub control_path: PathBuf,
}

impl std::fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("identity_file", &self.identity_file)
            .field("timeout", &self.timeout)
            .field("control_path", &self.control_path)
            .finish()
    }
}

#[derive(Debug)]
pub struct SshShell {
    target: SshTarget,
}

impl SshShell {
    pub fn new(target: SshTarget) -> Self {
        Self { target }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.target.username, self.target.host)
    }

    fn log_path(&self) -> PathBuf {
        self.target.control_path.with_extension("log")
    }

    /// `ssh` with the shared options; wrapped in sshpass when `authenticate`
    /// is set and a password is configured.
    fn ssh_command(&self, authenticate: bool) -> Command {
        let mut cmd = match (&self.target.password, authenticate) {
            (Some(password), true) => {
                let mut c = Command::new("sshpass");
                c.arg("-e").arg("ssh");
                c.env("SSHPASS", password);
                c
            }
            _ => {
                let mut c = Command::new("ssh");
                c.arg("-o").arg("BatchMode=yes");
                c
            }
        };
        cmd.arg("-S")
            .arg(&self.target.control_path)
            .arg("-p")
            .arg(self.target.port.to_string())
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.target.timeout.as_secs().max(1)
            ))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new");
        if let Some(ref key) = self.target.identity_file {
            cmd.arg("-i").arg(key);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

fn classify_failure(message: &str) -> SessionError {
    let message = message.trim().to_string();
    if message.contains("Permission denied") || message.contains("Authentication failed") {
        SessionError::Auth(message)
    } else if message.contains("timed out") {
        SessionError::Timeout(message)
    } else {
        SessionError::Network(message)
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(&self) -> Result<(), SessionError> {
        // The master daemonizes (-f) and keeps its stdio, so errors go to a
        // log file instead of a pipe nobody would ever close.
        let log_path = self.log_path();
        let _ = tokio::fs::remove_file(&log_path).await;

        let mut cmd = self.ssh_command(true);
        cmd.arg("-M")
            .arg("-f")
            .arg("-N")
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg("-o")
            .arg("ServerAliveInterval=15")
            .arg("-o")
            .arg("LogLevel=ERROR")
            .arg("-E")
            .arg(&log_path)
            .arg(self.destination())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = match timeout(self.target.timeout, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(SessionError::Network(format!("failed to spawn ssh: {e}")));
            }
            Err(_) => {
                return Err(SessionError::Timeout(format!(
                    "connecting to {} took longer than {}s",
                    self.target.host,
                    self.target.timeout.as_secs()
                )));
            }
        };
        if status.success() {
            debug!(host = %self.target.host, "ssh control master started");
            return Ok(());
        }

        let log = tokio::fs::read_to_string(&log_path)
            .await
            .unwrap_or_default();
        if self.target.password.is_some() && status.code() == Some(SSHPASS_WRONG_PASSWORD) {
            return Err(SessionError::Auth(format!(
                "password rejected by {}",
                self.target.host
            )));
        }
        Err(classify_failure(if log.trim().is_empty() {
            "ssh exited without a diagnostic"
        } else {
            &log
        }))
    }

    async fn disconnect(&self) {
        let mut cmd = self.ssh_command(false);
        cmd.arg("-O")
            .arg("exit")
            .arg(self.destination())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Fails harmlessly when no master is running.
        let _ = timeout(CONTROL_EXIT_TIMEOUT, cmd.status()).await;
        let _ = tokio::fs::remove_file(self.log_path()).await;
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput, SessionError> {
        // Without the master socket ssh would silently open a fresh connection.
        if !tokio::fs::try_exists(&self.target.control_path)
            .await
            .unwrap_or(false)
        {
            return Err(SessionError::NotConnected);
        }
        let mut cmd = self.ssh_command(false);
        cmd.arg("-o")
            .arg("ControlMaster=no")
            .arg(self.destination())
            .arg("--")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match timeout(self.target.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SessionError::Network(format!("failed to spawn ssh: {e}")));
            }
            Err(_) => {
                return Err(SessionError::Timeout(format!(
                    "`{command}` took longer than {}s",
                    self.target.timeout.as_secs()
                )));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if exit_code == SSH_FAILURE_CODE {
            return Err(classify_failure(&stderr));
        }
        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ssh_diagnostics() {
        assert!(matches!(
            classify_failure("pi@10.0.0.5: Permission denied (publickey,password)."),
            SessionError::Auth(_)
        ));
        assert!(matches!(
            classify_failure("ssh: connect to host 10.0.0.5 port 22: Connection timed out"),
            SessionError::Timeout(_)
        ));
        assert!(matches!(
            classify_failure("ssh: connect to host 10.0.0.5 port 22: No route to host"),
            SessionError::Network(_)
        ));
    }

    #[test]
    fn debug_hides_password() {
        let target = SshTarget {
            host: "rpi4".into(),
            port: 22,
            username: "pi".into(),
            password: Some("hunter2".into()),
            identity_file: None,
            timeout: Duration::from_secs(10),
            control_path: PathBuf::from("/tmp/rpiwatch-test.sock"),
        };
        let printed = format!("{target:?}");
        assert!(!printed.contains("hunter2"));
    }
}
