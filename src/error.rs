// Error taxonomy of the core engine

/// Failures of the remote session. Everything except `RemoteExec` is a
/// connection-level failure that ends the current poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("not connected")]
    NotConnected,
    #[error("`{command}` exited with code {code}: {output}")]
    RemoteExec {
        command: String,
        code: i32,
        output: String,
    },
}

impl SessionError {
    pub fn is_connection(&self) -> bool {
        !matches!(self, SessionError::RemoteExec { .. })
    }
}

/// Failures of platform-invoked actions; propagated to the caller verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("device not ready")]
    DeviceNotReady,
    #[error("GPIO{0} state unknown")]
    StateUnknown(u8),
}

/// A capability write refused by the platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("capability {0} is not registered")]
    UnknownCapability(String),
    #[error("capability {key} rejected value: {reason}")]
    Rejected { key: String, reason: String },
}
