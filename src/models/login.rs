// Login session log entries from `last --time-format iso`

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Info markers for sessions that ended without a logout line
/// ("gone - no logout", "down", "crash").
const ENDED_MARKERS: [&str; 3] = ["gone", "down", "crash"];

/// One session from the remote login log. `login_time` is the join key between
/// two fetches; tty and host are absent for non-terminal sessions (e.g. VNC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRecord {
    pub user: String,
    pub tty: Option<String>,
    pub host: Option<String>,
    pub login_time: DateTime<FixedOffset>,
    pub logout_time: Option<DateTime<FixedOffset>>,
    pub duration: Option<String>,
    pub info: String,
}

impl LoginRecord {
    /// Still logged in: no logout time and not reaped by a reboot or crash.
    pub fn is_open(&self) -> bool {
        self.logout_time.is_none() && !ENDED_MARKERS.iter().any(|m| self.info.contains(m))
    }

    pub fn same_session(&self, other: &LoginRecord) -> bool {
        self.login_time == other.login_time
    }
}
