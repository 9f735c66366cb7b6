// Login/logout detection between two fetches of the rotating `last` log.
//
// Best-effort: two logins (or logouts) between polls collapse to the net
// state, and the ring buffer can push entries out between fetches.

use crate::models::LoginRecord;

/// Sessions that appeared and disappeared between two log fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogsDelta {
    pub new_users: Vec<LoginRecord>,
    pub gone_users: Vec<LoginRecord>,
}

impl LogsDelta {
    pub fn is_empty(&self) -> bool {
        self.new_users.is_empty() && self.gone_users.is_empty()
    }
}

fn still_logged_in(log: &[LoginRecord]) -> Vec<&LoginRecord> {
    log.iter().filter(|r| r.is_open()).collect()
}

fn contains_session(list: &[&LoginRecord], record: &LoginRecord) -> bool {
    list.iter().any(|r| r.same_session(record))
}

/// Both logs are most-recent-first.
///
/// Each new session is assumed to push one entry out of the bottom of the
/// window, so the oldest `new_users.len()` entries of `old_log` are dropped
/// before looking for departures. Otherwise a session that merely scrolled
/// out of the window would be reported as logged out.
pub fn find_logs_delta(old_log: &[LoginRecord], new_log: &[LoginRecord]) -> LogsDelta {
    let open_new = still_logged_in(new_log);
    let open_old = still_logged_in(old_log);

    let new_users: Vec<LoginRecord> = open_new
        .iter()
        .filter(|r| !contains_session(&open_old, r))
        .map(|r| (*r).clone())
        .collect();

    let open_old = if new_users.is_empty() {
        open_old
    } else {
        let keep = old_log.len().saturating_sub(new_users.len());
        still_logged_in(&old_log[..keep])
    };

    let gone_users = open_old
        .into_iter()
        .filter(|r| !contains_session(&open_new, r))
        .map(|gone| {
            // The new log may already carry the logout line for this session.
            new_log
                .iter()
                .find(|r| r.same_session(gone))
                .unwrap_or(gone)
                .clone()
        })
        .collect();

    LogsDelta {
        new_users,
        gone_users,
    }
}

/// Holds the previously fetched log and swaps it for each new fetch.
#[derive(Debug, Default)]
pub struct LoginTracker {
    retained: Option<Vec<LoginRecord>>,
}

impl LoginTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta against the retained log, then retains `new_log` wholesale.
    /// The first call only primes the tracker.
    pub fn update(&mut self, new_log: Vec<LoginRecord>) -> LogsDelta {
        let delta = match self.retained.as_deref() {
            Some(old_log) => find_logs_delta(old_log, &new_log),
            None => LogsDelta::default(),
        };
        self.retained = Some(new_log);
        delta
    }

    pub fn retained(&self) -> Option<&[LoginRecord]> {
        self.retained.as_deref()
    }

    /// Forget the retained log so the next fetch only primes again.
    pub fn reset(&mut self) {
        self.retained = None;
    }
}
