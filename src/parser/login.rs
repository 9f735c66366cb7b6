// `last -10 --time-format iso` parsing

use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::models::LoginRecord;

// user, tty or blank, IPv4 host or blank, login time,
// optional "- logout (duration)", free text.
static LAST_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(\w+)\s+(pts/\d+|\s{3,})\s+(\d+\.\d+\.\d+\.\d+|\s{3,})\s+",
        r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2})",
        r"(?:\s+-\s+(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2})\s+\(((?:\d+\+)?\d{2}:\d{2})\))?",
        r"(.*)",
    ))
    .expect("static regex is valid")
});

fn blank_to_none(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_line(line: &str) -> Option<LoginRecord> {
    let caps = LAST_LINE_RE.captures(line)?;
    let login_time = DateTime::parse_from_rfc3339(caps.get(4)?.as_str()).ok()?;
    let logout_time = caps
        .get(5)
        .and_then(|m| DateTime::parse_from_rfc3339(m.as_str()).ok());
    Some(LoginRecord {
        user: caps.get(1)?.as_str().trim().to_string(),
        tty: caps.get(2).and_then(|m| blank_to_none(m.as_str())),
        host: caps.get(3).and_then(|m| blank_to_none(m.as_str())),
        login_time,
        logout_time,
        duration: caps.get(6).map(|m| m.as_str().to_string()),
        info: caps.get(7).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
    })
}

/// Most-recent-first, as printed. Lines that do not match are dropped
/// (`reboot` pseudo-users, the `wtmp begins` footer, blank lines).
pub fn parse_last_logins(raw: &str) -> Vec<LoginRecord> {
    raw.lines().filter_map(parse_line).collect()
}
