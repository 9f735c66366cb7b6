// Header-driven tables: `docker ps -a` and `w`

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::non_empty;
use crate::models::{ActiveUser, ContainerRecord};

static WIDE_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("static regex is valid"));

/// Columns are separated by two or more spaces; each row is zipped against the
/// header. Cells missing at the end of a row are left out of the record.
pub fn parse_containers(raw: &str) -> Vec<ContainerRecord> {
    let Some(text) = non_empty(Some(raw)) else {
        return Vec::new();
    };
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = WIDE_GAP_RE.split(header.trim()).map(str::trim).collect();
    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let columns = headers
                .iter()
                .zip(WIDE_GAP_RE.split(line.trim()))
                .map(|(h, v)| (h.to_string(), v.trim().to_string()))
                .collect::<BTreeMap<_, _>>();
            ContainerRecord { columns }
        })
        .collect()
}

/// `w`: rows without a TTY get `-` inserted as the second cell; the last
/// column (WHAT) takes the rest of the line.
pub fn parse_active_users(raw: &str) -> Vec<ActiveUser> {
    let Some(text) = non_empty(Some(raw)) else {
        return Vec::new();
    };
    let lines: Vec<&str> = text.lines().collect();
    let Some(header_idx) = lines.iter().position(|l| l.trim_start().starts_with("USER")) else {
        return Vec::new();
    };
    let header_line = lines[header_idx].trim().replacen('@', "", 1);
    let headers: Vec<&str> = header_line.split_whitespace().collect();
    if headers.is_empty() {
        return Vec::new();
    }

    lines[header_idx + 1..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < headers.len() && !parts.is_empty() {
                parts.insert(1, "-");
            }
            let last = headers.len() - 1;
            let mut columns = BTreeMap::new();
            for (idx, header) in headers.iter().enumerate() {
                let value = if idx == last {
                    parts.get(idx..).map(|rest| rest.join(" "))
                } else {
                    parts.get(idx).map(|v| v.to_string())
                };
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    columns.insert(header.to_string(), value);
                }
            }
            ActiveUser { columns }
        })
        .collect()
}
