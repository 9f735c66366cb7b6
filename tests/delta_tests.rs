// Login delta engine: new/gone sessions between two fetches of the log

mod common;

use common::*;
use rpiwatch::delta::{LoginTracker, find_logs_delta};
use rpiwatch::models::LoginRecord;

const T1: &str = "2024-08-03T10:00:00+02:00";
const T2: &str = "2024-08-03T11:00:00+02:00";
const T3: &str = "2024-08-03T12:00:00+02:00";

/// Rows fetched by `last -n 10`.
const LOG_WINDOW: usize = 10;

#[test]
fn identical_logs_have_no_delta() {
    let log = vec![open_login("alice", T2), open_login("bob", T1)];
    let delta = find_logs_delta(&log, &log);
    assert!(delta.new_users.is_empty());
    assert!(delta.gone_users.is_empty());
    assert!(delta.is_empty());
}

#[test]
fn new_session_on_top_does_not_flag_older_ones() {
    let a = open_login("alice", T1);
    let b = open_login("bob", T2);
    let c = open_login("carol", T3);
    let old_log = vec![a.clone(), b.clone()];
    let new_log = vec![c.clone(), a, b];

    let delta = find_logs_delta(&old_log, &new_log);
    assert_eq!(delta.new_users, vec![c]);
    assert!(delta.gone_users.is_empty());
}

#[test]
fn short_log_still_drops_the_oldest_entries() {
    let a = open_login("alice", T2);
    let b = open_login("bob", T1);
    let c = open_login("carol", T3);
    // bob scrolled off the bottom while carol logged in
    let old_log = vec![a.clone(), b];
    let new_log = vec![c.clone(), a];

    let delta = find_logs_delta(&old_log, &new_log);
    assert_eq!(delta.new_users, vec![c]);
    assert!(delta.gone_users.is_empty());
}

#[test]
fn disjoint_logs_report_the_new_session_only() {
    let a = open_login("alice", T1);
    let b = open_login("bob", T2);
    // the single old entry is treated as pushed out by the new one
    let delta = find_logs_delta(std::slice::from_ref(&a), std::slice::from_ref(&b));
    assert_eq!(delta.new_users, vec![b]);
    assert!(delta.gone_users.is_empty());
}

#[test]
fn logout_reports_the_closed_record() {
    let open = open_login("alice", T1);
    let closed = closed_login("alice", T1, T2);
    let delta = find_logs_delta(&[open], std::slice::from_ref(&closed));
    assert!(delta.new_users.is_empty());
    assert_eq!(delta.gone_users, vec![closed]);
}

#[test]
fn closed_sessions_never_count_as_new() {
    let old_log = vec![closed_login("alice", T1, T2)];
    let new_log = vec![closed_login("bob", T2, T3), closed_login("alice", T1, T2)];
    assert!(find_logs_delta(&old_log, &new_log).is_empty());
}

#[test]
fn session_ended_by_crash_is_gone() {
    let open = open_login("alice", T1);
    let crashed = LoginRecord {
        info: "crash (00:05)".into(),
        ..open.clone()
    };
    let delta = find_logs_delta(&[open], &[crashed.clone()]);
    assert_eq!(delta.gone_users, vec![crashed]);
}

/// `n` open sessions, newest first, one hour apart.
fn full_window(n: usize) -> Vec<LoginRecord> {
    (0..n)
        .rev()
        .map(|i| open_login(&format!("user{i}"), &format!("2024-08-03T{:02}:00:00+00:00", i + 1)))
        .collect()
}

#[test]
fn full_window_drops_sessions_that_scrolled_out() {
    let old_log = full_window(LOG_WINDOW);
    let newest = open_login("newcomer", "2024-08-03T20:00:00+00:00");
    // The oldest entry falls off the bottom of a full window.
    let mut new_log = vec![newest.clone()];
    new_log.extend_from_slice(&old_log[..LOG_WINDOW - 1]);
    assert_eq!(new_log.len(), LOG_WINDOW);

    let delta = find_logs_delta(&old_log, &new_log);
    assert_eq!(delta.new_users, vec![newest]);
    assert!(delta.gone_users.is_empty());
}

#[test]
fn full_window_still_reports_real_logouts() {
    let old_log = full_window(LOG_WINDOW);
    let newest = open_login("newcomer", "2024-08-03T20:00:00+00:00");
    let mut new_log = vec![newest];
    new_log.extend_from_slice(&old_log[..LOG_WINDOW - 1]);
    // The most recent old session logged out meanwhile.
    let closed = LoginRecord {
        logout_time: Some(ts("2024-08-03T20:30:00+00:00")),
        info: String::new(),
        ..new_log[1].clone()
    };
    new_log[1] = closed.clone();

    let delta = find_logs_delta(&old_log, &new_log);
    assert_eq!(delta.new_users.len(), 1);
    assert_eq!(delta.gone_users, vec![closed]);
}

#[test]
fn tracker_primes_on_first_fetch() {
    let mut tracker = LoginTracker::new();
    assert!(tracker.retained().is_none());

    let first = vec![open_login("alice", T1)];
    assert!(tracker.update(first.clone()).is_empty());
    assert_eq!(tracker.retained(), Some(first.as_slice()));

    let second = vec![open_login("bob", T2), open_login("alice", T1)];
    let delta = tracker.update(second.clone());
    assert_eq!(delta.new_users.len(), 1);
    assert_eq!(delta.new_users[0].user, "bob");
    assert_eq!(tracker.retained(), Some(second.as_slice()));

    tracker.reset();
    assert!(tracker.retained().is_none());
    assert!(tracker.update(vec![open_login("carol", T3)]).is_empty());
}
