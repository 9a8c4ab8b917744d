//! Unit tests for the account expiry policy

use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use signal_bridge::accounts::ExpiryPolicy;

#[test]
fn default_threshold_is_five_minutes() {
    assert_eq!(ExpiryPolicy::default().threshold(), Duration::from_secs(300));
}

#[test]
fn boundary_is_exclusive() {
    let policy = ExpiryPolicy::default();
    let last = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert!(!policy.is_stale(last, last));
    assert!(!policy.is_stale(last, last + TimeDelta::seconds(300)));
    assert!(policy.is_stale(last, last + TimeDelta::milliseconds(300_001)));
    assert!(policy.is_stale(last, last + TimeDelta::seconds(301)));
}

#[test]
fn future_timestamps_are_live() {
    let policy = ExpiryPolicy::default();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert!(!policy.is_stale(now + TimeDelta::hours(1), now));
}

#[test]
fn custom_threshold() {
    let policy = ExpiryPolicy::new(Duration::from_secs(10));
    let last = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert!(!policy.is_stale(last, last + TimeDelta::seconds(10)));
    assert!(policy.is_stale(last, last + TimeDelta::seconds(11)));
}

#[test]
fn textual_timestamps_are_parsed() {
    let policy = ExpiryPolicy::default();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();

    assert_eq!(policy.check_rfc3339("2024-05-01T12:00:00Z", now), Ok(true));
    assert_eq!(policy.check_rfc3339("2024-05-01T14:08:00+02:00", now), Ok(false));
    assert_eq!(policy.check_rfc3339("2024-05-01T12:09:30.123456", now), Ok(false));
}

#[test]
fn malformed_timestamp_fails_open() {
    let policy = ExpiryPolicy::default();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();

    let err = policy
        .check_rfc3339("yesterday-ish", now)
        .expect_err("not a timestamp");
    assert_eq!(err.raw, "yesterday-ish");
    assert!(!policy.is_stale_rfc3339("yesterday-ish", now));
    assert!(!policy.is_stale_rfc3339("", now));
    assert!(policy.is_stale_rfc3339("2024-05-01T12:00:00Z", now));
}
