//! Staleness rule for account heartbeats.
//!
//! The registry stamps its own `DateTime<Utc>` and only needs
//! [`ExpiryPolicy::is_stale`]. The textual checks are for timestamps that
//! arrive as strings from outside the registry, such as a persisted snapshot
//! or a producer-supplied `last_update`, where a malformed value must not evict.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::warn;

use crate::config::DEFAULT_STALE_SECONDS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timestamp {raw:?}")]
pub struct MalformedTimestamp {
    pub raw: String,
}

/// An entry is stale once `now - last_update` is strictly greater than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    threshold: Duration,
    limit: TimeDelta,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STALE_SECONDS))
    }
}

impl ExpiryPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            limit: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_stale(&self, last_update: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_update) > self.limit
    }

    /// Staleness of a textual timestamp. Accepts RFC 3339 and the zone-less
    /// ISO form (`2024-05-01T12:00:00.123456`, read as UTC).
    pub fn check_rfc3339(&self, raw: &str, now: DateTime<Utc>) -> Result<bool, MalformedTimestamp> {
        let last_update = parse_timestamp(raw).ok_or_else(|| MalformedTimestamp {
            raw: raw.to_string(),
        })?;
        Ok(self.is_stale(last_update, now))
    }

    /// Fail-open variant of [`check_rfc3339`](Self::check_rfc3339): an
    /// unparseable timestamp never marks its entry stale.
    pub fn is_stale_rfc3339(&self, raw: &str, now: DateTime<Utc>) -> bool {
        match self.check_rfc3339(raw, now) {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "Treating entry with malformed timestamp as live");
                false
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
