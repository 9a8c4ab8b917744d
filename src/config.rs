//! Environment-driven configuration

use std::env;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_STALE_SECONDS: u64 = 300;

/// Deployment environment (`production`, `sandbox`, ...), lower-cased.
pub fn get_environment() -> String {
    env::var("ENVIRONMENT")
        .or_else(|_| env::var("APP_ENV"))
        .map(|e| e.trim().to_lowercase())
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "sandbox".to_string())
}

pub fn get_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Tunables for the relay's in-memory state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Number of recent signals kept for diagnostics.
    pub history_capacity: usize,
    /// Age after which an account without heartbeats is dropped from listings.
    pub stale_after: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stale_after: Duration::from_secs(DEFAULT_STALE_SECONDS),
        }
    }
}

impl RelayConfig {
    /// Read `SIGNAL_HISTORY_CAPACITY` and `ACCOUNT_STALE_SECONDS`, keeping the
    /// defaults for anything missing, unparseable or zero.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let history_capacity = positive_var("SIGNAL_HISTORY_CAPACITY")
            .map(|v| v as usize)
            .unwrap_or(defaults.history_capacity);
        let stale_after = positive_var("ACCOUNT_STALE_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.stale_after);

        Self {
            history_capacity,
            stale_after,
        }
    }
}

fn positive_var(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(variable = name, value = %raw, "Ignoring invalid value, using default");
            None
        }
    }
}
