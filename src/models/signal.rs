//! Relayed signal records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single relayed instruction. The payload is opaque text
/// (`ACTION=OPEN|SYMBOL=EURUSD|...`) and is never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: u64,
    pub signal: String,
    pub timestamp: DateTime<Utc>,
}

/// Diagnostic view of the signal store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalHistory {
    pub latest: Option<Signal>,
    /// Oldest first.
    pub history: Vec<Signal>,
    pub total_received: u64,
}
