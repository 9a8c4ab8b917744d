//! Relay service: the operations exposed to the transport layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::accounts::{parse_status_update, AccountRegistry, ExpiryPolicy, ValidationError};
use crate::config::RelayConfig;
use crate::metrics::Metrics;
use crate::models::account::{AccountId, AccountSnapshot};
use crate::models::signal::SignalHistory;
use crate::signals::{DecodeFailure, InboundSignal, SignalDecoder, SignalPoll, SignalStore};

pub const SERVER_NAME: &str = "MT5 Signal Bridge API";

/// Failures surfaced to callers. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error(transparent)]
    Decode(#[from] DecodeFailure),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountListing {
    pub accounts: Vec<AccountSnapshot>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub server: &'static str,
    pub signals_received: u64,
    pub latest_signal_id: Option<u64>,
}

/// Owns the signal store and account registry for the lifetime of the process.
pub struct RelayService {
    decoder: SignalDecoder,
    signals: SignalStore,
    accounts: AccountRegistry,
    metrics: Option<Arc<Metrics>>,
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}

impl RelayService {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            decoder: SignalDecoder,
            signals: SignalStore::new(config.history_capacity),
            accounts: AccountRegistry::new(ExpiryPolicy::new(config.stale_after)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decode and store a producer signal, returning its id.
    pub fn submit_signal(&self, inbound: &InboundSignal) -> Result<u64, RelayError> {
        let decoded = self.decoder.decode(inbound).map_err(|e| {
            if let Some(m) = &self.metrics {
                m.signal_decode_failures_total.inc();
            }
            e
        })?;

        let id = self.signals.put(decoded.payload);
        if let Some(m) = &self.metrics {
            m.signals_received_total.inc();
        }
        info!(signal_id = id, strategy = ?decoded.strategy, "Signal accepted");
        Ok(id)
    }

    pub fn fetch_signal(&self, last_seen: Option<u64>) -> SignalPoll {
        let poll = self.signals.latest(last_seen);
        match &poll {
            SignalPoll::Fresh(signal) => debug!(signal_id = signal.id, "Delivering signal"),
            _ => debug!(last_seen = ?last_seen, "No new signal"),
        }
        poll
    }

    pub fn fetch_history(&self) -> SignalHistory {
        self.signals.history()
    }

    pub fn submit_account_status(&self, body: &[u8]) -> Result<AccountId, RelayError> {
        self.submit_account_status_at(body, Utc::now())
    }

    pub fn submit_account_status_at(
        &self,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<AccountId, RelayError> {
        let update = parse_status_update(body)?;
        let account_id = self.accounts.upsert(update, now)?;
        if let Some(m) = &self.metrics {
            m.account_updates_total.inc();
        }
        Ok(account_id)
    }

    /// Current accounts after dropping those without a recent heartbeat.
    pub fn list_accounts(&self, now: DateTime<Utc>) -> AccountListing {
        let active = self.accounts.list_active(now);
        if !active.evicted.is_empty() {
            debug!(
                evicted = active.evicted.len(),
                active = active.accounts.len(),
                "Account sweep finished"
            );
        }
        if let Some(m) = &self.metrics {
            m.accounts_evicted_total.inc_by(active.evicted.len() as u64);
            m.accounts_active.set(active.accounts.len() as i64);
        }
        AccountListing {
            total: active.accounts.len(),
            accounts: active.accounts,
        }
    }

    pub fn health(&self) -> HealthReport {
        let stats = self.signals.stats();
        HealthReport {
            status: "ok",
            server: SERVER_NAME,
            signals_received: stats.total_received,
            latest_signal_id: stats.latest_id,
        }
    }

    pub fn signals(&self) -> &SignalStore {
        &self.signals
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }
}
