//! Last-known status per account with lazy expiry on read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::accounts::expiry::ExpiryPolicy;
use crate::models::account::{AccountId, AccountSnapshot, AccountStatusUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No data provided")]
    NoData,
    #[error("account_id required")]
    MissingAccountId,
}

/// Decode a heartbeat body. Anything other than a non-empty JSON object counts
/// as no data; mistyped fields fall back to their defaults.
pub fn parse_status_update(body: &[u8]) -> Result<AccountStatusUpdate, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationError::NoData)?;
    match &value {
        Value::Object(map) if !map.is_empty() => {}
        _ => return Err(ValidationError::NoData),
    }
    serde_json::from_value(value).map_err(|_| ValidationError::NoData)
}

/// Outcome of a listing read.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAccounts {
    /// Order is unspecified.
    pub accounts: Vec<AccountSnapshot>,
    /// Keys removed by this sweep.
    pub evicted: Vec<String>,
}

pub struct AccountRegistry {
    policy: ExpiryPolicy,
    accounts: Mutex<HashMap<String, AccountSnapshot>>,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new(ExpiryPolicy::default())
    }
}

impl AccountRegistry {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Replace the snapshot for the update's account, stamped with `now`.
    pub fn upsert(
        &self,
        update: AccountStatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<AccountId, ValidationError> {
        let account_id = update
            .identifier()
            .ok_or(ValidationError::MissingAccountId)?;
        let key = account_id.key();
        let snapshot = update.into_snapshot(account_id.clone(), now);

        let replaced = self.accounts.lock().insert(key.clone(), snapshot).is_some();
        if replaced {
            debug!(account_id = %key, "Account status refreshed");
        } else {
            info!(account_id = %key, "Account registered");
        }

        Ok(account_id)
    }

    /// Drop every stale entry, then return what is left.
    pub fn list_active(&self, now: DateTime<Utc>) -> ActiveAccounts {
        let mut accounts = self.accounts.lock();

        let evicted: Vec<String> = accounts
            .iter()
            .filter(|(_, snapshot)| self.policy.is_stale(snapshot.last_update, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            accounts.remove(key);
        }

        let active = ActiveAccounts {
            accounts: accounts.values().cloned().collect(),
            evicted,
        };
        drop(accounts);

        for key in &active.evicted {
            info!(account_id = %key, "Account expired after missing heartbeats");
        }
        active
    }

    pub fn get(&self, key: &str) -> Option<AccountSnapshot> {
        self.accounts.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }
}
