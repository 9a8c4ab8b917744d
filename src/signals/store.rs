//! Latest-signal slot plus a bounded ring of recent signals.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::models::signal::{Signal, SignalHistory};

/// Result of a consumer poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalPoll {
    /// The latest signal differs from what the consumer last saw.
    Fresh(Signal),
    /// The consumer already has the latest signal.
    Unchanged,
    /// Nothing has been stored yet.
    Empty,
}

impl SignalPoll {
    pub fn into_signal(self) -> Option<Signal> {
        match self {
            SignalPoll::Fresh(signal) => Some(signal),
            SignalPoll::Unchanged | SignalPoll::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_received: u64,
    pub latest_id: Option<u64>,
}

struct StoreInner {
    counter: u64,
    latest: Option<Signal>,
    history: VecDeque<Signal>,
}

pub struct SignalStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SignalStore {
    /// `capacity` is clamped to at least one so the latest signal is always in history.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(StoreInner {
                counter: 0,
                latest: None,
                history: VecDeque::with_capacity(capacity + 1),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a new latest signal and return its id.
    pub fn put(&self, payload: impl Into<String>) -> u64 {
        self.put_at(payload, Utc::now())
    }

    pub fn put_at(&self, payload: impl Into<String>, received_at: DateTime<Utc>) -> u64 {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let signal = Signal {
            id: inner.counter,
            signal: payload.into(),
            timestamp: received_at,
        };

        inner.history.push_back(signal.clone());
        while inner.history.len() > self.capacity {
            inner.history.pop_front();
        }
        inner.latest = Some(signal);

        let id = inner.counter;
        drop(inner);

        info!(signal_id = id, "Signal stored");
        id
    }

    /// Latest signal unless its id equals `last_seen`.
    pub fn latest(&self, last_seen: Option<u64>) -> SignalPoll {
        let inner = self.inner.lock();
        match &inner.latest {
            None => SignalPoll::Empty,
            Some(signal) if Some(signal.id) == last_seen => SignalPoll::Unchanged,
            Some(signal) => SignalPoll::Fresh(signal.clone()),
        }
    }

    pub fn history(&self) -> SignalHistory {
        let inner = self.inner.lock();
        SignalHistory {
            latest: inner.latest.clone(),
            history: inner.history.iter().cloned().collect(),
            total_received: inner.counter,
        }
    }

    /// Counter and latest id read under one lock.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            total_received: inner.counter,
            latest_id: inner.latest.as_ref().map(|s| s.id),
        }
    }
}
