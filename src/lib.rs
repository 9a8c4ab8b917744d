//! Signal Bridge: a store-and-forward relay for trading signals and
//! account heartbeats.
//!
//! Producers push signals and account snapshots, consumers poll for the
//! latest unseen signal and the set of live accounts.

pub mod accounts;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod signals;
