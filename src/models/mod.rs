//! Shared data models for signals and account heartbeats.

pub mod account;
pub mod signal;

pub use account::{AccountId, AccountSnapshot, AccountStatusUpdate, OpenTrade};
pub use signal::{Signal, SignalHistory};
