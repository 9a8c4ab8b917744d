//! Account heartbeat tracking.

pub mod expiry;
pub mod registry;

pub use expiry::{ExpiryPolicy, MalformedTimestamp};
pub use registry::{parse_status_update, AccountRegistry, ActiveAccounts, ValidationError};
