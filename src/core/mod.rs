//! Relay service and its HTTP boundary

pub mod http;
pub mod service;

pub use http::{create_router, start_server, AppState};
pub use service::{AccountListing, HealthReport, RelayError, RelayService};
