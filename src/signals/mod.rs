//! Signal ingestion: decoding producer requests and holding the latest signals.

pub mod decoder;
pub mod store;

pub use decoder::{
    DecodeDiagnostics, DecodeFailure, DecodeStrategy, DecodedSignal, InboundSignal, SignalDecoder,
};
pub use store::{SignalPoll, SignalStore, StoreStats};
