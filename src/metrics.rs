//! Prometheus instrumentation for the relay.
//!
//! Each `Metrics` owns its own registry so test servers never collide on
//! metric registration.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub signals_received_total: IntCounter,
    pub signal_decode_failures_total: IntCounter,
    pub account_updates_total: IntCounter,
    pub accounts_evicted_total: IntCounter,
    pub accounts_active: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight = IntGauge::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        )?;
        let signals_received_total =
            IntCounter::new("signals_received_total", "Signals accepted and stored")?;
        let signal_decode_failures_total = IntCounter::new(
            "signal_decode_failures_total",
            "Signal submissions rejected because no signal could be extracted",
        )?;
        let account_updates_total =
            IntCounter::new("account_updates_total", "Accepted account status snapshots")?;
        let accounts_evicted_total = IntCounter::new(
            "accounts_evicted_total",
            "Accounts removed after missing heartbeats",
        )?;
        let accounts_active =
            IntGauge::new("accounts_active", "Accounts present after the last sweep")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(signals_received_total.clone()))?;
        registry.register(Box::new(signal_decode_failures_total.clone()))?;
        registry.register(Box::new(account_updates_total.clone()))?;
        registry.register(Box::new(accounts_evicted_total.clone()))?;
        registry.register(Box::new(accounts_active.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            signals_received_total,
            signal_decode_failures_total,
            account_updates_total,
            accounts_evicted_total,
            accounts_active,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
