use prometheus::{IntCounter, IntGauge, Registry};

use crate::error::{GateError, Result};

/// Prometheus metrics for the admission pipeline.
///
/// Counters cover the three outcomes a request can have at the gate
/// (admitted, rejected, key extraction failed) plus janitor activity.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    requests_admitted_total: IntCounter,
    requests_rejected_total: IntCounter,
    key_extraction_failures_total: IntCounter,

    clients_evicted_total: IntCounter,
    clients_tracked: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_admitted_total = IntCounter::new(
            "floodgate_requests_admitted_total",
            "Requests allowed through the admission gate",
        )
        .map_err(metrics_error)?;
        let requests_rejected_total = IntCounter::new(
            "floodgate_requests_rejected_total",
            "Requests rejected with 429 Too Many Requests",
        )
        .map_err(metrics_error)?;
        let key_extraction_failures_total = IntCounter::new(
            "floodgate_key_extraction_failures_total",
            "Requests whose client key could not be derived",
        )
        .map_err(metrics_error)?;
        let clients_evicted_total = IntCounter::new(
            "floodgate_clients_evicted_total",
            "Idle client entries removed by the janitor",
        )
        .map_err(metrics_error)?;
        let clients_tracked = IntGauge::new(
            "floodgate_clients_tracked",
            "Client entries currently held in the admission registry",
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(requests_admitted_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(requests_rejected_total.clone())).map_err(metrics_error)?;
        registry
            .register(Box::new(key_extraction_failures_total.clone()))
            .map_err(metrics_error)?;
        registry.register(Box::new(clients_evicted_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(clients_tracked.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            requests_admitted_total,
            requests_rejected_total,
            key_extraction_failures_total,
            clients_evicted_total,
            clients_tracked,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_admitted(&self) {
        self.requests_admitted_total.inc();
    }

    pub fn record_rejected(&self) {
        self.requests_rejected_total.inc();
    }

    pub fn record_key_extraction_failure(&self) {
        self.key_extraction_failures_total.inc();
    }

    pub fn record_evictions(&self, evicted: usize) {
        self.clients_evicted_total.inc_by(evicted as u64);
    }

    pub fn set_clients_tracked(&self, tracked: usize) {
        self.clients_tracked.set(tracked as i64);
    }
}

fn metrics_error(e: prometheus::Error) -> GateError {
    GateError::Metrics(e.to_string())
}
