use std::sync::Arc;

use super::janitor::Janitor;
use super::key::ClientKey;
use super::registry::{AdmissionRegistry, Decision};
use crate::config::AdmissionConfig;
use crate::telemetry::Metrics;

/// Owning handle for the admission primitive: the shared registry plus the
/// janitor that garbage-collects it.
///
/// The host process creates one per guarded listener, shares the registry
/// handle with its request paths, and calls [`RateLimiter::stop`] during
/// graceful shutdown.
pub struct RateLimiter {
    registry: Arc<AdmissionRegistry>,
    janitor: Option<Janitor>,
}

impl RateLimiter {
    /// Build the registry and start the janitor. Must be called from within
    /// a tokio runtime. When admission control is disabled no janitor is
    /// spawned; there is no state to collect.
    pub fn start(config: &AdmissionConfig, metrics: Option<Arc<Metrics>>) -> Self {
        let registry = Arc::new(AdmissionRegistry::new(config));
        let janitor = config.enabled.then(|| {
            Janitor::spawn(
                Arc::clone(&registry),
                config.sweep_interval(),
                config.retention(),
                metrics,
            )
        });
        Self { registry, janitor }
    }

    /// Shared handle to the underlying registry, for request paths that
    /// outlive this struct's borrow.
    pub fn registry(&self) -> &Arc<AdmissionRegistry> {
        &self.registry
    }

    /// Admission check against the wall clock.
    pub fn admit(&self, key: &ClientKey) -> Decision {
        self.registry.admit(key)
    }

    /// Stop the janitor and wait for it to exit. The registry itself needs
    /// no teardown; limiter state is not persisted across restarts.
    pub async fn stop(self) {
        if let Some(janitor) = self.janitor {
            janitor.stop().await;
        }
    }
}
