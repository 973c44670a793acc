use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::AdmissionRegistry;
use crate::telemetry::Metrics;

/// Background sweep that evicts idle client entries from the registry.
///
/// Runs once per `interval` for the lifetime of the process. Each sweep
/// takes the registry's structural lock, removes every entry idle longer
/// than `retention`, and releases the lock; it never blocks admission for
/// longer than that single scan. The task holds no other resources, so
/// stopping it is just cancelling the token and joining the task.
pub struct Janitor {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl Janitor {
    /// Spawn the sweep loop. Must be called from within a tokio runtime.
    pub fn spawn(
        registry: Arc<AdmissionRegistry>,
        interval: Duration,
        retention: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; consume it so the
            // initial sweep happens one full interval after startup
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = registry.evict_idle(retention);
                        if evicted > 0 {
                            debug!(evicted, tracked = registry.len(), "evicted idle clients");
                        }
                        if let Some(ref m) = metrics {
                            m.record_evictions(evicted);
                            m.set_clients_tracked(registry.len());
                        }
                    }
                }
            }

            debug!("janitor stopped");
        });

        Self { handle, shutdown }
    }

    /// Signal the sweep loop to exit and wait for it to finish. Invoked by
    /// the host during graceful shutdown so the task does not outlive the
    /// server.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "janitor task failed");
        }
    }
}
