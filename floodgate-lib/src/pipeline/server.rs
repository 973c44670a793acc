use http::StatusCode;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gate::{check_admission, synthetic_response};
use super::RespBody;
use crate::admission::RateLimiter;
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::telemetry::{start_observability_server, Metrics};

/// Guard to decrement active connections counter when dropped
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Run an admission-guarded server: every request passes the rate-limit
/// gate before `downstream` sees it.
///
/// A deny short-circuits with a 429 and never invokes `downstream`; a
/// key-extraction failure answers 500. Cancelling `shutdown` stops the
/// accept loop, drains in-flight connections for up to
/// `timeout.shutdown_secs`, then stops the limiter's janitor.
pub async fn run<F, Fut>(
    config: Arc<Config>,
    downstream: F,
    shutdown: CancellationToken,
) -> Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<RespBody>> + Send + 'static,
{
    let listener = TcpListener::bind(config.listen).await.map_err(GateError::Io)?;
    let builder = ConnBuilder::new(TokioExecutor::new());

    let metrics = Arc::new(Metrics::new()?);
    let limiter = RateLimiter::start(&config.admission, Some(Arc::clone(&metrics)));
    let registry = Arc::clone(limiter.registry());

    if let Some(port) = config.telemetry.metrics_port {
        let metrics = Arc::clone(&metrics);
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_observability_server(port, metrics, token).await {
                warn!(error = %e, "observability server exited with error");
            }
        });
    }

    // Track active connections for graceful shutdown
    let active_connections = Arc::new(AtomicUsize::new(0));

    info!(
        addr = ?config.listen,
        enabled = config.admission.enabled,
        "starting admission-guarded server"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, stopping accept loop");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);

                let builder = builder.clone();
                let registry = Arc::clone(&registry);
                let metrics = Arc::clone(&metrics);
                let downstream = downstream.clone();
                let active_connections = Arc::clone(&active_connections);

                tokio::spawn(async move {
                    // Ensure counter is decremented when connection finishes
                    let _guard = ConnectionGuard(active_connections);

                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = Arc::clone(&registry);
                        let metrics = Arc::clone(&metrics);
                        let downstream = downstream.clone();

                        async move {
                            let resp = match check_admission(
                                &registry,
                                peer,
                                req.headers(),
                                Some(&metrics),
                            ) {
                                Ok(None) => downstream(req).await,
                                Ok(Some(rejection)) => rejection,
                                Err(e) => {
                                    warn!(?peer, error = %e, "client key extraction failed");
                                    synthetic_response(StatusCode::INTERNAL_SERVER_ERROR)
                                }
                            };
                            Ok::<_, hyper::Error>(resp)
                        }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    info!(
        "waiting for active connections to finish (timeout: {}s)",
        config.timeout.shutdown_secs
    );
    let shutdown_timeout = Duration::from_secs(config.timeout.shutdown_secs);
    let start = std::time::Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            break;
        }

        if start.elapsed() >= shutdown_timeout {
            warn!(
                active_connections = active,
                "shutdown timeout reached with connections still active"
            );
            break;
        }

        debug!(active_connections = active, "waiting for connections to close");
        sleep(Duration::from_millis(100)).await;
    }

    limiter.stop().await;
    info!("server stopped");
    Ok(())
}
