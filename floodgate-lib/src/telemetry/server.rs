use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{GateError, Result};
use crate::telemetry::{handle_metrics, health_check_response, live_check_response, Metrics};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Start the observability server that handles metrics and health checks.
/// This server runs on a dedicated port and serves:
/// - `/metrics` - Prometheus metrics
/// - `/health` - Health check endpoint
/// - `/live` - Liveness check endpoint
///
/// It shuts down when `shutdown` is cancelled, alongside the main server.
pub async fn start_observability_server(
    port: u16,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(GateError::Io)?;

    info!(?addr, "observability server started (metrics + health checks)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "observability server: accept error");
                        continue;
                    }
                };

                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let metrics = Arc::clone(&metrics);
                        async move {
                            let resp = match req.uri().path() {
                                "/metrics" => or_internal_error(handle_metrics(metrics.registry())),
                                "/health" => or_internal_error(health_check_response()),
                                "/live" => or_internal_error(live_check_response()),
                                _ => status_response(hyper::StatusCode::NOT_FOUND, "Not Found"),
                            };
                            Ok::<_, hyper::Error>(resp)
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("observability server stopped");
    Ok(())
}

fn or_internal_error(result: Result<hyper::Response<RespBody>>) -> hyper::Response<RespBody> {
    result.unwrap_or_else(|_| {
        status_response(hyper::StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}

fn status_response(status: hyper::StatusCode, text: &'static str) -> hyper::Response<RespBody> {
    let body = Full::new(Bytes::from(text))
        .map_err(|never| match never {})
        .boxed();
    let mut resp = hyper::Response::new(body);
    *resp.status_mut() = status;
    resp
}
