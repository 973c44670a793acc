#![forbid(unsafe_code)]

use clap::Parser;
use floodgate_lib::config::{load_from_path, LoggingConfig};
use floodgate_lib::pipeline::{self, synthetic_response, RespBody};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Admission-guarded HTTP server (per-client token buckets)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/basic.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match load_from_path(&cli.config) {
        Ok(cfg) => {
            init_tracing(&cfg.logging);
            info!(?cfg.listen, enabled = cfg.admission.enabled, "configuration loaded");

            let shutdown = CancellationToken::new();
            spawn_signal_handler(shutdown.clone());

            if let Err(err) = pipeline::run(Arc::new(cfg), respond, shutdown).await {
                error!(%err, "server exited with error");
                std::process::exit(1);
            }
        }
        Err(err) => {
            init_tracing(&LoggingConfig::default());
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(logging.show_target)
        .init();
}

/// Translate SIGINT/SIGTERM into a cancellation, the trigger for graceful
/// shutdown of the accept loop and the limiter's janitor.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to set up SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to set up SIGINT handler");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
        }
        shutdown.cancel();
    });
}

/// Stand-in for the guarded application: answers the healthcheck route and
/// 404s everything else. The real downstream (CRUD handlers, storage) plugs
/// in here without touching the admission pipeline.
async fn respond(req: Request<Incoming>) -> Response<RespBody> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/v1/healthcheck") => {
            let payload = serde_json::json!({
                "status": "available",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match serde_json::to_vec(&payload) {
                Ok(body) => json_response(body),
                Err(_) => synthetic_response(StatusCode::INTERNAL_SERVER_ERROR),
            }
        }
        _ => synthetic_response(StatusCode::NOT_FOUND),
    }
}

fn json_response(body: Vec<u8>) -> Response<RespBody> {
    let body = Full::new(bytes::Bytes::from(body))
        .map_err(|never| match never {})
        .boxed();
    let mut resp = Response::new(body);
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    resp
}
