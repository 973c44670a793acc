use serde::Deserialize;
use std::net::SocketAddr;

use super::admission::AdmissionConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:4000" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Admission control (per-client rate limiting) configuration
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
}

/// Timeout configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Graceful shutdown timeout in seconds
    /// How long to wait for in-flight connections to drain after the
    /// accept loop stops
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { shutdown_secs: default_shutdown_timeout() }
    }
}

fn default_shutdown_timeout() -> u64 {
    30
}
