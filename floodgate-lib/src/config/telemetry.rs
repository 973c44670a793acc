use serde::Deserialize;

/// Telemetry configuration
/// Controls the Prometheus metrics endpoint
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    /// Metrics server port (optional)
    /// If provided, starts a separate HTTP server on this port serving
    /// Prometheus metrics plus health/liveness checks
    /// Default: None (metrics disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Can be overridden at runtime via RUST_LOG environment variable
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
