use serde::Deserialize;
use std::time::Duration;

/// Admission control configuration
///
/// Governs the per-client token-bucket rate limiter that sits in front of
/// the downstream application. All values are fixed at startup; there is no
/// dynamic reconfiguration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AdmissionConfig {
    /// Enable admission control
    /// When false, every request is allowed and no per-client state is kept
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sustained admission rate per client, in requests per second
    /// Fractional rates are supported (e.g. 0.5 = one request every 2s)
    /// Default: 2.0
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    /// Burst size: maximum requests a client may issue back-to-back
    /// before the sustained rate applies
    /// Default: 4
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Interval between janitor sweeps over the client registry, in seconds
    /// Default: 60
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Idle duration after which a client's state may be evicted, in seconds
    /// Must be at least the sweep interval, so a client pacing itself just
    /// slower than the sweep cadence is not evicted mid-conversation
    /// Default: 180 (3x the sweep interval)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl AdmissionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_second() -> f64 {
    2.0
}

fn default_burst() -> u32 {
    4
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    180
}
