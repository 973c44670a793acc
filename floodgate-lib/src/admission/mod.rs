//! Per-client admission control for HTTP-style request streams.
//!
//! This module implements token-bucket rate limiting over a shared client
//! registry. It consists of four pieces:
//!
//! 1. **TokenBucket** (`bucket.rs`): per-client capacity state that refills
//!    continuously over wall-clock time and depletes by one token per
//!    admitted request.
//!
//! 2. **AdmissionRegistry** (`registry.rs`): concurrently-safe map from
//!    client key to bucket state. The single source of truth for admission
//!    decisions; entries are created lazily on first observation.
//!
//! 3. **Janitor** (`janitor.rs`): background task that periodically evicts
//!    entries idle longer than the retention window, so churn of transient
//!    clients (e.g. rotating source addresses) does not grow memory without
//!    bound.
//!
//! 4. **RateLimiter** (`limiter.rs`): owning handle that ties the registry
//!    and janitor to the host process lifecycle.
//!
//! # Example Usage
//!
//! ```ignore
//! use floodgate_lib::admission::{ClientKey, RateLimiter};
//! use floodgate_lib::config::AdmissionConfig;
//!
//! // 2 requests/second sustained, bursts of up to 5
//! let config = AdmissionConfig {
//!     requests_per_second: 2.0,
//!     burst: 5,
//!     ..AdmissionConfig::default()
//! };
//! let limiter = RateLimiter::start(&config, None);
//!
//! let key = ClientKey::new("203.0.113.7");
//! if limiter.admit(&key).is_allowed() {
//!     // process the request
//! } else {
//!     // reject with 429 Too Many Requests
//! }
//!
//! // during graceful shutdown
//! limiter.stop().await;
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [admission]
//! enabled = true
//! requests_per_second = 2.0
//! burst = 4
//! sweep_interval_secs = 60
//! retention_secs = 180
//! ```

mod bucket;
mod janitor;
mod key;
mod limiter;
mod registry;

pub use janitor::Janitor;
pub use key::{extract_client_key, ClientKey};
pub use limiter::RateLimiter;
pub use registry::{AdmissionRegistry, Decision};
