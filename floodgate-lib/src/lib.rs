#![forbid(unsafe_code)]

pub mod admission;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;

pub use admission::{extract_client_key, AdmissionRegistry, ClientKey, Decision, Janitor, RateLimiter};
pub use config::{load_from_path, AdmissionConfig, Config};
pub use error::{GateError, Result};
pub use pipeline::{check_admission, run, RespBody};
