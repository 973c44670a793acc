mod admission;
mod loader;
mod telemetry;
mod types;

pub use admission::AdmissionConfig;
pub use loader::load_from_path;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use types::{Config, TimeoutConfig};
