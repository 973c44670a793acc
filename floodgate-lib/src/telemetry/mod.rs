mod health;
mod metrics;
mod metrics_handler;
mod server;

pub use health::{health_check_response, live_check_response};
pub use metrics::Metrics;
pub use metrics_handler::handle_metrics;
pub use server::start_observability_server;
