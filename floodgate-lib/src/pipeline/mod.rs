//! Request-handling pipeline around the admission primitive.
//!
//! `gate` turns an admission decision into its HTTP consequence (pass
//! through, 429, or a key-extraction error for the caller to surface);
//! `server` is the accept loop that applies the gate in front of a
//! caller-supplied downstream handler.

mod gate;
mod server;

pub use gate::{check_admission, synthetic_response};
pub use server::run;

/// Body type produced by the pipeline's synthetic responses and expected
/// from downstream handlers.
pub type RespBody = http_body_util::combinators::BoxBody<bytes::Bytes, hyper::Error>;
