use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::error::{GateError, Result};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Health check response - always returns 200 if the process is running
pub fn health_check_response() -> Result<Response<RespBody>> {
    json_response(json!({"status": "healthy"}))
}

/// Liveness check - always returns 200 if the process is running
pub fn live_check_response() -> Result<Response<RespBody>> {
    json_response(json!({"status": "alive"}))
}

fn json_response(body: serde_json::Value) -> Result<Response<RespBody>> {
    let body_bytes = serde_json::to_vec(&body)
        .map_err(|e| GateError::Metrics(format!("Failed to serialize response: {e}")))?;

    let body = Full::new(Bytes::from(body_bytes))
        .map_err(|never| match never {})
        .boxed();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(body)
        .map_err(|e| GateError::Metrics(format!("Failed to build response: {e}")))?;

    Ok(response)
}
