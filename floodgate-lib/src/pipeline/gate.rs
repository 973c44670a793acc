use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::RespBody;
use crate::admission::{extract_client_key, AdmissionRegistry, Decision};
use crate::error::Result;
use crate::telemetry::Metrics;

/// Run the admission check for an inbound request.
///
/// Returns:
/// - `Ok(None)` if the request is allowed to proceed downstream
/// - `Ok(Some(429 response))` if the client exceeded its rate
/// - `Err(..)` if no client key could be derived; the caller must answer
///   with a server-side error, not a 429, since this is not a rate-limit
///   denial
pub fn check_admission(
    registry: &AdmissionRegistry,
    peer: SocketAddr,
    headers: &http::HeaderMap,
    metrics: Option<&Arc<Metrics>>,
) -> Result<Option<Response<RespBody>>> {
    let key = match extract_client_key(peer, headers) {
        Ok(key) => key,
        Err(e) => {
            if let Some(m) = metrics {
                m.record_key_extraction_failure();
            }
            return Err(e);
        }
    };

    match registry.admit(&key) {
        Decision::Limited { retry_after } => {
            if let Some(m) = metrics {
                m.record_rejected();
            }
            debug!(client = %key, "request rejected by rate limiter");
            Ok(Some(create_429_response(registry.capacity(), retry_after)))
        }
        Decision::Allowed { remaining } => {
            if let Some(m) = metrics {
                m.record_admitted();
            }
            debug!(client = %key, remaining, "admission check passed");
            Ok(None)
        }
    }
}

fn create_429_response(limit: u32, retry_after: Duration) -> Response<RespBody> {
    let body = Full::new(bytes::Bytes::from("Too Many Requests"))
        .map_err(|never| match never {})
        .boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

    // reset is rounded up so clients do not retry before a token exists
    let reset_secs = retry_after.as_secs_f64().ceil() as u64;

    resp.headers_mut().insert(
        hyper::header::HeaderName::from_static("x-rate-limit-limit"),
        hyper::header::HeaderValue::from_str(&limit.to_string())
            .unwrap_or_else(|_| hyper::header::HeaderValue::from_static("0")),
    );
    resp.headers_mut().insert(
        hyper::header::HeaderName::from_static("x-rate-limit-remaining"),
        hyper::header::HeaderValue::from_static("0"),
    );
    resp.headers_mut().insert(
        hyper::header::HeaderName::from_static("x-rate-limit-reset"),
        hyper::header::HeaderValue::from_str(&reset_secs.to_string())
            .unwrap_or_else(|_| hyper::header::HeaderValue::from_static("0")),
    );

    resp
}

/// Build an HTTP response carrying only a status code and an empty body.
pub fn synthetic_response(status: StatusCode) -> Response<RespBody> {
    let body = Full::new(bytes::Bytes::new())
        .map_err(|never| match never {})
        .boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdmissionConfig;
    use crate::error::GateError;
    use http::{HeaderMap, HeaderValue};
    use std::str::FromStr;

    fn registry(burst: u32, requests_per_second: f64) -> AdmissionRegistry {
        AdmissionRegistry::new(&AdmissionConfig {
            enabled: true,
            requests_per_second,
            burst,
            ..AdmissionConfig::default()
        })
    }

    fn peer(addr: &str) -> SocketAddr {
        SocketAddr::from_str(addr).expect("test peer address")
    }

    #[test]
    fn allowed_request_passes_through() {
        let registry = registry(2, 1.0);
        let headers = HeaderMap::new();

        let outcome = check_admission(&registry, peer("192.0.2.1:5000"), &headers, None)
            .expect("key extraction succeeds");
        assert!(outcome.is_none());
    }

    #[test]
    fn exhausted_client_gets_429_with_rate_limit_headers() {
        let registry = registry(1, 2.0);
        let headers = HeaderMap::new();
        let peer = peer("192.0.2.1:5000");

        assert!(check_admission(&registry, peer, &headers, None)
            .expect("first request")
            .is_none());

        let resp = check_admission(&registry, peer, &headers, None)
            .expect("second request")
            .expect("second request is rejected");
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()["x-rate-limit-limit"], "1");
        assert_eq!(resp.headers()["x-rate-limit-remaining"], "0");
        assert_eq!(resp.headers()["x-rate-limit-reset"], "1");
    }

    #[test]
    fn forwarded_clients_share_a_bucket_across_peers() {
        let registry = registry(1, 1.0);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

        assert!(check_admission(&registry, peer("10.0.0.1:1111"), &headers, None)
            .expect("first request")
            .is_none());
        // same forwarded client arriving via a different hop is still limited
        assert!(check_admission(&registry, peer("10.0.0.2:2222"), &headers, None)
            .expect("second request")
            .is_some());
    }

    #[test]
    fn malformed_forwarded_header_is_surfaced_not_swallowed() {
        let registry = registry(1, 1.0);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        let err = check_admission(&registry, peer("10.0.0.1:1111"), &headers, None)
            .expect_err("malformed key source must error");
        assert!(matches!(err, GateError::KeyExtraction(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn synthetic_response_carries_the_status() {
        let resp = synthetic_response(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
