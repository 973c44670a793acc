use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{GateError, Result};

/// Opaque identity of a rate-limited client.
///
/// Typically the client's IP address with the port stripped, but any stable
/// textual identity works (the registry only hashes and compares it).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    /// Derive a key from a transport-level peer address string, stripping
    /// the port. Accepts bracketed IPv6 (`"[::1]:443"`). A string that is
    /// not a well-formed `host:port` address is a key-extraction failure.
    pub fn from_peer_addr(remote: &str) -> Result<Self> {
        let addr: SocketAddr = remote
            .parse()
            .map_err(|_| GateError::KeyExtraction(format!("malformed peer address: {remote}")))?;
        Ok(Self(addr.ip().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Derive the client key for an inbound request.
///
/// When the request carries an `X-Forwarded-For` header the first element
/// is used, and it must parse as an IP address: a malformed value is an
/// error for the caller to surface, never a silent fallback to the peer.
/// Without the header, the key is the connection peer's IP.
pub fn extract_client_key(peer: SocketAddr, headers: &http::HeaderMap) -> Result<ClientKey> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        let raw = xff.to_str().map_err(|_| {
            GateError::KeyExtraction("x-forwarded-for header is not valid ASCII".to_string())
        })?;
        let first = raw.split(',').next().unwrap_or_default().trim();
        let ip: IpAddr = first.parse().map_err(|_| {
            GateError::KeyExtraction(format!("malformed x-forwarded-for entry: {first:?}"))
        })?;
        return Ok(ClientKey::from(ip));
    }

    Ok(ClientKey::from(peer.ip()))
}
