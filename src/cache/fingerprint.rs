use std::fmt;

use sha2::{Digest, Sha256};

use crate::crawler::Request;
use crate::url::normalize_parsed;

/// Request headers that change what a server returns and so take part in
/// the fingerprint
const VARY_HEADERS: &[&str] = &["accept", "accept-language"];

/// Stable identity of a cacheable request
///
/// Hex SHA-256 over the normalized URL, the upper-case method and the
/// values of the headers in `VARY_HEADERS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request
    ///
    /// URLs that fail normalization are hashed as given.
    pub fn of(request: &Request) -> Self {
        let url = normalize_parsed(request.url().clone())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| request.url().to_string());

        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(request.method().as_str().to_ascii_uppercase().as_bytes());
        for name in VARY_HEADERS {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(request.headers().get(name).unwrap_or("").as_bytes());
        }

        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
