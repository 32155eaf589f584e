//! HTTP fetcher implementation
//!
//! This module issues HTTP requests for the crawler:
//! - Building HTTP clients with the configured user agent string
//! - Following redirects manually, with loop detection and a hop limit
//! - Classifying network failures as transient or permanent
//!
//! HTTP error statuses are not failures here. A 404 or 503 comes back as an
//! ordinary `Response` so the caller decides what to do. The fetcher never
//! retries.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client, Method, StatusCode};
use thiserror::Error;
use url::Url;

use super::http::{Headers, Request, Response};
use crate::config::Config;

/// Default number of redirect hops followed
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Category of a network-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The request did not complete within the timeout
    Timeout,
    /// DNS resolution or TCP/TLS connection failed
    Connect,
    /// The request could not be sent
    Request,
    /// The response body could not be read or decoded
    Body,
    /// Anything else, including malformed requests
    Other,
}

impl NetworkErrorKind {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Other)
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else if err.is_body() || err.is_decode() {
            Self::Body
        } else if err.is_request() {
            Self::Request
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Other => "other",
        };
        write!(f, "{}", label)
    }
}

/// Failures reported by the fetcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error ({kind}) for {url}: {message}")]
    Network {
        url: String,
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("redirect loop or more than {limit} redirects starting at {url}")]
    RedirectLoop { url: String, limit: u32 },

    #[error("fetch timeout must be a positive duration")]
    InvalidTimeout,
}

impl FetchError {
    /// Network errors other than `Other` are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { kind, .. } => kind.is_transient(),
            Self::RedirectLoop { .. } | Self::InvalidTimeout => false,
        }
    }

    fn network(url: &Url, err: &reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            kind: NetworkErrorKind::from_reqwest(err),
            message: err.to_string(),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; `HttpFetcher` follows them itself.
///
/// # Arguments
///
/// * `user_agent` - Full User-Agent header value
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues single HTTP requests with manual redirect handling
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: u32,
}

impl HttpFetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `user_agent` - User-Agent header sent with every request
    /// * `max_redirects` - Redirect hops followed before `RedirectLoop`
    pub fn new(user_agent: &str, max_redirects: u32) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
            max_redirects,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.user_agent.user_agent_string(),
            config.crawler.max_redirects,
        )
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Fetches a request, following redirects
    ///
    /// # Redirects
    ///
    /// | Status | Next request |
    /// |--------|--------------|
    /// | 301, 302, 303 | GET without body (HEAD stays HEAD) |
    /// | 307, 308 | Same method and body |
    ///
    /// A URL seen twice in one chain, or more than `max_redirects` hops,
    /// yields `FetchError::RedirectLoop`. A 3xx without a usable `Location`
    /// is returned as the response.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to send
    /// * `timeout` - Bound on the whole fetch including redirects; must be positive
    pub async fn fetch(&self, request: &Request, timeout: Duration) -> Result<Response, FetchError> {
        if timeout.is_zero() {
            return Err(FetchError::InvalidTimeout);
        }

        match tokio::time::timeout(timeout, self.fetch_following(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Network {
                url: request.url().to_string(),
                kind: NetworkErrorKind::Timeout,
                message: format!("no response within {:?}", timeout),
            }),
        }
    }

    async fn fetch_following(&self, request: &Request) -> Result<Response, FetchError> {
        let mut method = request.method().clone();
        let mut body = request.body().map(<[u8]>::to_vec);
        let mut current = request.url().clone();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(current.to_string());
        let mut hops = 0u32;

        loop {
            let mut builder = self.client.request(method.clone(), current.clone());
            for (name, value) in request.headers().iter() {
                builder = builder.header(name, value);
            }
            if let Some(bytes) = &body {
                builder = builder.body(bytes.clone());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| FetchError::network(&current, &e))?;
            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| current.join(location).ok());

                if let Some(next) = next {
                    hops += 1;
                    if hops > self.max_redirects || !seen.insert(next.to_string()) {
                        return Err(FetchError::RedirectLoop {
                            url: request.url().to_string(),
                            limit: self.max_redirects,
                        });
                    }

                    tracing::debug!("Redirect {} {} -> {}", status.as_u16(), current, next);

                    if matches!(
                        status,
                        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
                    ) {
                        if method != Method::HEAD {
                            method = Method::GET;
                        }
                        body = None;
                    }

                    current = next;
                    continue;
                }
            }

            let headers = Headers::from(response.headers());
            let final_url = response.url().to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::network(&current, &e))?;

            return Ok(Response {
                status: status.as_u16(),
                headers,
                body: bytes.to_vec(),
                final_url,
                fetched_at: Utc::now(),
            });
        }
    }
}
