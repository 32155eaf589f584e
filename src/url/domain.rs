use url::Url;

/// Builds the per-host key used by rate limiting and robots caching
///
/// The key is the lowercase host, followed by `:port` when the URL names a
/// port explicitly. Two servers on the same host but different ports are
/// treated as separate hosts.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns the lowercase host without any port
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the `scheme://host[:port]` origin used to locate robots.txt
pub fn origin_of(url: &Url) -> Option<String> {
    let key = host_key(url)?;
    Some(format!("{}://{}", url.scheme(), key))
}
