//! Crawl scope: which hosts discovered links may lead to

use url::Url;

use super::domain::extract_domain;

/// Checks if a host matches a domain pattern
///
/// `example.com` matches only that host. `*.example.com` matches the bare
/// domain and any subdomain at any depth. Comparison ignores ASCII case.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::matches_pattern;
///
/// assert!(matches_pattern("*.toscrape.com", "books.toscrape.com"));
/// assert!(matches_pattern("*.toscrape.com", "toscrape.com"));
/// assert!(!matches_pattern("*.toscrape.com", "nottoscrape.com"));
/// ```
pub fn matches_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || (host.len() > base.len()
                    && host.ends_with(base)
                    && host.as_bytes()[host.len() - base.len() - 1] == b'.')
        }
        None => host == pattern,
    }
}

/// The set of hosts a crawl may follow links into
#[derive(Debug, Clone)]
pub struct DomainScope {
    patterns: Vec<String>,
}

impl DomainScope {
    /// Builds a scope from configured patterns
    ///
    /// An empty pattern list confines the crawl to the seed hosts.
    pub fn new(allowed_domains: &[String], seeds: &[Url]) -> Self {
        let patterns = if allowed_domains.is_empty() {
            let mut hosts: Vec<String> = seeds.iter().filter_map(extract_domain).collect();
            hosts.sort();
            hosts.dedup();
            hosts
        } else {
            allowed_domains.to_vec()
        };

        Self { patterns }
    }

    /// Returns true if the URL's host is inside the scope
    pub fn allows(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.patterns.iter().any(|p| matches_pattern(p, host)),
            None => false,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
