//! Link discovery in fetched HTML
//!
//! Only `<a href>` links are followed. Each page's list is de-duplicated in
//! discovery order. Parsing is synchronous: `scraper::Html` is not `Send`
//! and must never live across an await point.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Returns true if a response with this content type should be parsed as HTML
///
/// A missing content type is treated as HTML.
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => ct.to_ascii_lowercase().contains("html"),
        None => true,
    }
}

/// Extracts the absolute HTTP(S) links of a page
///
/// A `<base href>` element, when present, replaces the page URL as the base
/// for relative links.
///
/// # Skipped links
///
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Fragment-only anchors
/// - `<a download>` links
/// - Anything that does not resolve to http or https
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::discover_links;
/// use url::Url;
///
/// let html = r#"<a href="/a">A</a><a href="/a#top">A again</a><a href="mailto:x@y.z">m</a>"#;
/// let page = Url::parse("https://example.com/index").unwrap();
/// let links = discover_links(html, &page);
/// assert_eq!(links.len(), 2);
/// ```
pub fn discover_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchor) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, &base))
        else {
            continue;
        };

        if seen.insert(link.to_string()) {
            links.push(link);
        }
    }

    links
}

/// Resolves the effective base URL from `<base href>`
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should not be followed.
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        discover_links(html, &page_url())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_absolute_and_relative_links() {
        let found = links(
            r#"<a href="https://other.com/x">1</a><a href="/root">2</a><a href="sibling">3</a>"#,
        );
        assert_eq!(
            found,
            vec![
                "https://other.com/x",
                "https://example.com/root",
                "https://example.com/dir/sibling",
            ]
        );
    }

    #[test]
    fn test_skip_special_schemes() {
        let found = links(
            r#"<a href="javascript:void(0)">j</a>
               <a href="MAILTO:a@b.com">m</a>
               <a href="tel:+100">t</a>
               <a href="data:text/plain,hi">d</a>
               <a href="ftp://example.com/file">f</a>"#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_skip_fragment_and_download() {
        let found = links(r##"<a href="#top">top</a><a href="/file.zip" download>zip</a>"##);
        assert!(found.is_empty());
    }

    #[test]
    fn test_deduplicates_per_page() {
        let found = links(r#"<a href="/a">1</a><a href="/a">2</a><a href="/b">3</a>"#);
        assert_eq!(found, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_base_element() {
        let found = links(r#"<head><base href="https://cdn.example.com/root/"></head><a href="x">x</a>"#);
        assert_eq!(found, vec!["https://cdn.example.com/root/x"]);
    }

    #[test]
    fn test_malformed_html() {
        let found = links(r#"<div><a href="/ok">unclosed <p><a href="/also">x"#);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(is_html(None));
        assert!(!is_html(Some("application/json")));
        assert!(!is_html(Some("image/png")));
    }
}
