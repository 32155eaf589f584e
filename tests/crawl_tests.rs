//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use sumi_harvest::config::Config;
use sumi_harvest::extract::ExtractError;
use sumi_harvest::state::{FailureCause, SkipReason};
use sumi_harvest::{crawl, host_key, Coordinator, ExtractedValue, TaskOutcome};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration
///
/// `crawler` is appended to the `[crawler]` table and gets short delays
/// unless it sets its own; `rest` may add tables such as `[extract]`.
fn create_test_config(seeds: &[String], crawler: &str, rest: &str) -> Config {
    let seeds = seeds
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ");
    let politeness = if crawler.contains("delay-seconds") {
        ""
    } else {
        "min-delay-seconds = 0.01\nmax-delay-seconds = 0.1"
    };
    let content = format!(
        r#"
seeds = [{seeds}]

[crawler]
fetch-timeout-seconds = 5.0
{politeness}
{crawler}

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

{rest}
"#
    );
    toml::from_str(&content).expect("test config should parse")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, p: &str, template: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_robots_denied_link_is_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/page1",
        html(r#"<a href="/page2">Two</a> <a href="/private/page3">Three</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/page2", html(r#"<a href="/page1">Back</a>"#), 1).await;
    mount_page(&server, "/private/page3", html("secret"), 0).await;

    let config = create_test_config(&[format!("{}/page1", base)], "max-depth = 2", "");
    let report = crawl(config).await.unwrap();

    assert_eq!(report.manifest.len(), 3);
    assert_eq!(
        report.entry(&format!("{}/page1", base)).unwrap().outcome,
        TaskOutcome::Succeeded
    );
    assert_eq!(
        report.entry(&format!("{}/page2", base)).unwrap().outcome,
        TaskOutcome::Succeeded
    );
    assert_eq!(
        report.entry(&format!("{}/private/page3", base)).unwrap().outcome,
        TaskOutcome::Skipped(SkipReason::PolicyDenied)
    );
    assert!(!report.cancelled);
    assert!(report.remaining.is_empty());

    server.verify().await;
}

#[tokio::test]
async fn test_transient_503_is_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/flaky", html("<h1>Finally</h1>"), 1).await;

    let seed = format!("{}/flaky", base);
    let config = create_test_config(
        &[seed.clone()],
        "max-retries = 3\nrespect-robots = false",
        "",
    );
    let coordinator = Coordinator::new(config).unwrap();
    let limiter = coordinator.rate_limiter();

    let report = coordinator.run().await.unwrap();

    let entry = report.entry(&seed).unwrap();
    assert_eq!(entry.outcome, TaskOutcome::Succeeded);
    assert_eq!(entry.retries, 2);
    assert_eq!(entry.status, Some(200));

    let host = host_key(&Url::parse(&seed).unwrap()).unwrap();
    assert_eq!(limiter.penalty_count(&host), 2);

    server.verify().await;
}

#[tokio::test]
async fn test_retries_exhausted_fails() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/down", ResponseTemplate::new(429), 2).await;

    let seed = format!("{}/down", base);
    let config = create_test_config(
        &[seed.clone()],
        "max-retries = 1\nrespect-robots = false",
        "",
    );
    let report = crawl(config).await.unwrap();

    let entry = report.entry(&seed).unwrap();
    assert_eq!(
        entry.outcome,
        TaskOutcome::Failed(FailureCause::HttpStatus(429))
    );
    assert_eq!(entry.retries, 1);

    server.verify().await;
}

#[tokio::test]
async fn test_permanent_status_is_not_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<a href="/gone">Gone</a>"#), 1).await;
    mount_page(&server, "/gone", ResponseTemplate::new(404), 1).await;

    let config = create_test_config(&[format!("{}/", base)], "respect-robots = false", "");
    let coordinator = Coordinator::new(config).unwrap();
    let limiter = coordinator.rate_limiter();
    let report = coordinator.run().await.unwrap();

    let entry = report.entry(&format!("{}/gone", base)).unwrap();
    assert_eq!(
        entry.outcome,
        TaskOutcome::Failed(FailureCause::HttpStatus(404))
    );
    assert_eq!(entry.retries, 0);
    assert_eq!(entry.parent.as_deref(), Some(format!("{}/", base).as_str()));
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);

    let host = host_key(&Url::parse(&base).unwrap()).unwrap();
    assert_eq!(limiter.penalty_count(&host), 0);

    server.verify().await;
}

#[tokio::test]
async fn test_equivalent_seeds_fetch_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/page", html("<h1>Once</h1>"), 1).await;

    let config = create_test_config(
        &[format!("{}/page", base), format!("{}/page/", base)],
        "respect-robots = false",
        "",
    );
    let report = crawl(config).await.unwrap();

    assert_eq!(report.manifest.len(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.duplicates(), 1);
    assert_eq!(
        report.entry(&format!("{}/page/", base)).unwrap().outcome,
        TaskOutcome::Duplicate
    );

    server.verify().await;
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<a href="/a">A</a>"#), 1).await;
    mount_page(&server, "/a", html(r#"<a href="/b">B</a>"#), 1).await;
    mount_page(&server, "/b", html("too deep"), 0).await;

    let config = create_test_config(
        &[format!("{}/", base)],
        "max-depth = 1\nrespect-robots = false",
        "",
    );
    let report = crawl(config).await.unwrap();

    assert_eq!(report.manifest.len(), 2);
    assert_eq!(report.entry(&format!("{}/a", base)).unwrap().depth, 1);
    assert!(report.entry(&format!("{}/b", base)).is_none());

    server.verify().await;
}

#[tokio::test]
async fn test_out_of_scope_links_are_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="https://elsewhere.test/page">Away</a> <a href="/local">Local</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/local", html("here"), 1).await;

    let config = create_test_config(&[format!("{}/", base)], "respect-robots = false", "");
    let report = crawl(config).await.unwrap();

    assert_eq!(report.manifest.len(), 2);
    assert!(report.entry("https://elsewhere.test/page").is_none());

    server.verify().await;
}

#[tokio::test]
async fn test_task_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/a", html("a"), 1).await;

    let config = create_test_config(
        &[format!("{}/", base)],
        "max-tasks = 2\nrespect-robots = false",
        "",
    );
    let report = crawl(config).await.unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 2);
    assert_eq!(
        report.entry(&format!("{}/c", base)).unwrap().outcome,
        TaskOutcome::Skipped(SkipReason::TaskLimit)
    );

    server.verify().await;
}

#[tokio::test]
async fn test_item_extraction() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/catalogue",
        html(
            r#"
            <div class="product"><h3>Alpha</h3><p class="price">£10.50</p></div>
            <div class="product"><h3>Beta</h3></div>
            <div class="product"><h3>Gamma</h3><p class="price">£3</p></div>
            "#,
        ),
        1,
    )
    .await;

    let seed = format!("{}/catalogue", base);
    let config = create_test_config(
        &[seed.clone()],
        "respect-robots = false",
        r#"
[extract]
item-selector = "class:product"

[[extract.field]]
name = "title"
selector = "tag:h3"

[[extract.field]]
name = "price"
selector = "class:price"
type = "number"
"#,
    );
    let report = crawl(config).await.unwrap();

    assert_eq!(report.records.len(), 2);
    let alpha = &report.records[0];
    assert_eq!(alpha.url, seed);
    assert_eq!(
        alpha.get("title"),
        Some(&ExtractedValue::Text("Alpha".to_string()))
    );
    assert_eq!(alpha.get("price"), Some(&ExtractedValue::Number(10.5)));
    assert_eq!(
        report.records[1].get("title"),
        Some(&ExtractedValue::Text("Gamma".to_string()))
    );

    let entry = report.entry(&seed).unwrap();
    assert_eq!(entry.outcome, TaskOutcome::Succeeded);
    assert_eq!(entry.records, 2);
    assert_eq!(
        entry.extraction_errors,
        vec![ExtractError::MissingField {
            field: "price".to_string()
        }]
    );
}

#[tokio::test]
async fn test_non_html_is_not_parsed() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/data",
        ResponseTemplate::new(200).set_body_raw(r#"{"href": "/a"}"#, "application/json"),
        1,
    )
    .await;
    mount_page(&server, "/a", html("unreachable"), 0).await;

    let seed = format!("{}/data", base);
    let config = create_test_config(
        &[seed.clone()],
        "respect-robots = false",
        "[extract]\n[[extract.field]]\nname = \"title\"\nselector = \"tag:h1\"\n",
    );
    let report = crawl(config).await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert!(report.records.is_empty());
    assert!(report.entry(&seed).unwrap().extraction_errors.is_empty());

    server.verify().await;
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("cache.db");

    mount_page(&server, "/page", html("<h1>Cached</h1>"), 1).await;

    let seed = format!("{}/page", base);
    let cache_table = format!(
        "[cache]\nttl-seconds = 3600\ndatabase-path = \"{}\"\n",
        db.display().to_string().replace('\\', "\\\\")
    );

    for from_cache in [false, true] {
        let config = create_test_config(&[seed.clone()], "respect-robots = false", &cache_table);
        let report = crawl(config).await.unwrap();

        let entry = report.entry(&seed).unwrap();
        assert_eq!(entry.outcome, TaskOutcome::Succeeded);
        assert_eq!(entry.from_cache, from_cache);
    }

    server.verify().await;
}

#[tokio::test]
async fn test_crawl_timeout_keeps_partial_results() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<h1>Home</h1><a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a>"#),
        1,
    )
    .await;
    for p in ["/a", "/b", "/c"] {
        mount_page(&server, p, html("<h1>Later</h1>"), 0).await;
    }

    let config = create_test_config(
        &[format!("{}/", base)],
        "respect-robots = false\nmin-delay-seconds = 5.0\nmax-delay-seconds = 10.0\ncrawl-timeout-seconds = 0.5",
        "[extract]\n[[extract.field]]\nname = \"heading\"\nselector = \"tag:h1\"\n",
    );
    let report = crawl(config).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.remaining.len(), 3);
    assert!(report.remaining.iter().all(|t| t.depth == 1));

    server.verify().await;
}

#[tokio::test]
async fn test_external_cancellation() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<a href="/a">A</a>"#), 1).await;
    mount_page(&server, "/a", html("later"), 0).await;

    let config = create_test_config(
        &[format!("{}/", base)],
        "respect-robots = false\nmin-delay-seconds = 5.0\nmax-delay-seconds = 10.0",
        "",
    );
    let coordinator = Coordinator::new(config).unwrap();
    let token = coordinator.cancellation_token();

    let handle = tokio::spawn(coordinator.run());
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    token.cancel();

    let report = handle.await.unwrap().unwrap();

    assert!(report.cancelled);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.remaining.len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_invalid_config_aborts_before_crawling() {
    let server = MockServer::start().await;

    let config = create_test_config(
        &[format!("{}/", server.uri())],
        "",
        "[extract]\n[[extract.field]]\nname = \"title\"\nselector = \"path:h1[[\"\n",
    );

    assert!(crawl(config).await.is_err());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
