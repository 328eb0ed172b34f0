//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end against a throwaway data directory.

use anjso_crawler::config::{Config, LimitsConfig, RateLimitConfig, TopicConfig};
use anjso_crawler::crawler::{CrawlReport, Crawler, PAGINATION_ANCHOR, TRANSPORT_ERROR_STATUS};
use anjso_crawler::storage::{
    ArtifactMeta, ArtifactStore, CrawlStore, DataLayout, SqliteStore,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration scoped to the mock server
fn create_test_config(base_url: &str, seeds: &[&str], max_pages: u64, max_depth: u32) -> Config {
    Config {
        seeds: seeds.iter().map(|s| format!("{}{}", base_url, s)).collect(),
        limits: LimitsConfig {
            max_pages,
            max_depth,
        },
        rate_limit: RateLimitConfig {
            per_host_rps: 200.0,
            max_parallel: 4,
        },
        respect_robots: false,
        topic: TopicConfig {
            name: "Nanjing".to_string(),
            wiki_base: base_url.to_string(),
        },
        ..Config::default()
    }
}

/// An HTML 200 response linking to the given hrefs
fn html_page(hrefs: &[&str]) -> ResponseTemplate {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href.trim_start_matches("/wiki/")))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", anchors),
        "text/html; charset=UTF-8",
    )
}

async fn mount_page(server: &MockServer, page: &str, hrefs: &[&str]) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html_page(hrefs))
        .mount(server)
        .await;
}

async fn crawl(config: Config, layout: &DataLayout) -> CrawlReport {
    let crawler = Crawler::new(config, layout.clone()).expect("crawler should build");
    tokio::time::timeout(Duration::from_secs(30), crawler.run(CancellationToken::new()))
        .await
        .expect("crawl should terminate")
        .expect("crawl should succeed")
}

fn open_store(layout: &DataLayout) -> SqliteStore {
    SqliteStore::open(&layout.database_path()).expect("database should open")
}

/// Serves `/wiki/Nanjing_{n}` pages, each linking to ten deeper pages
struct EndlessTopic;

impl Respond for EndlessTopic {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n: u64 = request
            .url
            .path()
            .trim_start_matches("/wiki/Nanjing_")
            .parse()
            .unwrap_or(0);
        let hrefs: Vec<String> = (1..=10)
            .map(|i| format!("/wiki/Nanjing_{}", n * 10 + i))
            .collect();
        let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        html_page(&hrefs)
    }
}

#[tokio::test]
async fn test_full_crawl_article_and_category() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/wiki/Nanjing",
        &[
            "/wiki/History_of_Nanjing",
            "/wiki/Nanjing_Metro",
            "/wiki/Shanghai",
            "/wiki/Talk:Nanjing",
            "/wiki/Category:Transport_in_Nanjing",
        ],
    )
    .await;
    mount_page(
        &server,
        "/wiki/History_of_Nanjing",
        &["/wiki/Nanjing", "/wiki/Ming_tombs_in_Nanjing"],
    )
    .await;
    mount_page(&server, "/wiki/Nanjing_Metro", &[]).await;
    mount_page(&server, "/wiki/Nanjing_South_railway_station", &[]).await;

    Mock::given(method("GET"))
        .and(path("/wiki/Category:Transport_in_Nanjing"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                r#"<html><body>
                <div id="mw-subcategories">
                    <a href="/wiki/Category:Transport_in_Shanghai">Transport in Shanghai</a>
                </div>
                <div id="mw-pages">
                    <a href="/wiki/Nanjing_South_railway_station">Nanjing South railway station</a>
                    <a href="/w/index.php?title=Category:Transport_in_Nanjing&amp;pagefrom=Z">next page</a>
                </div>
                </body></html>"#,
                "text/html",
            ),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wiki/Shanghai"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let report = crawl(create_test_config(&base, &["/wiki/Nanjing"], 100, 2), &layout).await;

    // Nanjing, History, Metro, Category (depth 1); South station (depth 2)
    assert_eq!(report.fetched, 5);
    assert!(!report.quota_reached);

    let store = open_store(&layout);
    let root = store
        .get_page_by_url(&format!("{}/wiki/Nanjing", base))
        .unwrap()
        .expect("seed page should exist");
    assert_eq!(root.depth, Some(0));
    assert_eq!(root.last_status, Some(200));
    assert!(root.content_hash.is_some());

    let station = store
        .get_page_by_url(&format!("{}/wiki/Nanjing_South_railway_station", base))
        .unwrap()
        .expect("category member should be crawled");
    assert_eq!(station.depth, Some(2));

    // Out-of-topic links are never followed
    assert!(store
        .get_page_by_url(&format!("{}/wiki/Shanghai", base))
        .unwrap()
        .is_none());

    // Missing page is logged with its status
    let missing = store
        .get_page_by_url(&format!("{}/wiki/Ming_tombs_in_Nanjing", base))
        .unwrap()
        .expect("in-scope link should be attempted");
    assert_eq!(missing.last_status, Some(404));
    let log = store.get_fetch_log(missing.id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].bytes, 0);
    assert!(log[0].error.as_deref().unwrap_or("").starts_with("ctype="));

    // Member and pagination edges; the unrelated subcategory is dropped
    let category = store
        .get_page_by_url(&format!("{}/wiki/Category:Transport_in_Nanjing", base))
        .unwrap()
        .unwrap();
    let edges = store.get_outgoing_links(category.id).unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges
        .iter()
        .any(|e| e.anchor.as_deref() == Some(PAGINATION_ANCHOR)));

    // Raw artifact and sidecar for the seed
    let artifacts = ArtifactStore::new(layout.raw_dir()).unwrap();
    let meta: ArtifactMeta =
        serde_json::from_slice(&std::fs::read(artifacts.meta_path(root.id)).unwrap()).unwrap();
    assert_eq!(meta.url, root.url);
    assert_eq!(meta.status, 200);
    assert_eq!(Some(meta.content_hash), root.content_hash);
    assert!(artifacts.html_path(root.id).is_file());

    server.verify().await;
}

#[tokio::test]
async fn test_quota_termination_is_exact() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path_regex(r"^/wiki/Nanjing_\d+$"))
        .respond_with(EndlessTopic)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let report = crawl(create_test_config(&base, &["/wiki/Nanjing_0"], 7, 10), &layout).await;

    assert_eq!(report.fetched, 7);
    assert!(report.quota_reached);

    let html_files = std::fs::read_dir(layout.raw_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".html"))
        .count();
    assert_eq!(html_files, 7);

    let conn = rusqlite::Connection::open(layout.database_path()).unwrap();
    let successes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM fetch_log WHERE status = 200 AND error IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(successes, 7);
    let hashed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pages WHERE content_hash IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hashed, 7);
}

#[tokio::test]
async fn test_not_modified_short_circuits() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/wiki/Nanjing"))
        .respond_with(html_page(&["/wiki/Nanjing_Metro"]).insert_header("etag", "\"v1\""))
        .mount(&server)
        .await;
    mount_page(&server, "/wiki/Nanjing_Metro", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let first = crawl(create_test_config(&base, &["/wiki/Nanjing"], 100, 2), &layout).await;
    assert_eq!(first.fetched, 2);

    let store = open_store(&layout);
    let url = format!("{}/wiki/Nanjing", base);
    let before = store.get_page_by_url(&url).unwrap().unwrap();
    let artifacts = ArtifactStore::new(layout.raw_dir()).unwrap();
    let body_before = std::fs::read(artifacts.html_path(before.id)).unwrap();

    // Second run: the seed is unchanged and its children must not be revisited
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/wiki/Nanjing"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/Nanjing_Metro"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let second = crawl(create_test_config(&base, &["/wiki/Nanjing"], 100, 2), &layout).await;
    assert_eq!(second.fetched, 0);

    let after = store.get_page_by_url(&url).unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.content_hash, before.content_hash);
    assert_eq!(after.etag.as_deref(), Some("\"v1\""));
    assert_eq!(after.last_status, Some(304));
    assert_eq!(
        std::fs::read(artifacts.html_path(before.id)).unwrap(),
        body_before
    );

    let statuses: Vec<i64> = store
        .get_fetch_log(before.id)
        .unwrap()
        .iter()
        .map(|entry| entry.status)
        .collect();
    assert_eq!(statuses, vec![200, 304]);
    assert_eq!(store.count_pages().unwrap(), 2);

    server.verify().await;
}

#[tokio::test]
async fn test_robots_disallow_skips_without_page_row() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /wiki/Nanjing_Metro\n"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/wiki/Nanjing",
        &["/wiki/Nanjing_Metro", "/wiki/History_of_Nanjing"],
    )
    .await;
    mount_page(&server, "/wiki/History_of_Nanjing", &[]).await;
    Mock::given(method("GET"))
        .and(path("/wiki/Nanjing_Metro"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = create_test_config(&base, &["/wiki/Nanjing"], 100, 1);
    config.respect_robots = true;
    config.fetch.robots_timeout_secs = 2;

    let report = crawl(config, &layout).await;
    assert_eq!(report.fetched, 2);

    let store = open_store(&layout);
    assert!(store
        .get_page_by_url(&format!("{}/wiki/Nanjing_Metro", base))
        .unwrap()
        .is_none());
    assert!(store
        .get_page_by_url(&format!("{}/wiki/History_of_Nanjing", base))
        .unwrap()
        .is_some());

    server.verify().await;
}

#[tokio::test]
async fn test_unreachable_robots_fails_open() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/wiki/Nanjing", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = create_test_config(&base, &["/wiki/Nanjing"], 100, 0);
    config.respect_robots = true;
    config.fetch.robots_timeout_secs = 2;

    let report = crawl(config, &layout).await;
    assert_eq!(report.fetched, 1);
}

#[tokio::test]
async fn test_rate_limit_lower_bound() {
    let server = MockServer::start().await;
    let base = server.uri();

    let children = [
        "/wiki/Nanjing_1",
        "/wiki/Nanjing_2",
        "/wiki/Nanjing_3",
        "/wiki/Nanjing_4",
    ];
    mount_page(&server, "/wiki/Nanjing", &children).await;
    for child in children {
        mount_page(&server, child, &[]).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = create_test_config(&base, &["/wiki/Nanjing"], 100, 1);
    config.rate_limit.per_host_rps = 10.0;

    let report = crawl(config, &layout).await;

    // 5 requests at 10/s: at least (5 - 1) / 10 seconds
    assert_eq!(report.fetched, 5);
    assert!(
        report.elapsed >= Duration::from_millis(400),
        "crawl took only {:?}",
        report.elapsed
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_transport_error_is_logged_and_contained() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/wiki/Nanjing", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = create_test_config(&base, &["/wiki/Nanjing"], 100, 0);
    let dead = "http://127.0.0.1:1/wiki/Nanjing".to_string();
    config.seeds.push(dead.clone());
    config.fetch.request_timeout_secs = 2;

    let report = crawl(config, &layout).await;
    assert_eq!(report.fetched, 1);

    let store = open_store(&layout);
    let page = store.get_page_by_url(&dead).unwrap().unwrap();
    assert_eq!(page.last_status, Some(TRANSPORT_ERROR_STATUS));
    let log = store.get_fetch_log(page.id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, TRANSPORT_ERROR_STATUS);
    assert!(log[0].error.is_some());
}

#[tokio::test]
async fn test_non_html_is_not_stored() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/wiki/Nanjing"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let report = crawl(create_test_config(&base, &["/wiki/Nanjing"], 100, 1), &layout).await;
    assert_eq!(report.fetched, 0);

    let store = open_store(&layout);
    let page = store
        .get_page_by_url(&format!("{}/wiki/Nanjing", base))
        .unwrap()
        .unwrap();
    assert_eq!(page.last_status, Some(200));
    assert!(page.content_hash.is_none());

    let log = store.get_fetch_log(page.id).unwrap();
    assert_eq!(log[0].error.as_deref(), Some("ctype=application/json"));
    assert!(!ArtifactStore::new(layout.raw_dir())
        .unwrap()
        .html_path(page.id)
        .exists());
}

#[tokio::test]
async fn test_cancel_stops_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path_regex(r"^/wiki/Nanjing_\d+$"))
        .respond_with(EndlessTopic)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let crawler = Crawler::new(
        create_test_config(&base, &["/wiki/Nanjing_0"], 10_000, 10),
        layout.clone(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), crawler.run(cancel))
        .await
        .expect("cancelled crawl should return")
        .unwrap();
    assert!(report.cancelled);
    assert!(report.fetched < 10_000);
}

#[tokio::test]
async fn test_malformed_seed_is_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/wiki/Nanjing", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let mut config = create_test_config(&base, &["/wiki/Nanjing"], 100, 0);
    config.seeds.insert(0, "not a url".to_string());
    config.seeds.push("ftp://127.0.0.1/wiki/Nanjing".to_string());

    let report = crawl(config, &layout).await;
    assert_eq!(report.seeded, 1);
    assert_eq!(report.fetched, 1);
    assert_eq!(open_store(&layout).count_pages().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_artifact_write_returns_quota_slot() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/wiki/Nanjing", &[]).await;
    mount_page(&server, "/wiki/Nanjing_Metro", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let config = create_test_config(&base, &["/wiki/Nanjing", "/wiki/Nanjing_Metro"], 1, 0);
    let crawler = Crawler::new(config, layout.clone()).unwrap();

    // Every artifact write now fails
    std::fs::remove_dir_all(layout.raw_dir()).unwrap();
    std::fs::write(layout.raw_dir(), b"").unwrap();

    let cancel = CancellationToken::new();
    let report = tokio::time::timeout(Duration::from_secs(30), crawler.run(cancel))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.fetched, 0);
    assert!(!report.quota_reached);
    assert_eq!(report.discarded, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let store = open_store(&layout);
    for page in ["/wiki/Nanjing", "/wiki/Nanjing_Metro"] {
        let record = store
            .get_page_by_url(&format!("{}{}", base, page))
            .unwrap()
            .unwrap();
        assert!(record.content_hash.is_none());
        let log = store.get_fetch_log(record.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, TRANSPORT_ERROR_STATUS);
    }
}
