//! Integration tests for the crawler
//!
//! These tests use wiremock to serve pages and run the full crawl cycle
//! end-to-end through the HTTP page driver.

use rulecrawl::config::{parse_config, Config};
use rulecrawl::crawler::{Coordinator, CrawlOptions};
use rulecrawl::frontier::{EntryStatus, Frontier, SqliteFrontier};
use rulecrawl::sink::{MetadataSink, SqliteSink};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings with short backoffs so failures don't slow the tests down
fn fast_config(backend: &str, sink: &str) -> Config {
    parse_config(&format!(
        r#"
        [navigation]
        max-retries = 2
        retry-backoff-ms = 10
        timeout-ms = 5000
        handle-challenges = false

        [frontier]
        backend = "{}"
        max-retries = 2

        [interaction]
        retry-backoff-ms = 10

        [sink]
        kind = "{}"
        "#,
        backend, sink
    ))
    .expect("Failed to parse test config")
}

const TASK: &str = r##"{
    "crawl_rules": [{
        "from": "/catalog",
        "to": [{ "pattern": "/book/\\d+$", "selector": "#books" }]
    }],
    "metadata_extraction": [{
        "url_pattern": "/book/\\d+$",
        "fields": {
            "title": { "selector": "h1.title" },
            "authors": { "selector": ".author", "collectAll": true, "delimiter": ", " }
        }
    }]
}"##;

fn crawl_options(dir: &Path, seeds: &[String]) -> CrawlOptions {
    let task_path = dir.join("task.json");
    std::fs::write(&task_path, TASK).expect("Failed to write task");
    let links_path = dir.join("links.txt");
    std::fs::write(&links_path, seeds.join("\n")).expect("Failed to write seeds");

    CrawlOptions {
        collection: "books".to_string(),
        output_dir: dir.join("output"),
        task_path,
        links_path,
        ..CrawlOptions::default()
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(html(
            r#"<div id="books">
                <a href="/book/1">First</a>
                <a href="/book/2">Second</a>
                <a href="/book/2#reviews">Second again</a>
            </div>
            <a href="/book/3">Not in scope</a>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/book/1"))
        .respond_with(html(
            r#"<h1 class="title"> First Book </h1>
            <span class="author">Ann</span><span class="author">Bob</span>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/book/2"))
        .respond_with(html(r#"<h1 class="title">Second Book</h1>"#))
        .mount(server)
        .await;
}

fn json_files(dir: &Path) -> Vec<serde_json::Value> {
    let mut records: Vec<serde_json::Value> = std::fs::read_dir(dir)
        .expect("Failed to list jsons")
        .map(|entry| {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            serde_json::from_str(&content).unwrap()
        })
        .collect();
    records.sort_by(|a, b| a["url"].as_str().cmp(&b["url"].as_str()));
    records
}

#[tokio::test]
async fn test_full_crawl_follows_links_and_extracts() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    let options = crawl_options(dir.path(), &[format!("{}/catalog", base)]);
    let mut coordinator = Coordinator::new(fast_config("sqlite", "none"), options)
        .await
        .expect("Setup failed");
    let summary = coordinator
        .run_until(std::future::pending())
        .await
        .expect("Crawl failed");

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.queued, 0);
    assert_eq!(summary.run.records_saved, 2);

    let collection_dir = dir.path().join("output/books");
    let records = json_files(&collection_dir.join("jsons"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["url"], format!("{}/book/1", base));
    assert_eq!(records[0]["title"], "First Book");
    assert_eq!(records[0]["authors"], "Ann, Bob");
    assert_eq!(records[1]["title"], "Second Book");
    assert_eq!(std::fs::read_dir(collection_dir.join("htmls")).unwrap().count(), 2);
    assert!(collection_dir.join("remaining_links.txt").exists());

    // Out-of-scope link was never requested
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/book/3"));

    drop(coordinator);
    let frontier = SqliteFrontier::open(&collection_dir.join("frontier.db"), "books").unwrap();
    assert_eq!(frontier.count_by_status(EntryStatus::Visited).unwrap(), 3);
    assert!(!frontier.has_more_urls().unwrap());
}

#[tokio::test]
async fn test_server_errors_mark_url_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book/9"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let options = crawl_options(dir.path(), &[format!("{}/book/9", server.uri())]);
    let mut coordinator = Coordinator::new(fast_config("memory", "none"), options)
        .await
        .unwrap();
    let summary = coordinator.run_until(std::future::pending()).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.visited, 0);
    // Two frontier attempts with two navigation attempts each
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    assert!(dir.path().join("output/books/frontier_state.json").exists());
}

#[tokio::test]
async fn test_records_forwarded_to_sqlite_sink() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    let options = crawl_options(
        dir.path(),
        &[format!("{}/book/1", base), format!("{}/book/2", base)],
    );
    let mut coordinator = Coordinator::new(fast_config("sqlite", "sqlite"), options)
        .await
        .unwrap();
    let summary = coordinator.run_until(std::future::pending()).await.unwrap();
    drop(coordinator);

    assert_eq!(summary.visited, 2);
    assert_eq!(json_files(&dir.path().join("output/books/jsons")).len(), 2);
    let frontier =
        SqliteFrontier::open(&dir.path().join("output/books/frontier.db"), "books").unwrap();
    assert!(!frontier.has_more_urls().unwrap());

    let sink = SqliteSink::new(dir.path().join("output/books/metadata.db"), None).unwrap();
    sink.connect().await.unwrap();
    assert_eq!(sink.count("crawled_metadata").unwrap(), 2);
    let stored = sink
        .metadata_for("crawled_metadata", &format!("{}/book/2", base))
        .unwrap()
        .expect("Missing record");
    assert_eq!(stored["title"], "Second Book");
}

#[tokio::test]
async fn test_resume_skips_visited_urls() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let seeds = [format!("{}/book/1", base)];

    let options = crawl_options(dir.path(), &seeds);
    let mut first = Coordinator::new(fast_config("sqlite", "none"), options)
        .await
        .unwrap();
    first.run_until(std::future::pending()).await.unwrap();
    drop(first);
    let after_first = server.received_requests().await.unwrap().len();

    let options = crawl_options(dir.path(), &seeds);
    let mut second = Coordinator::new(fast_config("sqlite", "none"), options)
        .await
        .unwrap();
    let summary = second.run_until(std::future::pending()).await.unwrap();

    assert_eq!(summary.visited, 1);
    assert_eq!(summary.run.processed, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), after_first);
}
