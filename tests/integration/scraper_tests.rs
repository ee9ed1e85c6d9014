//! Configuration-driven runs through the `Scraper` facade

use crate::common::{html, mount_chain, mount_page, selectors};
use std::path::Path;
use std::sync::Arc;
use sumi_glean::config::parse_config;
use sumi_glean::{CollectingSink, Config, ScrapeEvent, Scraper};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, out_dir: &Path, format: &str) -> Config {
    let toml = format!(
        r#"
[scraper]
timeout-secs = 5
rate-limit-ms = 5
max-retries = 1
user-agent = "GleanTestBot/1.0"

[output]
format = "{format}"
filename = "results"
directory = "{dir}"
include-timestamp = false

[targets.catalogue]
base-url = "{base}/page/1"

[targets.catalogue.selectors]
heading = "h1"
items = "span.item"

[targets.catalogue.pagination]
enabled = true
next-button = "li.next a"
max-pages = 10
"#,
        format = format,
        dir = out_dir.display().to_string().replace('\\', "/"),
        base = server.uri(),
    );
    parse_config(&toml).unwrap()
}

#[tokio::test]
async fn test_paginated_target_saved_as_csv() {
    let server = MockServer::start().await;
    mount_chain(&server, 3).await;
    let dir = TempDir::new().unwrap();

    let scraper = Scraper::new(
        config_for(&server, dir.path(), "csv"),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    let records = scraper.scrape_target("catalogue").await.unwrap();
    assert_eq!(records.len(), 3);

    let saved = scraper.save(&records, None).unwrap().unwrap();
    assert_eq!(saved, dir.path().join("results.csv"));

    let mut reader = csv::Reader::from_path(&saved).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        headers,
        vec!["heading", "items", "page_number", "scraped_at", "source_url"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[2][0], "Page 3");
    assert_eq!(&rows[2][1], "a3; b3");
    assert_eq!(&rows[2][2], "3");
}

#[tokio::test]
async fn test_robots_disallow_blocks_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: GleanTestBot\nDisallow: /page/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/1"))
        .respond_with(html("<h1>should not be fetched</h1>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = Arc::new(CollectingSink::new());
    let scraper = Scraper::new(config_for(&server, dir.path(), "json"), sink.clone()).unwrap();

    let records = scraper.scrape_target("catalogue").await.unwrap();
    assert!(records.is_empty());
    assert_eq!(
        sink.filter(|e| matches!(e, ScrapeEvent::PolicyDenied { .. }))
            .len(),
        1
    );

    // Nothing scraped, nothing written
    assert!(scraper.save(&records, None).unwrap().is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_robots_can_be_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    mount_chain(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let mut config = config_for(&server, dir.path(), "json");
    config.scraper.respect_robots = false;
    let scraper = Scraper::new(config, Arc::new(CollectingSink::new())).unwrap();

    let records = scraper.scrape_target("catalogue").await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_concurrent_url_list_saved_as_json() {
    let server = MockServer::start().await;
    for i in 1..=4 {
        mount_page(
            &server,
            &format!("/item/{}", i),
            html(format!(r#"<h2 class="name">Item {}</h2>"#, i)),
        )
        .await;
    }
    let dir = TempDir::new().unwrap();
    let scraper = Scraper::new(
        config_for(&server, dir.path(), "json"),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    let mut urls: Vec<String> = (1..=4).map(|i| format!("{}/item/{}", server.uri(), i)).collect();
    urls.push(format!("{}/item/missing", server.uri()));

    let records = scraper
        .scrape_urls_concurrent(&urls, &selectors(&[("name", "h2.name")]))
        .await;
    assert_eq!(records.len(), 4);

    let saved = scraper.save(&records, Some("items")).unwrap().unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(saved).unwrap()).unwrap();
    let mut names: Vec<String> = parsed
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Item 1", "Item 2", "Item 3", "Item 4"]);
}

#[test]
fn test_invalid_target_url_is_rejected() {
    let toml = r#"
[targets.broken]
base-url = "not-a-url"

[targets.broken.selectors]
title = "h1"
"#;
    assert!(parse_config(toml).is_err());
}
