//! End-to-end properties of fetch, extract, paginate and batch

use crate::common::{fetcher, html, mount_chain, mount_page, selectors};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use sumi_glean::config::TargetSpec;
use sumi_glean::{
    BatchFetcher, CollectingSink, Extractor, FetchError, FieldValue, Paginator, ScrapeEvent,
    SelectorExtractor,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key_set(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[test]
fn test_record_keys_follow_selector_map() {
    let sink = Arc::new(CollectingSink::new());
    let extractor = SelectorExtractor::new(sink);
    let markup = "<h1>One</h1><p>x</p><p>y</p><p>z</p>";

    let cases = [
        selectors(&[("title", "h1")]),
        selectors(&[("title", "h1"), ("paras", "p")]),
        selectors(&[("missing", ".nothing"), ("paras", "p")]),
        selectors(&[("broken", "p:::"), ("title", "h1")]),
    ];

    for map in &cases {
        let record = extractor.extract(markup, map, "https://example.com/");
        let mut expected: BTreeSet<String> = map.keys().cloned().collect();
        expected.insert("source_url".to_string());
        expected.insert("scraped_at".to_string());
        assert_eq!(record.keys(), expected, "selectors {:?}", map);
    }
}

#[test]
fn test_unparseable_markup_has_only_source_and_error() {
    let extractor = SelectorExtractor::new(Arc::new(CollectingSink::new()));
    let record = extractor.extract(
        "\u{0}\u{0}binary",
        &selectors(&[("title", "h1")]),
        "https://example.com/file.bin",
    );
    assert_eq!(record.keys(), key_set(&["error", "source_url"]));
}

#[test]
fn test_heading_and_paragraphs_round_trip() {
    let extractor = SelectorExtractor::new(Arc::new(CollectingSink::new()));
    let record = extractor.extract(
        "<h1>Test Title</h1><p>A</p><p>B</p>",
        &selectors(&[("title", "h1"), ("content", "p")]),
        "https://example.com/",
    );

    assert_eq!(
        record.get("title"),
        Some(&FieldValue::Text("Test Title".to_string()))
    );
    assert_eq!(
        record.get("content"),
        Some(&FieldValue::List(vec!["A".to_string(), "B".to_string()]))
    );
    assert_eq!(
        record.keys(),
        key_set(&["content", "scraped_at", "source_url", "title"])
    );
}

#[tokio::test]
async fn test_invalid_url_makes_no_attempt() {
    let sink = Arc::new(CollectingSink::new());
    let result = fetcher(3, sink.clone()).fetch("not-a-url").await;

    assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    assert!(sink
        .filter(|e| matches!(e, ScrapeEvent::FetchStarted { .. }))
        .is_empty());
}

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/flaky", html("<h1>finally</h1>")).await;

    let sink = Arc::new(CollectingSink::new());
    let page = fetcher(3, sink.clone())
        .fetch(&format!("{}/flaky", server.uri()))
        .await
        .unwrap();
    assert!(page.body.contains("finally"));

    let started = sink.filter(|e| matches!(e, ScrapeEvent::FetchStarted { .. }));
    assert_eq!(started.len(), 3);

    let delays: Vec<Duration> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ScrapeEvent::RetryScheduled { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();
    assert_eq!(delays.len(), 2);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
}

fn paginator(sink: Arc<CollectingSink>) -> Paginator {
    Paginator::new(
        fetcher(1, sink.clone()),
        Arc::new(SelectorExtractor::new(sink.clone())),
        Duration::from_millis(5),
        sink,
    )
}

#[tokio::test]
async fn test_three_page_chain_yields_three_records() {
    let server = MockServer::start().await;
    mount_chain(&server, 3).await;

    let target = TargetSpec::new(
        format!("{}/page/1", server.uri()),
        selectors(&[("heading", "h1"), ("items", "span.item")]),
    )
    .paginated("li.next a", 10);

    let sink = Arc::new(CollectingSink::new());
    let records = paginator(sink.clone()).run(&target).await;

    let pages: Vec<Option<u32>> = records.iter().map(|r| r.page_number()).collect();
    assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(
        records[1].get("items"),
        Some(&FieldValue::List(vec!["a2".to_string(), "b2".to_string()]))
    );
    assert_eq!(
        sink.filter(|e| matches!(e, ScrapeEvent::PageScraped { .. }))
            .len(),
        3
    );
    assert!(sink
        .filter(|e| matches!(e, ScrapeEvent::NonHtmlContent { .. }))
        .is_empty());
}

#[tokio::test]
async fn test_max_pages_two_stops_early() {
    let server = MockServer::start().await;
    mount_chain(&server, 3).await;

    let target = TargetSpec::new(
        format!("{}/page/1", server.uri()),
        selectors(&[("heading", "h1")]),
    )
    .paginated("li.next a", 2);

    let records = paginator(Arc::new(CollectingSink::new())).run(&target).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].page_number(), Some(2));
}

#[tokio::test]
async fn test_batch_isolates_failures_for_every_limit() {
    let server = MockServer::start().await;
    for ok in ["/ok/1", "/ok/2", "/ok/3"] {
        mount_page(&server, ok, html(format!("<h1>{}</h1>", ok))).await;
    }
    for bad in ["/bad/1", "/bad/2"] {
        Mock::given(method("GET"))
            .and(path(bad))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
    }

    let urls: Vec<String> = ["/ok/1", "/bad/1", "/ok/2", "/bad/2", "/ok/3"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();

    for limit in 1..=10 {
        let sink = Arc::new(CollectingSink::new());
        let batch = BatchFetcher::new(
            fetcher(2, sink.clone()),
            Arc::new(SelectorExtractor::new(sink.clone())),
            sink.clone(),
        )
        .with_concurrency_limit(limit);

        let records = batch.fetch_all(&urls, &selectors(&[("title", "h1")])).await;

        assert_eq!(records.len(), 3, "limit {}", limit);
        let finished = sink.filter(|e| matches!(e, ScrapeEvent::BatchFinished { .. }));
        assert_eq!(finished[0].to_string(), "3 out of 5 succeeded.");
    }
}
