use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use sumi_glean::crawler::{Backoff, FetchOptions};
use sumi_glean::{CollectingSink, Fetcher, SelectorMap};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetch options with short timeouts and millisecond backoff
pub fn fast_options(max_attempts: u32) -> FetchOptions {
    FetchOptions {
        timeout: Duration::from_secs(5),
        max_attempts,
        backoff: Backoff::new(
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(40),
        ),
        user_agent: "TestBot/1.0".to_string(),
        headers: BTreeMap::new(),
    }
}

pub fn fetcher(max_attempts: u32, sink: Arc<CollectingSink>) -> Arc<Fetcher> {
    Arc::new(Fetcher::new(fast_options(max_attempts), sink).unwrap())
}

pub fn selectors(pairs: &[(&str, &str)]) -> SelectorMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

pub async fn mount_page(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts `/page/1` .. `/page/n`, each linking to the next except the last
pub async fn mount_chain(server: &MockServer, n: u32) {
    for i in 1..=n {
        let next = if i < n {
            format!(r#"<ul class="pager"><li class="next"><a href="/page/{}">Next</a></li></ul>"#, i + 1)
        } else {
            String::new()
        };
        let body = format!(
            r#"<html><body><h1>Page {}</h1><span class="item">a{}</span><span class="item">b{}</span>{}</body></html>"#,
            i, i, i, next
        );
        mount_page(server, &format!("/page/{}", i), html(body)).await;
    }
}
