//! Bounded-concurrency batch fetching
//!
//! Every URL gets its own task. A shared semaphore caps how many fetches are
//! in flight at once; extraction runs after the permit is released.
//! Records come back in completion order, not input order.

use crate::crawler::{Extractor, Fetcher};
use crate::events::{EventSink, ScrapeEvent};
use crate::record::{Record, SelectorMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of fetches allowed in flight
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Fetches and extracts many URLs concurrently
pub struct BatchFetcher {
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    concurrency_limit: usize,
    stop: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
}

impl BatchFetcher {
    pub fn new(
        fetcher: Arc<Fetcher>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            stop: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    /// Sets the in-flight fetch cap; zero is treated as one
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Shares a stop flag with the caller
    ///
    /// Once the flag is set, tasks still waiting for a permit give up without
    /// fetching. Fetches already in flight run to completion.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Fetches every URL and extracts `selectors` from each page
    ///
    /// Failed URLs are reported and omitted; the batch itself never fails.
    pub async fn fetch_all(&self, urls: &[String], selectors: &SelectorMap) -> Vec<Record> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let selectors = Arc::new(selectors.clone());
        let mut tasks = JoinSet::new();

        for url in urls {
            let url = url.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let selectors = Arc::clone(&selectors);
            let semaphore = Arc::clone(&semaphore);
            let stop = Arc::clone(&self.stop);
            let sink = Arc::clone(&self.sink);

            tasks.spawn(async move {
                let fetched = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        if stop.load(Ordering::SeqCst) {
                            sink.emit(ScrapeEvent::TaskFailed {
                                url,
                                error: "batch stopped before fetch".to_string(),
                            });
                            return None;
                        }
                        fetcher.fetch(&url).await
                    }
                    Err(e) => {
                        sink.emit(ScrapeEvent::TaskFailed {
                            url,
                            error: e.to_string(),
                        });
                        return None;
                    }
                };

                match fetched {
                    Ok(page) => Some(extractor.extract(&page.body, &selectors, &url)),
                    Err(e) => {
                        sink.emit(ScrapeEvent::TaskFailed {
                            url,
                            error: e.to_string(),
                        });
                        None
                    }
                }
            });
        }

        let mut records = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => self.sink.emit(ScrapeEvent::TaskFailed {
                    url: String::from("<unknown>"),
                    error: e.to_string(),
                }),
            }
        }

        self.sink.emit(ScrapeEvent::BatchFinished {
            succeeded: records.len(),
            total: urls.len(),
        });

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{Backoff, FetchOptions, SelectorExtractor};
    use crate::events::CollectingSink;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Tracks how many fetches are between their first attempt and their outcome
    #[derive(Default)]
    struct InFlightSink {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EventSink for InFlightSink {
        fn emit(&self, event: ScrapeEvent) {
            match event {
                ScrapeEvent::FetchStarted { attempt: 1, .. } => {
                    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                }
                ScrapeEvent::FetchSucceeded { .. } | ScrapeEvent::FetchFailed { .. } => {
                    self.current.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    fn options() -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(5),
            max_attempts: 1,
            backoff: Backoff::none(),
            user_agent: "TestBot/1.0".to_string(),
            headers: BTreeMap::new(),
        }
    }

    fn batch(sink: Arc<dyn EventSink>) -> BatchFetcher {
        let fetcher = Arc::new(Fetcher::new(options(), Arc::clone(&sink)).unwrap());
        let extractor = Arc::new(SelectorExtractor::new(Arc::clone(&sink)));
        BatchFetcher::new(fetcher, extractor, sink)
    }

    fn selectors() -> SelectorMap {
        let mut selectors = SelectorMap::new();
        selectors.insert("title".to_string(), "h1".to_string());
        selectors
    }

    async fn server_with_failures() -> (MockServer, Vec<String>) {
        let server = MockServer::start().await;
        for ok in ["/a", "/b", "/c"] {
            Mock::given(method("GET"))
                .and(path(ok))
                .respond_with(
                    ResponseTemplate::new(200).set_body_raw(format!("<h1>{}</h1>", ok), "text/html"),
                )
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/a", server.uri()),
            format!("{}/broken", server.uri()),
            format!("{}/b", server.uri()),
            "not a url".to_string(),
            format!("{}/c", server.uri()),
        ];
        (server, urls)
    }

    #[tokio::test]
    async fn test_failures_are_omitted() {
        let (_server, urls) = server_with_failures().await;
        let sink = Arc::new(CollectingSink::new());
        let records = batch(sink.clone()).fetch_all(&urls, &selectors()).await;

        assert_eq!(records.len(), 3);
        let sources: BTreeSet<&str> = records.iter().map(|r| r.source_url()).collect();
        assert!(sources.iter().all(|s| !s.ends_with("/broken")));

        let failed = sink.filter(|e| matches!(e, ScrapeEvent::TaskFailed { .. }));
        assert_eq!(failed.len(), 2);
        let summary = sink.filter(|e| matches!(e, ScrapeEvent::BatchFinished { .. }));
        assert_eq!(
            summary,
            vec![ScrapeEvent::BatchFinished {
                succeeded: 3,
                total: 5
            }]
        );
    }

    #[tokio::test]
    async fn test_result_independent_of_limit() {
        let (_server, urls) = server_with_failures().await;
        for limit in 1..=10 {
            let sink: Arc<dyn EventSink> = Arc::new(CollectingSink::new());
            let records = batch(sink)
                .with_concurrency_limit(limit)
                .fetch_all(&urls, &selectors())
                .await;
            assert_eq!(records.len(), 3, "limit {}", limit);
        }
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<h1>slow</h1>", "text/html")
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let urls: Vec<String> = (0..8).map(|i| format!("{}/page/{}", server.uri(), i)).collect();
        let tracker = Arc::new(InFlightSink::default());
        let records = batch(tracker.clone())
            .with_concurrency_limit(2)
            .fetch_all(&urls, &selectors())
            .await;

        assert_eq!(records.len(), 8);
        let peak = tracker.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let sink = Arc::new(CollectingSink::new());
        let records = batch(sink.clone()).fetch_all(&[], &selectors()).await;
        assert!(records.is_empty());
        assert_eq!(
            sink.events(),
            vec![ScrapeEvent::BatchFinished {
                succeeded: 0,
                total: 0
            }]
        );
    }

    #[tokio::test]
    async fn test_stopped_batch_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>x</h1>", "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let stop = Arc::new(AtomicBool::new(true));
        let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
        let sink = Arc::new(CollectingSink::new());
        let records = batch(sink.clone())
            .with_stop_flag(stop)
            .fetch_all(&urls, &selectors())
            .await;

        assert!(records.is_empty());
        assert_eq!(
            sink.filter(|e| matches!(e, ScrapeEvent::TaskFailed { .. }))
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_same_origin_batch_fetches_robots_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nAllow: /")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/item/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>item</h1>", "text/html"))
            .expect(5)
            .mount(&server)
            .await;

        let urls: Vec<String> = (0..5).map(|i| format!("{}/item/{}", server.uri(), i)).collect();
        let records = batch(Arc::new(CollectingSink::new()))
            .with_concurrency_limit(5)
            .fetch_all(&urls, &selectors())
            .await;

        assert_eq!(records.len(), 5);
    }
}
