//! Paginated traversal
//!
//! Drives fetch + extract cycles over a chain of "next page" links:
//!
//! ```text
//! Start → Fetching(n) → Extracted(n) → NextFound → Fetching(n+1)
//!                     ↘ FetchFailed → Done       ↘ NextAbsent → Done
//! ```
//!
//! Any stop is a normal outcome: the records gathered so far are returned.
//! A shared stop flag is checked before every page fetch.

use crate::config::TargetSpec;
use crate::crawler::links::find_next_link;
use crate::crawler::{Extractor, Fetcher};
use crate::events::{EventSink, ScrapeEvent};
use crate::record::{Record, SelectorMap};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Why a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Pagination is disabled; exactly one page was attempted
    SinglePage,
    /// `max-pages` pages were extracted
    MaxPages,
    /// The current page has no followable next link
    NextAbsent,
    /// The next link points at a page already visited in this traversal
    Cycle,
    /// A page could not be fetched
    FetchFailed,
    /// The stop flag was set before the next page fetch
    Interrupted,
}

/// Result of a traversal
#[derive(Debug, Clone)]
pub struct PaginationOutcome {
    /// One record per extracted page, in page order
    pub records: Vec<Record>,
    pub stop: StopReason,
}

/// Follows next-page links from a target's base URL
pub struct Paginator {
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    rate_limit: Duration,
    stop: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
}

impl Paginator {
    /// Creates a paginator pausing `rate_limit` between page fetches
    pub fn new(
        fetcher: Arc<Fetcher>,
        extractor: Arc<dyn Extractor>,
        rate_limit: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            rate_limit,
            stop: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    /// Shares a stop flag with the caller; no page is fetched once it is set
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Scrapes a target, following pagination if it is enabled
    pub async fn run(&self, target: &TargetSpec) -> Vec<Record> {
        self.run_with_outcome(target).await.records
    }

    /// Scrapes a target and reports why the traversal stopped
    pub async fn run_with_outcome(&self, target: &TargetSpec) -> PaginationOutcome {
        if !target.pagination.enabled {
            if self.is_stopped() {
                return PaginationOutcome {
                    records: Vec::new(),
                    stop: StopReason::Interrupted,
                };
            }
            let records = self
                .scrape_page(&target.base_url, &target.selectors)
                .await
                .into_iter()
                .collect();
            return PaginationOutcome {
                records,
                stop: StopReason::SinglePage,
            };
        }

        let max_pages = target.pagination.max_pages;
        let next_selector = target.pagination.next_button.as_deref();

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(target.base_url.clone());
        let mut page_count: u32 = 0;
        let mut stop = StopReason::MaxPages;

        while page_count < max_pages {
            let Some(url) = current.take() else {
                break;
            };

            if self.is_stopped() {
                stop = StopReason::Interrupted;
                break;
            }

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(_) => {
                    stop = StopReason::FetchFailed;
                    break;
                }
            };

            page_count += 1;
            let record = self
                .extractor
                .extract(&page.body, &target.selectors, &url)
                .with_page_number(page_count);
            self.sink.emit(ScrapeEvent::PageScraped {
                url: url.clone(),
                page_number: page_count,
            });
            records.push(record);
            visited.insert(page.url.to_string());

            let Some(selector) = next_selector else {
                stop = StopReason::NextAbsent;
                break;
            };

            let next = match find_next_link(&page.body, selector, &page.url) {
                Ok(next) => next,
                Err(error) => {
                    self.sink.emit(ScrapeEvent::ParseFailed {
                        url: url.clone(),
                        error,
                    });
                    None
                }
            };

            match next {
                Some(next) if visited.contains(next.as_str()) => {
                    stop = StopReason::Cycle;
                    break;
                }
                Some(next) => current = Some(next.to_string()),
                None => {
                    stop = StopReason::NextAbsent;
                    break;
                }
            }

            tokio::time::sleep(self.rate_limit).await;
        }

        self.sink.emit(ScrapeEvent::PaginationFinished {
            base_url: target.base_url.clone(),
            records: records.len(),
            pages: page_count,
        });

        PaginationOutcome { records, stop }
    }

    /// Fetches and extracts a single page, without page numbering
    ///
    /// Returns `None` when the fetch fails or the stop flag is set.
    pub async fn scrape_page(&self, url: &str, selectors: &SelectorMap) -> Option<Record> {
        if self.is_stopped() {
            return None;
        }
        let page = self.fetcher.fetch(url).await.ok()?;
        Some(self.extractor.extract(&page.body, selectors, url))
    }
}
