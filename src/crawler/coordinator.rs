//! Scraper facade - ties the pipeline to a loaded configuration
//!
//! A [`Scraper`] owns one shared [`Fetcher`] (and therefore one connection
//! pool and one robots.txt cache) plus the extractor, and hands them to the
//! paginator and batch fetcher on demand.

use crate::config::{Config, TargetSpec};
use crate::crawler::{BatchFetcher, Extractor, Fetcher, Paginator, SelectorExtractor};
use crate::events::EventSink;
use crate::output::{save_records, OutputError};
use crate::record::{Record, SelectorMap};
use crate::GleanError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Main entry point for library users
pub struct Scraper {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    stop: Arc<AtomicBool>,
    sink: Arc<dyn EventSink>,
}

impl Scraper {
    /// Creates a scraper from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The scraper configuration
    /// * `sink` - Receiver of every event the pipeline reports
    ///
    /// # Returns
    ///
    /// * `Ok(Scraper)` - Ready to scrape
    /// * `Err(GleanError)` - The HTTP client could not be built
    pub fn new(config: Config, sink: Arc<dyn EventSink>) -> Result<Self, GleanError> {
        let fetcher = Fetcher::from_config(&config.scraper, Arc::clone(&sink))?;
        let extractor: Arc<dyn Extractor> = Arc::new(SelectorExtractor::new(Arc::clone(&sink)));

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            extractor,
            stop: Arc::new(AtomicBool::new(false)),
            sink,
        })
    }

    /// Replaces the extraction strategy
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Returns the flag that stops every scrape from admitting new work
    ///
    /// Once set, no further page or URL is fetched; records gathered so far
    /// are still returned.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds a paginator sharing this scraper's fetcher
    pub fn paginator(&self) -> Paginator {
        Paginator::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            self.config.scraper.rate_limit(),
            Arc::clone(&self.sink),
        )
        .with_stop_flag(Arc::clone(&self.stop))
    }

    /// Builds a batch fetcher sharing this scraper's fetcher
    pub fn batch(&self) -> BatchFetcher {
        BatchFetcher::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            Arc::clone(&self.sink),
        )
        .with_concurrency_limit(self.config.scraper.concurrency_limit)
        .with_stop_flag(Arc::clone(&self.stop))
    }

    /// Scrapes a configured target by name
    pub async fn scrape_target(&self, name: &str) -> Result<Vec<Record>, GleanError> {
        let target = self
            .config
            .targets
            .get(name)
            .ok_or_else(|| GleanError::UnknownTarget(name.to_string()))?;

        tracing::info!("Starting scrape of target: {}", name);
        Ok(self.scrape(target).await)
    }

    /// Scrapes an ad-hoc target
    pub async fn scrape(&self, target: &TargetSpec) -> Vec<Record> {
        self.paginator().run(target).await
    }

    /// Fetches and extracts a single page
    pub async fn scrape_url(&self, url: &str, selectors: &SelectorMap) -> Option<Record> {
        self.paginator().scrape_page(url, selectors).await
    }

    /// Scrapes URLs one after another, pausing the rate limit between them
    pub async fn scrape_urls(&self, urls: &[String], selectors: &SelectorMap) -> Vec<Record> {
        let paginator = self.paginator();
        let rate_limit = self.config.scraper.rate_limit();
        let mut records = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::warn!("Stopped after {} of {} URLs", index, urls.len());
                break;
            }
            if index > 0 {
                tokio::time::sleep(rate_limit).await;
            }
            if let Some(record) = paginator.scrape_page(url, selectors).await {
                records.push(record);
            }
        }

        records
    }

    /// Scrapes URLs concurrently within the configured concurrency limit
    pub async fn scrape_urls_concurrent(
        &self,
        urls: &[String],
        selectors: &SelectorMap,
    ) -> Vec<Record> {
        self.batch().fetch_all(urls, selectors).await
    }

    /// Persists records with the configured writer
    ///
    /// Returns `Ok(None)` when there was nothing to write.
    pub fn save(
        &self,
        records: &[Record],
        filename: Option<&str>,
    ) -> Result<Option<PathBuf>, OutputError> {
        save_records(records, &self.config.output, filename)
    }
}
