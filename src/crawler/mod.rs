//! Scraping pipeline
//!
//! This module contains the fetch → extract → paginate pipeline:
//! - HTTP fetching with robots.txt checks and retry with backoff
//! - Selector-driven field extraction
//! - Next-link pagination with a rate limit between pages
//! - Bounded-concurrency batch fetching
//! - The [`Scraper`] facade tying them to a [`Config`](crate::config::Config)

mod backoff;
mod batch;
mod coordinator;
mod extractor;
mod fetcher;
mod links;
mod paginator;

pub use backoff::Backoff;
pub use batch::{BatchFetcher, DEFAULT_CONCURRENCY_LIMIT};
pub use coordinator::Scraper;
pub use extractor::{clean_text, parse_markup, select_texts, Extractor, SelectorExtractor};
pub use fetcher::{build_http_client, is_html_content_type, FetchOptions, FetchedPage, Fetcher};
pub use links::find_next_link;
pub use paginator::{PaginationOutcome, Paginator, StopReason};
