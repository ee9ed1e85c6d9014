//! Classified scrape events
//!
//! The pipeline never logs directly. Each component receives an
//! [`EventSink`] and reports what happened as a [`ScrapeEvent`]; the binary
//! wires in [`TracingSink`], tests use [`CollectingSink`].

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::Level;

/// Something worth reporting that happened during a scrape
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    /// A network attempt is about to be made
    FetchStarted { url: String, attempt: u32 },

    /// A page was fetched with a 2xx status
    FetchSucceeded {
        url: String,
        status: u16,
        bytes: usize,
    },

    /// The response did not declare an HTML content type; the body is kept
    NonHtmlContent { url: String, content_type: String },

    /// The URL failed validation; no request was made
    InvalidUrl { url: String },

    /// robots.txt disallows the URL; no request was made
    PolicyDenied { url: String, user_agent: String },

    /// robots.txt could not be retrieved, so the origin is treated as permissive
    RobotsUnavailable { robots_url: String, reason: String },

    /// One network attempt failed
    AttemptFailed {
        url: String,
        attempt: u32,
        timed_out: bool,
        error: String,
    },

    /// The fetcher will wait before the next attempt
    RetryScheduled {
        url: String,
        attempt: u32,
        delay: Duration,
    },

    /// All attempts were exhausted
    FetchFailed {
        url: String,
        attempts: u32,
        error: String,
    },

    /// A selector matched no element
    EmptySelector {
        url: String,
        field: String,
        selector: String,
    },

    /// Extraction of a single field failed
    FieldFailed {
        url: String,
        field: String,
        selector: String,
        error: String,
    },

    /// The markup could not be parsed at all
    ParseFailed { url: String, error: String },

    /// A paginated page was extracted
    PageScraped { url: String, page_number: u32 },

    /// A paginated traversal ended
    PaginationFinished {
        base_url: String,
        records: usize,
        pages: u32,
    },

    /// A batch task produced no record
    TaskFailed { url: String, error: String },

    /// A batch fetch completed
    BatchFinished { succeeded: usize, total: usize },
}

impl ScrapeEvent {
    /// Returns the severity this event is reported at
    pub fn level(&self) -> Level {
        match self {
            Self::FetchStarted { .. }
            | Self::FetchSucceeded { .. }
            | Self::PageScraped { .. }
            | Self::PaginationFinished { .. }
            | Self::BatchFinished { .. } => Level::INFO,
            Self::RetryScheduled { .. } | Self::RobotsUnavailable { .. } => Level::DEBUG,
            Self::NonHtmlContent { .. } | Self::PolicyDenied { .. } | Self::EmptySelector { .. } => {
                Level::WARN
            }
            Self::AttemptFailed { timed_out, .. } => {
                if *timed_out {
                    Level::WARN
                } else {
                    Level::ERROR
                }
            }
            Self::InvalidUrl { .. }
            | Self::FetchFailed { .. }
            | Self::FieldFailed { .. }
            | Self::ParseFailed { .. }
            | Self::TaskFailed { .. } => Level::ERROR,
        }
    }
}

impl fmt::Display for ScrapeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchStarted { url, attempt } => {
                if *attempt > 1 {
                    write!(f, "Fetching: {} (attempt {})", url, attempt)
                } else {
                    write!(f, "Fetching: {}", url)
                }
            }
            Self::FetchSucceeded { url, status, bytes } => {
                write!(f, "Fetched {} (HTTP {}, {} bytes)", url, status, bytes)
            }
            Self::NonHtmlContent { url, content_type } => {
                write!(f, "Non-HTML content type for {}: {:?}", url, content_type)
            }
            Self::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
            Self::PolicyDenied { url, user_agent } => {
                write!(f, "Robots.txt disallows scraping {} for {}", url, user_agent)
            }
            Self::RobotsUnavailable { robots_url, reason } => write!(
                f,
                "Could not read {} ({}), assuming scraping is allowed",
                robots_url, reason
            ),
            Self::AttemptFailed {
                url,
                attempt,
                timed_out,
                error,
            } => {
                if *timed_out {
                    write!(f, "Timeout fetching {} on attempt {}: {}", url, attempt, error)
                } else {
                    write!(f, "Request failed for {} on attempt {}: {}", url, attempt, error)
                }
            }
            Self::RetryScheduled {
                url,
                attempt,
                delay,
            } => write!(
                f,
                "Retrying {} in {:?} (attempt {} next)",
                url,
                delay,
                attempt + 1
            ),
            Self::FetchFailed {
                url,
                attempts,
                error,
            } => write!(
                f,
                "Giving up on {} after {} attempt(s): {}",
                url, attempts, error
            ),
            Self::EmptySelector {
                url,
                field,
                selector,
            } => write!(
                f,
                "No elements found for selector {:?} (field {}) on {}",
                selector, field, url
            ),
            Self::FieldFailed {
                url,
                field,
                selector,
                error,
            } => write!(
                f,
                "Error parsing field {} with selector {:?} on {}: {}",
                field, selector, url, error
            ),
            Self::ParseFailed { url, error } => write!(f, "Error parsing HTML from {}: {}", url, error),
            Self::PageScraped { url, page_number } => {
                write!(f, "Scraped page {}: {}", page_number, url)
            }
            Self::PaginationFinished {
                base_url,
                records,
                pages,
            } => write!(
                f,
                "Scraped {} items from {} pages starting at {}",
                records, pages, base_url
            ),
            Self::TaskFailed { url, error } => write!(f, "Task for {} failed: {}", url, error),
            Self::BatchFinished { succeeded, total } => {
                write!(f, "{} out of {} succeeded.", succeeded, total)
            }
        }
    }
}

/// Receiver of scrape events
///
/// Implementations must be cheap to call and safe to share between
/// concurrent batch tasks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ScrapeEvent);
}

/// Forwards events to `tracing` at their classified level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ScrapeEvent) {
        match event.level() {
            Level::ERROR => tracing::error!("{}", event),
            Level::WARN => tracing::warn!("{}", event),
            Level::INFO => tracing::info!("{}", event),
            Level::DEBUG => tracing::debug!("{}", event),
            _ => tracing::trace!("{}", event),
        }
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ScrapeEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events emitted so far
    pub fn events(&self) -> Vec<ScrapeEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the events matching a predicate
    pub fn filter<F>(&self, predicate: F) -> Vec<ScrapeEvent>
    where
        F: Fn(&ScrapeEvent) -> bool,
    {
        self.events().into_iter().filter(|e| predicate(e)).collect()
    }

    /// Counts the events reported at the given level
    pub fn count_at(&self, level: Level) -> usize {
        self.filter(|e| e.level() == level).len()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: ScrapeEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
