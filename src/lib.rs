//! Sumi-Glean: a polite structured-data scraper
//!
//! This crate fetches web pages, extracts fields from their markup using
//! declarative CSS selector rules, optionally follows pagination links, and
//! hands the resulting records to an output writer.

pub mod config;
pub mod crawler;
pub mod events;
pub mod output;
pub mod record;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Glean operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
///
/// These are the only errors treated as fatal: they are raised before any
/// fetch is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Classified failure of a single fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("URL disallowed by robots.txt: {url}")]
    PolicyDenied { url: String },

    #[error("Request timeout for {url} after {attempts} attempt(s): {message}")]
    Timeout {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Transport failure for {url} after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    /// Returns true for failures the fetcher retries with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }

    /// Returns the URL the failure refers to
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url }
            | Self::PolicyDenied { url }
            | Self::Timeout { url, .. }
            | Self::Transport { url, .. } => url,
        }
    }

    /// Returns the number of network attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::InvalidUrl { .. } | Self::PolicyDenied { .. } => 0,
            Self::Timeout { attempts, .. } | Self::Transport { attempts, .. } => *attempts,
        }
    }
}

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{BatchFetcher, Extractor, Fetcher, Paginator, Scraper, SelectorExtractor};
pub use events::{CollectingSink, EventSink, ScrapeEvent, TracingSink};
pub use record::{FieldValue, Record, SelectorMap};
pub use crate::url::is_valid_url;
