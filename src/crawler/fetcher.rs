//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building HTTP clients with the configured headers and timeout
//! - URL validation and robots.txt checks before any request
//! - GET requests with bounded retry and exponential backoff
//! - Error classification

use crate::config::{ScraperConfig, DEFAULT_USER_AGENT};
use crate::crawler::Backoff;
use crate::events::{EventSink, ScrapeEvent};
use crate::robots::RobotsPolicy;
use crate::url::parse_valid_url;
use crate::{FetchError, FetchResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Per-host idle connection cap of the shared connection pool
const MAX_IDLE_PER_HOST: usize = 10;

/// Options governing every fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Total timeout of one attempt, body included
    pub timeout: Duration,
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: config.max_retries,
            backoff: config.backoff.to_backoff(),
            user_agent: config.effective_user_agent(),
            headers: config.headers.clone(),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Backoff::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: Url,
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value (empty if absent)
    pub content_type: String,
    /// Page body content
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        is_html_content_type(&self.content_type)
    }
}

/// Returns true for content types the extractor is meant for
pub fn is_html_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("text/html") || lowered.contains("application/xhtml+xml")
}

/// Builds an HTTP client with proper configuration
///
/// The client carries the user agent, the extra headers and the total
/// request timeout, so an in-flight request can never block longer than
/// `options.timeout`.
pub fn build_http_client(options: &FetchOptions) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        // Invalid pairs are rejected by config validation
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    Client::builder()
        .user_agent(options.user_agent.clone())
        .default_headers(headers)
        .timeout(options.timeout)
        .connect_timeout(options.timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Failure of a single network attempt
#[derive(Debug)]
struct AttemptFailure {
    timed_out: bool,
    status: Option<u16>,
    message: String,
}

impl AttemptFailure {
    fn from_reqwest(error: reqwest::Error) -> Self {
        Self {
            timed_out: error.is_timeout(),
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }

    fn into_fetch_error(self, url: &str, attempts: u32) -> FetchError {
        if self.timed_out {
            FetchError::Timeout {
                url: url.to_string(),
                attempts,
                message: self.message,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                attempts,
                status: self.status,
                message: self.message,
            }
        }
    }
}

/// Fetches pages over HTTP
///
/// # Request Flow
///
/// 1. Reject URLs without a scheme and host → `InvalidUrl` (no request)
/// 2. Consult robots.txt → `PolicyDenied` (no request)
/// 3. GET the page; a 2xx status returns the body
/// 4. Non-HTML content types are reported but the body is still returned
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Invalid URL | Immediate → InvalidUrl |
/// | robots.txt denies | Immediate → PolicyDenied |
/// | Non-2xx status | Retry with backoff → Transport |
/// | Timeout | Retry with backoff → Timeout |
/// | Connection error | Retry with backoff → Transport |
pub struct Fetcher {
    client: Client,
    robots: Arc<RobotsPolicy>,
    options: FetchOptions,
    sink: Arc<dyn EventSink>,
}

impl Fetcher {
    /// Creates a fetcher that honors robots.txt
    pub fn new(options: FetchOptions, sink: Arc<dyn EventSink>) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&options)?;
        let robots = Arc::new(RobotsPolicy::new(client.clone(), sink.clone()));
        Ok(Self::with_parts(client, robots, options, sink))
    }

    /// Creates a fetcher from the `[scraper]` configuration section
    pub fn from_config(
        config: &ScraperConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, reqwest::Error> {
        let options = FetchOptions::from_config(config);
        let client = build_http_client(&options)?;
        let robots = if config.respect_robots {
            RobotsPolicy::new(client.clone(), sink.clone())
        } else {
            RobotsPolicy::disabled()
        };
        Ok(Self::with_parts(client, Arc::new(robots), options, sink))
    }

    /// Assembles a fetcher from an existing client and policy
    pub fn with_parts(
        client: Client,
        robots: Arc<RobotsPolicy>,
        options: FetchOptions,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            client,
            robots,
            options,
            sink,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetches a URL with validation, policy checks and retries
    ///
    /// Never panics and never returns an unclassified error: every failure
    /// is one of the [`FetchError`] variants.
    pub async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let Some(parsed) = parse_valid_url(url) else {
            self.sink.emit(ScrapeEvent::InvalidUrl {
                url: url.to_string(),
            });
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        };

        if !self.robots.is_allowed(&parsed, &self.options.user_agent).await {
            self.sink.emit(ScrapeEvent::PolicyDenied {
                url: url.to_string(),
                user_agent: self.options.user_agent.clone(),
            });
            return Err(FetchError::PolicyDenied {
                url: url.to_string(),
            });
        }

        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.sink.emit(ScrapeEvent::FetchStarted {
                url: url.to_string(),
                attempt,
            });

            let failure = match self.attempt(&parsed).await {
                Ok(page) => return Ok(page),
                Err(failure) => failure,
            };

            self.sink.emit(ScrapeEvent::AttemptFailed {
                url: url.to_string(),
                attempt,
                timed_out: failure.timed_out,
                error: failure.message.clone(),
            });

            if attempt >= max_attempts {
                self.sink.emit(ScrapeEvent::FetchFailed {
                    url: url.to_string(),
                    attempts: attempt,
                    error: failure.message.clone(),
                });
                return Err(failure.into_fetch_error(url, attempt));
            }

            let delay = self.options.backoff.delay(attempt);
            self.sink.emit(ScrapeEvent::RetryScheduled {
                url: url.to_string(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Makes one network attempt
    async fn attempt(&self, url: &Url) -> Result<FetchedPage, AttemptFailure> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(AttemptFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                timed_out: false,
                status: Some(status.as_u16()),
                message: format!("HTTP {} for {}", status, url),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(AttemptFailure::from_reqwest)?;

        if !is_html_content_type(&content_type) {
            self.sink.emit(ScrapeEvent::NonHtmlContent {
                url: url.to_string(),
                content_type: content_type.clone(),
            });
        }

        self.sink.emit(ScrapeEvent::FetchSucceeded {
            url: url.to_string(),
            status: status.as_u16(),
            bytes: body.len(),
        });

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
