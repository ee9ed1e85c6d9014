//! Robots.txt handling module
//!
//! Fetches, matches and caches robots.txt rules per origin.
//!
//! The policy is fail-open: when an origin's robots.txt cannot be retrieved
//! (network error, non-2xx status, unreadable body) every path on that origin
//! is treated as allowed. This includes 401/403 and 5xx answers, which a
//! stricter reading of the robots.txt convention would take as disallow-all.

mod cache;
mod parser;

pub use cache::{RobotsCache, DEFAULT_TTL_HOURS};
pub use parser::{product_token, ParsedRobots};

use crate::events::{EventSink, ScrapeEvent, TracingSink};
use crate::url::{origin_key, robots_txt_url};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Crawl-permission gate consulted before every fetch
///
/// Parsed robots.txt files are cached per origin. Concurrent checks against
/// an origin that is not cached yet wait on one shared fetch, so each
/// origin's file is requested at most once per cache lifetime.
///
/// Any failure to obtain the file, 401/403 and 5xx statuses included, allows
/// every path on that origin.
pub struct RobotsPolicy {
    client: Client,
    enabled: bool,
    cache: RobotsCache,
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    sink: Arc<dyn EventSink>,
}

impl RobotsPolicy {
    /// Creates a policy that fetches robots.txt through the given client
    pub fn new(client: Client, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            enabled: true,
            cache: RobotsCache::default(),
            fetch_locks: Mutex::new(HashMap::new()),
            sink,
        }
    }

    /// Creates a policy that allows every URL without any network access
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            enabled: false,
            cache: RobotsCache::default(),
            fetch_locks: Mutex::new(HashMap::new()),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed, or robots.txt could not be retrieved
    /// * `false` - If robots.txt explicitly disallows the URL
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let origin = origin_key(url);
        if let Some(robots) = self.cache.get(&origin) {
            return robots.is_allowed(url.as_str(), user_agent);
        }

        let lock = self.fetch_lock(&origin).await;
        let _guard = lock.lock().await;

        // Another task may have filled the entry while we waited
        if let Some(robots) = self.cache.get(&origin) {
            return robots.is_allowed(url.as_str(), user_agent);
        }

        let robots = self.fetch_robots(url).await;
        let allowed = robots.is_allowed(url.as_str(), user_agent);
        self.cache.insert(origin, robots);

        allowed
    }

    /// Returns the lock serializing robots.txt fetches for one origin
    async fn fetch_lock(&self, origin: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().await;
        Arc::clone(locks.entry(origin.to_string()).or_default())
    }

    /// Returns the number of origins currently cached
    pub fn cached_origins(&self) -> usize {
        self.cache.len()
    }

    /// Fetches and parses the robots.txt governing `url`
    ///
    /// Never fails: any retrieval problem yields [`ParsedRobots::allow_all`].
    pub async fn fetch_robots(&self, url: &Url) -> ParsedRobots {
        let Some(robots_url) = robots_txt_url(url) else {
            return ParsedRobots::allow_all();
        };

        let unavailable = |reason: String| {
            self.sink.emit(ScrapeEvent::RobotsUnavailable {
                robots_url: robots_url.to_string(),
                reason,
            });
            ParsedRobots::allow_all()
        };

        let response = match self.client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return unavailable(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return unavailable(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => unavailable(e.to_string()),
        }
    }
}
