//! Per-origin robots.txt cache
//!
//! Entries are keyed by `scheme://host[:port]` and expire after a TTL
//! (24 hours by default), so a long run re-reads each origin's rules daily.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default lifetime of a cached entry
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct Entry {
    robots: ParsedRobots,
    fetched_at: DateTime<Utc>,
}

/// Thread-safe map from origin to parsed rules
#[derive(Debug)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_TTL_HOURS))
    }
}

impl RobotsCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the fresh rules for an origin, if any
    pub fn get(&self, origin: &str) -> Option<ParsedRobots> {
        self.get_at(origin, Utc::now())
    }

    fn get_at(&self, origin: &str, now: DateTime<Utc>) -> Option<ParsedRobots> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(origin)
            .filter(|entry| now - entry.fetched_at <= self.ttl)
            .map(|entry| entry.robots.clone())
    }

    /// Stores the rules fetched for an origin, replacing any older entry
    pub fn insert(&self, origin: impl Into<String>, robots: ParsedRobots) {
        self.insert_at(origin.into(), robots, Utc::now());
    }

    fn insert_at(&self, origin: String, robots: ParsedRobots, fetched_at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(origin, Entry { robots, fetched_at });
        }
    }

    /// Number of origins with an entry, stale ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
