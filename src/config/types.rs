use crate::crawler::Backoff;
use crate::record::SelectorMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// User agent sent when neither `user-agent` nor a `User-Agent` header is configured
pub const DEFAULT_USER_AGENT: &str = concat!("SumiGlean/", env!("CARGO_PKG_VERSION"));

/// Main configuration structure for Sumi-Glean
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetSpec>,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Total timeout of a single request (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between paginated page fetches (milliseconds)
    #[serde(rename = "rate-limit-ms", default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Total number of attempts per fetch
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of fetches in flight during a batch scrape
    #[serde(rename = "concurrency-limit", default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// User agent identifying the scraper
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Whether robots.txt is consulted before each fetch
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Returns the user agent actually sent, honoring a `User-Agent` header override
    pub fn effective_user_agent(&self) -> String {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
            .map(|(_, value)| value.clone())
            .or_else(|| self.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_ms: default_rate_limit_ms(),
            max_retries: default_max_retries(),
            concurrency_limit: default_concurrency_limit(),
            user_agent: None,
            respect_robots: true,
            backoff: BackoffConfig::default(),
            headers: BTreeMap::new(),
        }
    }
}

/// Exponential backoff between fetch attempts
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(rename = "multiplier-ms", default = "default_backoff_multiplier_ms")]
    pub multiplier_ms: u64,

    #[serde(rename = "min-ms", default = "default_backoff_min_ms")]
    pub min_ms: u64,

    #[serde(rename = "max-ms", default = "default_backoff_max_ms")]
    pub max_ms: u64,
}

impl BackoffConfig {
    pub fn to_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.multiplier_ms),
            Duration::from_millis(self.min_ms),
            Duration::from_millis(self.max_ms),
        )
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            multiplier_ms: default_backoff_multiplier_ms(),
            min_ms: default_backoff_min_ms(),
            max_ms: default_backoff_max_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Base name of the output file, without extension
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Directory output files are written to
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Whether a `_YYYYmmdd_HHMMSS` suffix is appended to the base name
    #[serde(rename = "include-timestamp", default = "default_true")]
    pub include_timestamp: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            filename: default_filename(),
            directory: default_directory(),
            include_timestamp: true,
        }
    }
}

/// Serialization format of persisted records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Sqlite,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Sqlite => "db",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// A configured scrape target
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    /// First page to fetch
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Field name to CSS selector
    pub selectors: SelectorMap,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl TargetSpec {
    /// Creates a single-page target
    pub fn new(base_url: impl Into<String>, selectors: SelectorMap) -> Self {
        Self {
            base_url: base_url.into(),
            selectors,
            pagination: PaginationConfig::default(),
        }
    }

    /// Enables pagination following `next_button` for at most `max_pages` pages
    pub fn paginated(mut self, next_button: impl Into<String>, max_pages: u32) -> Self {
        self.pagination = PaginationConfig {
            enabled: true,
            next_button: Some(next_button.into()),
            max_pages,
        };
        self
    }
}

/// Pagination policy of a target
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Selector of the link pointing at the next page
    #[serde(rename = "next-button", alias = "next-link", default)]
    pub next_button: Option<String>,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            next_button: None,
            max_pages: default_max_pages(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_backoff_multiplier_ms() -> u64 {
    1000
}

fn default_backoff_min_ms() -> u64 {
    4000
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_filename() -> String {
    "scraped_data".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_pages() -> u32 {
    10
}

fn default_true() -> bool {
    true
}
