//! Configuration types for fetching, caching and source endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::ScrapeError;

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Browser user agent sent to the HTML sources.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept header sent to the HTML sources.
    #[serde(default = "default_accept")]
    pub accept: String,
    /// Locale used when a lookup does not name one.
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Additional headers to include on every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> f64 {
    30.0
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:141.0) Gecko/20100101 Firefox/141.0".to_string()
}

fn default_accept() -> String {
    "text/html".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            default_locale: default_locale(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the default locale.
    #[must_use]
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Builds the `Accept-Language` value for a locale, falling back to English.
    #[must_use]
    pub fn accept_language(&self, locale: Option<&str>) -> String {
        let locale = locale
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_locale);
        format!("{locale},en;q=0.5")
    }
}

/// Sizing for the per-source query caches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: f64,
    /// Maximum number of entries per cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl() -> f64 {
    600.0
}

fn default_max_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Creates a cache configuration.
    #[must_use]
    pub const fn new(ttl_seconds: f64, max_entries: usize) -> Self {
        Self {
            ttl_seconds,
            max_entries,
        }
    }

    /// Gets the TTL as Duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs_f64(self.ttl_seconds)
    }
}

/// Endpoints and identity for the external sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// IMDb base URL.
    #[serde(default = "default_imdb_url")]
    pub imdb_base_url: String,
    /// Amazon base URL.
    #[serde(default = "default_amazon_url")]
    pub amazon_base_url: String,
    /// OpenLibrary API base URL.
    #[serde(default = "default_openlibrary_url")]
    pub openlibrary_base_url: String,
    /// OpenLibrary cover image host.
    #[serde(default = "default_covers_url")]
    pub openlibrary_covers_url: String,
    /// Contact address OpenLibrary asks API clients to identify with.
    #[serde(default)]
    pub contact_email: String,
}

fn default_imdb_url() -> String {
    "https://www.imdb.com".to_string()
}

fn default_amazon_url() -> String {
    "https://www.amazon.se".to_string()
}

fn default_openlibrary_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_covers_url() -> String {
    "https://covers.openlibrary.org".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            imdb_base_url: default_imdb_url(),
            amazon_base_url: default_amazon_url(),
            openlibrary_base_url: default_openlibrary_url(),
            openlibrary_covers_url: default_covers_url(),
            contact_email: String::new(),
        }
    }
}

impl SourceConfig {
    /// Sets the contact email.
    #[must_use]
    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = email.into();
        self
    }

    /// User agent sent to OpenLibrary.
    #[must_use]
    pub fn openlibrary_user_agent(&self) -> String {
        format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.contact_email
        )
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "mediascrape=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// Combined configuration for a scraper instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Source endpoints.
    #[serde(default)]
    pub sources: SourceConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScraperConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache configuration.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the source configuration.
    #[must_use]
    pub fn with_sources(mut self, sources: SourceConfig) -> Self {
        self.sources = sources;
        self
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ScrapeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScrapeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let contact = lookup("MEDIASCRAPE_CONTACT_EMAIL")
            .or_else(|| lookup("ADMIN_EMAIL"))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ScrapeError::Configuration(
                    "MEDIASCRAPE_CONTACT_EMAIL (or ADMIN_EMAIL) is not set".to_string(),
                )
            })?;
        config.sources.contact_email = contact.trim().to_string();

        if let Some(raw) = lookup("MEDIASCRAPE_CACHE_TTL_SECONDS") {
            config.cache.ttl_seconds = parse_var("MEDIASCRAPE_CACHE_TTL_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("MEDIASCRAPE_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = parse_var("MEDIASCRAPE_CACHE_MAX_ENTRIES", &raw)?;
        }
        if let Some(raw) = lookup("MEDIASCRAPE_TIMEOUT_SECONDS") {
            config.fetch.timeout_seconds = parse_var("MEDIASCRAPE_TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(filter) = lookup("MEDIASCRAPE_LOG") {
            config.logging.filter = filter;
        }
        if let Some(raw) = lookup("MEDIASCRAPE_LOG_JSON") {
            config.logging.json = parse_var("MEDIASCRAPE_LOG_JSON", &raw)?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ScrapeError> {
    raw.trim()
        .parse()
        .map_err(|_| ScrapeError::Configuration(format!("{key} has an invalid value: '{raw}'")))
}
