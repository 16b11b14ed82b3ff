//! Configuration file parser for ~/.config/newsdesk/config.toml.
//!
//! Every key is optional and falls back to its default, but a usable
//! configuration must list at least one feed: [`Config::validate`] rejects
//! an empty feed list and any feed URL that is not absolute http(s).
//! Unknown keys are accepted by serde and logged as a warning.
use crate::feed::FetchSettings;
use crate::model::{FeedSource, SortDirection, SortDirectionError, ViewFilter};
use crate::refresh::RefreshSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No feeds configured: add at least one [[feeds]] entry")]
    NoFeeds,

    #[error("Invalid feed URL '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    #[error("Invalid default_sort: {0}")]
    InvalidSort(#[from] SortDirectionError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes to sleep between refresh passes.
    pub refresh_interval_minutes: u64,

    /// Seconds to pause between two sources within a pass.
    pub source_delay_secs: u64,

    /// Per-feed request timeout.
    pub fetch_timeout_secs: u64,

    /// Per-site favicon lookup timeout.
    pub favicon_timeout_secs: u64,

    /// Feed responses larger than this are rejected.
    pub max_feed_bytes: usize,

    /// Initial recency window of the visible view.
    pub default_max_age_hours: i64,

    /// Initial sort direction, `"asc"` or `"desc"`.
    pub default_sort: String,

    /// Number of fetch failures kept for diagnostics.
    pub error_log_capacity: usize,

    /// Notifications buffered per live subscriber before updates are skipped.
    pub subscriber_buffer: usize,

    pub feeds: Vec<FeedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 30,
            source_delay_secs: 1,
            fetch_timeout_secs: 10,
            favicon_timeout_secs: 3,
            max_feed_bytes: 10 * 1024 * 1024,
            default_max_age_hours: ViewFilter::DEFAULT_MAX_AGE_HOURS,
            default_sort: SortDirection::Desc.to_string(),
            error_log_capacity: 100,
            subscriber_buffer: 1,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "refresh_interval_minutes",
        "source_delay_secs",
        "fetch_timeout_secs",
        "favicon_timeout_secs",
        "max_feed_bytes",
        "default_max_age_hours",
        "default_sort",
        "error_log_capacity",
        "subscriber_buffer",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())` (which has no feeds)
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Checks the startup preconditions.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoFeeds`] - the feed list is empty
    /// - [`ConfigError::InvalidFeedUrl`] - a feed URL is not absolute http(s) with a host
    /// - [`ConfigError::InvalidSort`] - `default_sort` is neither `asc` nor `desc`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        for feed in &self.feeds {
            validate_feed_url(&feed.url)?;
        }
        self.default_sort.parse::<SortDirection>()?;
        Ok(())
    }

    pub fn sources(&self) -> Vec<FeedSource> {
        self.feeds
            .iter()
            .map(|f| FeedSource::new(f.url.trim(), f.category.trim()))
            .collect()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            favicon_timeout: Duration::from_secs(self.favicon_timeout_secs),
            max_feed_bytes: self.max_feed_bytes,
            error_log_capacity: self.error_log_capacity,
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            interval: Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)),
            source_delay: Duration::from_secs(self.source_delay_secs),
        }
    }

    /// Initial view filter; an unparsable `default_sort` falls back to descending.
    pub fn view_filter(&self) -> ViewFilter {
        let direction = self.default_sort.parse().unwrap_or_default();
        ViewFilter::hours(self.default_max_age_hours, direction)
    }
}

fn validate_feed_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidFeedUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid("missing host")),
    }
}

// ============================================================================
// Tests
// ============================================================================
