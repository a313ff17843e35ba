//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Band name used in announcement headers
    #[serde(default = "defaults::band_name")]
    pub band_name: String,

    /// Hours between refreshes in `watch` mode
    #[serde(default = "defaults::interval_hours")]
    pub interval_hours: u64,

    /// HTTP client settings shared by sources and notifiers
    #[serde(default)]
    pub http: HttpConfig,

    /// Cache freshness policy
    #[serde(default)]
    pub cache: CachePolicy,

    /// Announcement behavior
    #[serde(default)]
    pub announce: AnnounceConfig,

    /// Announced-event retention
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Message rendering
    #[serde(default)]
    pub format: FormatConfig,

    /// Where messages are delivered
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Retry policy for sources and notifiers
    #[serde(default)]
    pub retry: RetryConfig,

    /// Refusal thresholds for suspicious refreshes
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Event sources, merged in order
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Serialize the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.band_name.trim().is_empty() {
            return Err(AppError::validation("band_name is empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if let Some(hours) = &self.cache.active_hours {
            if hours.start_hour > 23 || hours.end_hour > 24 {
                return Err(AppError::validation(
                    "cache.active_hours must use hours in 0..=24",
                ));
            }
        }
        if self.format.max_chunk_chars < 100 {
            return Err(AppError::validation("format.max_chunk_chars must be >= 100"));
        }
        if self.format.wrap_width < 20 {
            return Err(AppError::validation("format.wrap_width must be >= 20"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(AppError::validation(
                "retry.base_delay_ms must not exceed retry.max_delay_ms",
            ));
        }
        if self.circuit_breaker.max_drop_percent > 100 {
            return Err(AppError::validation(
                "circuit_breaker.max_drop_percent must be <= 100",
            ));
        }
        if self.interval_hours == 0 {
            return Err(AppError::validation("interval_hours must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        if self.notifier.kind == NotifierKind::Webhook && self.notifier.webhook_url.is_none() {
            return Err(AppError::validation(
                "notifier.webhook_url is required for the webhook notifier",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            band_name: defaults::band_name(),
            interval_hours: defaults::interval_hours(),
            http: HttpConfig::default(),
            cache: CachePolicy::default(),
            announce: AnnounceConfig::default(),
            ledger: LedgerConfig::default(),
            format: FormatConfig::default(),
            notifier: NotifierConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// An hour window in UTC, `start_hour` inclusive and `end_hour` exclusive.
/// A window with `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ActiveHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// How long a cached snapshot may be trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    /// TTL outside the active window
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,

    /// TTL inside the active window
    #[serde(default = "defaults::active_cache_ttl")]
    pub active_ttl_secs: u64,

    /// Window during which the shorter TTL applies
    #[serde(default)]
    pub active_hours: Option<ActiveHours>,
}

impl CachePolicy {
    /// TTL in effect at `now`.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> Duration {
        let secs = match &self.active_hours {
            Some(hours) if hours.contains(now.hour()) => self.active_ttl_secs,
            _ => self.ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl(),
            active_ttl_secs: defaults::active_cache_ttl(),
            active_hours: None,
        }
    }
}

/// Announcement behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Announce again when links or info of an announced event change
    #[serde(default)]
    pub reannounce_updates: bool,
}

/// Announced-event retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Forget events that ended more than this many days ago; 0 keeps every
    /// entry forever
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u32,
}

impl LedgerConfig {
    /// Retention window in days, `None` when disabled.
    pub fn retention(&self) -> Option<u32> {
        (self.retention_days > 0).then_some(self.retention_days)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::retention_days(),
        }
    }
}

/// Section grouping used by collection rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Month,
    None,
}

/// Message rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Upper bound on characters per message chunk
    #[serde(default = "defaults::max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Column at which ticket and info lines are soft-wrapped
    #[serde(default = "defaults::wrap_width")]
    pub wrap_width: usize,

    #[serde(default)]
    pub group_by: GroupBy,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: defaults::max_chunk_chars(),
            wrap_width: defaults::wrap_width(),
            group_by: GroupBy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Console,
    Webhook,
}

/// Notification sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,

    /// Discord-compatible webhook URL
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Pause between consecutive messages in milliseconds
    #[serde(default = "defaults::send_delay")]
    pub send_delay_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::default(),
            webhook_url: None,
            send_delay_ms: defaults::send_delay(),
        }
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,

    /// Randomize each delay within its upper half
    #[serde(default = "defaults::jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
            jitter: defaults::jitter(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Maximum allowed drop percentage (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Minimum previous event count before the drop check applies
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// CSS selectors for a static tour listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingSelectors {
    pub row: String,
    pub date: String,
    pub venue: String,
    pub location: String,
    #[serde(default)]
    pub ticket_link: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    /// Rows carrying this class are skipped
    #[serde(default)]
    pub skip_class: Option<String>,
}

/// One event source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON array of raw records on disk
    File { path: String },
    /// JSON array of raw records served over HTTP
    Json { url: String },
    /// Static HTML listing
    Html {
        url: String,
        selectors: ListingSelectors,
    },
}

impl SourceConfig {
    fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::File { path } if path.trim().is_empty() => {
                Err(AppError::validation("file source has an empty path"))
            }
            SourceConfig::Json { url } | SourceConfig::Html { url, .. } => {
                url::Url::parse(url)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

mod defaults {
    use super::{ListingSelectors, SourceConfig};

    pub fn band_name() -> String {
        "Goose".into()
    }

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tourwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn cache_ttl() -> u64 {
        24 * 60 * 60
    }
    pub fn active_cache_ttl() -> u64 {
        60 * 60
    }

    pub fn retention_days() -> u32 {
        90
    }

    pub fn max_chunk_chars() -> usize {
        1900
    }
    pub fn wrap_width() -> usize {
        80
    }

    pub fn send_delay() -> u64 {
        1000
    }

    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        2_000
    }
    pub fn max_delay() -> u64 {
        30_000
    }
    pub fn jitter() -> bool {
        true
    }

    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        10
    }

    pub fn interval_hours() -> u64 {
        6
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![SourceConfig::Html {
            url: "https://www.goosetheband.com/tour".to_string(),
            selectors: ListingSelectors {
                row: ".seated-event-row".to_string(),
                date: ".seated-event-date-cell".to_string(),
                venue: ".seated-event-venue-name".to_string(),
                location: ".seated-event-venue-location".to_string(),
                ticket_link: Some("a.seated-event-link".to_string()),
                info: Some(".seated-event-details-cell".to_string()),
                skip_class: Some("past-event".to_string()),
            },
        }]
    }
}
