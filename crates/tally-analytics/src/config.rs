//! # Analytics Configuration
//!
//! Cache lifetimes, fetch resilience, notifier behavior and the reporting
//! calendar.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DAILY_TTL_SECS=600                                           │
//! │     TALLY_UTC_OFFSET_MINUTES=480                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/analytics.toml (Linux)                               │
//! │     ~/Library/Application Support/com.tally.pos/analytics.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # analytics.toml
//! [cache]
//! daily_ttl_secs = 900      # 15 min
//! monthly_ttl_secs = 1800   # 30 min
//! product_ttl_secs = 1800   # 30 min
//! persist = true
//! persist_max_bytes = 5000000
//!
//! [source]
//! fetch_timeout_secs = 10
//! max_retries = 3
//! initial_backoff_ms = 250
//! max_backoff_secs = 5
//!
//! [notifier]
//! feed_limit = 50
//! callback_delay_ms = 300
//!
//! [report]
//! utc_offset_minutes = 480  # UTC+8
//! top_products = 10
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_core::validation::{validate_limit, validate_utc_offset_minutes};
use tally_core::ReportCalendar;
use tracing::{debug, info, warn};

use crate::cache::CacheCategory;
use crate::clock::ReportClock;
use crate::error::{AnalyticsError, AnalyticsResult};

// =============================================================================
// Cache Settings
// =============================================================================

/// Cache lifetimes and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL of daily reports (seconds).
    #[serde(default = "default_daily_ttl")]
    pub daily_ttl_secs: u64,

    /// TTL of month reports, year overviews and customer reports (seconds).
    #[serde(default = "default_monthly_ttl")]
    pub monthly_ttl_secs: u64,

    /// TTL of product breakdowns (seconds).
    #[serde(default = "default_product_ttl")]
    pub product_ttl_secs: u64,

    /// Mirror computed reports to the database.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Budget for the mirror table; oldest entries are evicted beyond it.
    #[serde(default = "default_persist_max_bytes")]
    pub persist_max_bytes: u64,
}

/// Upper bound for any category TTL (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn default_daily_ttl() -> u64 {
    15 * 60
}
fn default_monthly_ttl() -> u64 {
    30 * 60
}
fn default_product_ttl() -> u64 {
    30 * 60
}
fn default_true() -> bool {
    true
}
fn default_persist_max_bytes() -> u64 {
    5_000_000
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            daily_ttl_secs: default_daily_ttl(),
            monthly_ttl_secs: default_monthly_ttl(),
            product_ttl_secs: default_product_ttl(),
            persist: true,
            persist_max_bytes: default_persist_max_bytes(),
        }
    }
}

impl CacheSettings {
    /// TTL for a cache category.
    pub fn ttl(&self, category: CacheCategory) -> Duration {
        Duration::from_secs(match category {
            CacheCategory::Daily => self.daily_ttl_secs,
            CacheCategory::Monthly => self.monthly_ttl_secs,
            CacheCategory::Product => self.product_ttl_secs,
        })
    }
}

// =============================================================================
// Source Settings
// =============================================================================

/// Timeout and retry policy for order fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Per-call fetch timeout (seconds).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Retries after the first attempt. 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Retry delay ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    250
}
fn default_max_backoff() -> u64 {
    5
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            fetch_timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl SourceSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Notifier Settings
// =============================================================================

/// Change notifier behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    /// Orders read from today's feed when priming status memory.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,

    /// Delay between invalidation and listener callbacks (milliseconds).
    /// Cosmetic; lets a dashboard animate before it refetches.
    #[serde(default = "default_callback_delay")]
    pub callback_delay_ms: u64,
}

fn default_feed_limit() -> u32 {
    50
}
fn default_callback_delay() -> u64 {
    300
}

impl Default for NotifierSettings {
    fn default() -> Self {
        NotifierSettings {
            feed_limit: default_feed_limit(),
            callback_delay_ms: default_callback_delay(),
        }
    }
}

impl NotifierSettings {
    pub fn callback_delay(&self) -> Duration {
        Duration::from_millis(self.callback_delay_ms)
    }
}

// =============================================================================
// Report Settings
// =============================================================================

/// Reporting calendar and presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Store's offset from UTC in minutes; dates are bucketed in this zone.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Number of best sellers in product reports.
    #[serde(default = "default_top_products")]
    pub top_products: usize,
}

fn default_top_products() -> usize {
    10
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            utc_offset_minutes: 0,
            top_products: default_top_products(),
        }
    }
}

// =============================================================================
// Main Analytics Configuration
// =============================================================================

/// Complete analytics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub notifier: NotifierSettings,

    #[serde(default)]
    pub report: ReportSettings,
}

impl AnalyticsConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (analytics.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> AnalyticsResult<Self> {
        let mut config = Self::from_file(config_path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads the config file alone, without environment overrides or
    /// validation. A missing file yields defaults.
    pub fn from_file(config_path: Option<PathBuf>) -> AnalyticsResult<Self> {
        let Some(path) = config_path.or_else(Self::default_config_path) else {
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        info!(?path, "Loading analytics config from file");
        let contents = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load analytics config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> AnalyticsResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| AnalyticsError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AnalyticsError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| AnalyticsError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Analytics config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> AnalyticsResult<()> {
        let ttls = [
            ("daily_ttl_secs", self.cache.daily_ttl_secs),
            ("monthly_ttl_secs", self.cache.monthly_ttl_secs),
            ("product_ttl_secs", self.cache.product_ttl_secs),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, ttl)| *ttl == 0) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "{} must be greater than 0",
                name
            )));
        }
        if let Some((name, _)) = ttls.iter().find(|(_, ttl)| *ttl > MAX_TTL_SECS) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "{} must not exceed {} seconds",
                name, MAX_TTL_SECS
            )));
        }

        if self.source.fetch_timeout_secs == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "fetch_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.source.initial_backoff() > self.source.max_backoff() {
            return Err(AnalyticsError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_secs".into(),
            ));
        }

        if self.notifier.feed_limit == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "feed_limit must be greater than 0".into(),
            ));
        }

        validate_utc_offset_minutes(self.report.utc_offset_minutes)
            .map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;
        validate_limit(self.report.top_products)
            .map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            let raw = std::env::var(name).ok()?;
            match raw.parse() {
                Ok(value) => {
                    debug!(var = name, value = %raw, "Overriding config from environment");
                    Some(value)
                }
                Err(_) => {
                    warn!(var = name, value = %raw, "Ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(v) = parsed("TALLY_DAILY_TTL_SECS") {
            self.cache.daily_ttl_secs = v;
        }
        if let Some(v) = parsed("TALLY_MONTHLY_TTL_SECS") {
            self.cache.monthly_ttl_secs = v;
        }
        if let Some(v) = parsed("TALLY_PRODUCT_TTL_SECS") {
            self.cache.product_ttl_secs = v;
        }
        if let Some(v) = parsed("TALLY_CACHE_PERSIST") {
            self.cache.persist = v;
        }
        if let Some(v) = parsed("TALLY_FETCH_TIMEOUT_SECS") {
            self.source.fetch_timeout_secs = v;
        }
        if let Some(v) = parsed("TALLY_FETCH_MAX_RETRIES") {
            self.source.max_retries = v;
        }
        if let Some(v) = parsed("TALLY_CALLBACK_DELAY_MS") {
            self.notifier.callback_delay_ms = v;
        }
        if let Some(v) = parsed("TALLY_UTC_OFFSET_MINUTES") {
            self.report.utc_offset_minutes = v;
        }
        if let Some(v) = parsed("TALLY_TOP_PRODUCTS") {
            self.report.top_products = v;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("analytics.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The store's UTC offset. Falls back to UTC if unvalidated input is out
    /// of range.
    pub fn utc_offset(&self) -> FixedOffset {
        validate_utc_offset_minutes(self.report.utc_offset_minutes)
            .unwrap_or_else(|_| ReportCalendar::utc_offset())
    }

    /// Live clock at the configured offset.
    pub fn clock(&self) -> ReportClock {
        ReportClock::Live(self.utc_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.cache.ttl(CacheCategory::Daily), Duration::from_secs(900));
        assert_eq!(config.cache.ttl(CacheCategory::Monthly), Duration::from_secs(1800));
        assert_eq!(config.cache.ttl(CacheCategory::Product), Duration::from_secs(1800));
        assert_eq!(config.notifier.feed_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AnalyticsConfig::default();
        config.cache.daily_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.cache.daily_ttl_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(AnalyticsError::InvalidConfig(_))));

        let mut config = AnalyticsConfig::default();
        config.cache.product_ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        let mut config = AnalyticsConfig::default();
        config.report.utc_offset_minutes = 24 * 60;
        assert!(matches!(config.validate(), Err(AnalyticsError::InvalidConfig(_))));
        assert_eq!(config.utc_offset().local_minus_utc(), 0);

        let mut config = AnalyticsConfig::default();
        config.source.initial_backoff_ms = 10_000;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.report.top_products = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalyticsConfig = toml::from_str(
            r#"
            [cache]
            daily_ttl_secs = 60

            [report]
            utc_offset_minutes = 480
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.daily_ttl_secs, 60);
        assert_eq!(config.cache.monthly_ttl_secs, 1800);
        assert_eq!(config.source.max_retries, 3);
        assert_eq!(config.utc_offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("tally-config-{}", std::process::id()));
        let path = dir.join("analytics.toml");

        let mut config = AnalyticsConfig::default();
        config.report.top_products = 5;
        config.save(Some(path.clone())).unwrap();

        let loaded = AnalyticsConfig::from_file(Some(path)).unwrap();
        assert_eq!(loaded.report.top_products, 5);
        assert_eq!(loaded.cache.daily_ttl_secs, 900);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&AnalyticsConfig::default()).unwrap();
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[notifier]"));
        assert!(toml_str.contains("[report]"));
    }
}
