//! # Analytics Error Types
//!
//! Error types for report fetching, caching and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Analytics Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Ingestion     │  │     Runtime             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │ DataUnavailable │  │  CacheError             │ │
//! │  │  ConfigLoad...  │  │ Timeout         │  │  ChannelError           │ │
//! │  │  ConfigSave...  │  │ Store           │  │  ShuttingDown           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Retryable: DataUnavailable, Timeout                                    │
//! │  A cache miss is a lookup state, never an error.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Analytics error type.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid analytics configuration.
    #[error("Invalid analytics configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Ingestion Errors
    // =========================================================================
    /// The order store could not be read.
    ///
    /// ## When This Occurs
    /// - Store connection lost / pool exhausted
    /// - Query failed
    ///
    /// ## Handling
    /// ```text
    /// ResilientSource ──► retry with backoff ──► still failing?
    ///                                                 │
    ///                          ┌──────────────────────┴────┐
    ///                          ▼                           ▼
    ///                  stale entry cached?            no entry
    ///                  serve it (Stale)               propagate error
    /// ```
    #[error("Order data unavailable: {0}")]
    DataUnavailable(String),

    /// The store failed in a way retrying will not fix (undecodable row,
    /// missing schema, constraint violation).
    #[error("Order store error: {0}")]
    Store(String),

    /// A fetch took longer than the configured timeout (milliseconds).
    #[error("Order fetch timed out after {0} ms")]
    Timeout(u64),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// A cached payload could not be encoded or decoded.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The notifier is shutting down.
    #[error("Change notifier is shutting down")]
    ShuttingDown,

    /// Domain error from tally-core.
    #[error(transparent)]
    Core(#[from] tally_core::CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tally_db::DbError> for AnalyticsError {
    fn from(err: tally_db::DbError) -> Self {
        if err.is_transient() {
            AnalyticsError::DataUnavailable(err.to_string())
        } else {
            AnalyticsError::Store(err.to_string())
        }
    }
}

impl From<tally_core::ValidationError> for AnalyticsError {
    fn from(err: tally_core::ValidationError) -> Self {
        AnalyticsError::Core(err.into())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::CacheError(err.to_string())
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(err: std::io::Error) -> Self {
        AnalyticsError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for AnalyticsError {
    fn from(err: toml::de::Error) -> Self {
        AnalyticsError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for AnalyticsError {
    fn from(err: toml::ser::Error) -> Self {
        AnalyticsError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl AnalyticsError {
    /// Returns true if the fetch can be retried.
    ///
    /// ## Retryable Errors
    /// - Store unavailable
    /// - Timeouts
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Permanent store failures
    /// - Invalid report periods
    /// - Cache encoding problems
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::DataUnavailable(_) | AnalyticsError::Timeout(_)
        )
    }
}
