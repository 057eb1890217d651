//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                          │
//! │  ├── CoreError        - Malformed records, invalid report periods       │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  tally-analytics errors                                                 │
//! │  └── AnalyticsError   - DataUnavailable, Timeout, config, cache         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → AnalyticsError → UI                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//! The aggregation functions never return these errors for data-shape
//! problems. A `MalformedRecord` is produced by validation, logged, and the
//! record is dropped from the pass.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order is missing fields the engine needs.
    ///
    /// ## When This Occurs
    /// - Document has no placement `date`
    /// - Document has no `items` array
    /// - Negative total, unit price or quantity
    ///
    /// ## Handling
    /// ```text
    /// Order "abc" (no date)
    ///      │
    ///      ▼
    /// check_order() → MalformedRecord { order_id: "abc", reason: "missing date" }
    ///      │
    ///      ▼
    /// warn! + skip, aggregation continues
    /// ```
    #[error("Malformed order {order_id}: {reason}")]
    MalformedRecord { order_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a MalformedRecord error.
    pub fn malformed(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedRecord {
            order_id: order_id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. a month key that isn't `YYYY-MM`).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message() {
        let err = CoreError::malformed("order-7", "missing date");
        assert_eq!(err.to_string(), "Malformed order order-7: missing date");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        };
        assert_eq!(err.to_string(), "month must be between 1 and 12");

        let err = ValidationError::Required {
            field: "recipient".to_string(),
        };
        assert_eq!(err.to_string(), "recipient is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustNotBeNegative {
            field: "total".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
