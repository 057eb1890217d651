//! # Validation Module
//!
//! Decides whether an order document is usable by the aggregation engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Record Validation                                  │
//! │                                                                         │
//! │  Raw Order (from store, any field may be absent)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  check_order()                                                          │
//! │  ├── date present?                                                      │
//! │  ├── items present?                                                     │
//! │  ├── total >= 0?                                                        │
//! │  ├── every line: price >= 0, quantity >= 0?                             │
//! │  └── line totals fit in i64 cents?                                      │
//! │           │                                                             │
//! │     ┌─────┴──────┐                                                      │
//! │     ▼            ▼                                                      │
//! │  WellFormed   MalformedRecord ──► warn! + skip                          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Aggregation passes                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::validate_utc_offset_minutes;
//!
//! assert!(validate_utc_offset_minutes(480).is_ok()); // UTC+8
//! assert!(validate_utc_offset_minutes(24 * 60).is_err());
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderItem};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Well-formed Orders
// =============================================================================

/// An order that passed `check_order`, with its required fields unwrapped.
#[derive(Debug, Clone, Copy)]
pub struct WellFormedOrder<'a> {
    pub order: &'a Order,
    pub date: DateTime<Utc>,
    pub items: &'a [OrderItem],
}

/// Checks that an order carries everything the engine needs.
///
/// ## Rules
/// - `date` must be present
/// - `items` must be present (an empty list is fine)
/// - `total_cents` must not be negative
/// - every line must have non-negative unit price and quantity
/// - price × quantity, summed over the lines, must fit in `i64` cents
pub fn check_order(order: &Order) -> CoreResult<WellFormedOrder<'_>> {
    let date = order
        .date
        .ok_or_else(|| CoreError::malformed(&order.id, "missing date"))?;

    let items = order
        .items
        .as_deref()
        .ok_or_else(|| CoreError::malformed(&order.id, "missing items"))?;

    if order.total_cents < 0 {
        return Err(CoreError::malformed(&order.id, "negative total"));
    }

    if let Some(line) = items
        .iter()
        .find(|item| item.unit_price_cents < 0 || item.quantity < 0)
    {
        return Err(CoreError::malformed(
            &order.id,
            format!("negative price or quantity on '{}'", line.product_title),
        ));
    }

    let lines_total = items.iter().try_fold(Money::zero(), |acc, item| {
        item.unit_price()
            .checked_multiply_quantity(item.quantity)?
            .checked_add(acc)
    });
    if lines_total.is_none() {
        return Err(CoreError::malformed(&order.id, "line totals overflow"));
    }

    Ok(WellFormedOrder { order, date, items })
}

/// Iterates the well-formed orders of a batch, logging and skipping the rest.
pub fn well_formed(orders: &[Order]) -> impl Iterator<Item = WellFormedOrder<'_>> {
    orders.iter().filter_map(|order| match check_order(order) {
        Ok(valid) => Some(valid),
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Skipping malformed order");
            None
        }
    })
}

// =============================================================================
// Field Validators
// =============================================================================

/// Normalizes a recipient name for grouping.
///
/// ## Rules
/// - Leading/trailing whitespace is ignored
/// - Must not be empty after trimming
///
/// Matching is otherwise exact: "Juan" and "juan" are different customers.
pub fn validate_recipient(name: &str) -> ValidationResult<&str> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "recipient".to_string(),
        });
    }

    Ok(name)
}

/// Validates a reporting offset in minutes east of UTC.
///
/// ## Rules
/// - Must be strictly within ±24 hours
pub fn validate_utc_offset_minutes(minutes: i32) -> ValidationResult<FixedOffset> {
    const LIMIT: i32 = 24 * 60;

    FixedOffset::east_opt(minutes.saturating_mul(60))
        .filter(|_| minutes.abs() < LIMIT)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "utc_offset_minutes".to_string(),
            min: -(LIMIT as i64) + 1,
            max: LIMIT as i64 - 1,
        })
}

/// Validates a ranking limit (e.g. top products).
///
/// ## Rules
/// - Must be between 1 and 1000
pub fn validate_limit(limit: usize) -> ValidationResult<usize> {
    if limit == 0 || limit > 1000 {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: 1000,
        });
    }

    Ok(limit)
}

// =============================================================================
// Unit Tests
// =============================================================================
