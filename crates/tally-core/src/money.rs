//! # Money Module
//!
//! Provides the `Money` type used for every sales figure the engine produces.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SUMMING THOUSANDS OF ORDER TOTALS                                      │
//! │                                                                         │
//! │  With floating point:                                                   │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │    A month of orders drifts by fractions of a cent per order            │
//! │                                                                         │
//! │  With integer cents:                                                    │
//! │    10 + 20 = 30 cents, every time                                       │
//! │    Daily sum == weekly sum == monthly sum, exactly                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let line = price.multiply_quantity(3); // $32.97
//! let total = line + Money::from_cents(500);
//! assert_eq!(total.cents(), 3797);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// Order.total_cents ──────────► DailyBucket.sales_total ──► WeeklyBucket
///                                                        └─► MonthlyBucket
/// OrderItem.unit_price × qty ─► ProductAggregate.revenue
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity (line total = unit price × quantity).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    ///
    /// Saturates at the `i64` bounds; validation rejects lines that would.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// `self × qty`, or `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Divides this amount evenly over `count` items, rounding half away
    /// from zero. Returns zero when `count` is zero.
    ///
    /// Used for average order value.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// // $10.00 over 3 orders = $3.33
    /// assert_eq!(Money::from_cents(1000).average_over(3).cents(), 333);
    /// // $10.00 over 6 orders = $1.666.. → $1.67
    /// assert_eq!(Money::from_cents(1000).average_over(6).cents(), 167);
    /// assert!(Money::from_cents(1000).average_over(0).is_zero());
    /// ```
    pub fn average_over(&self, count: u64) -> Money {
        if count == 0 {
            return Money::zero();
        }

        // i128 keeps the doubled numerator from overflowing on large sums
        let numerator = self.0 as i128 * 2;
        let denominator = count as i128 * 2;
        let half = count as i128;
        let rounded = if numerator >= 0 {
            (numerator + half) / denominator
        } else {
            (numerator - half) / denominator
        };
        Money(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display (`$10.99`). The UI does its own localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Saturating, so bucket sums over store data never panic.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

/// Summing an iterator of bucket totals.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
