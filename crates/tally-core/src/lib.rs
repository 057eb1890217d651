//! # tally-core: Pure Sales Analytics Logic for Tally POS
//!
//! This crate turns raw order records into sales figures. It contains the
//! domain types and the aggregation engine as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Analytics                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Dashboard / Reports (consumer)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Snapshot<T>                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tally-analytics (cache, notifier, ingestion adapter)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ &[Order]                               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ analytics │  │ validation│  │   │
//! │  │   │   Order   │  │   Money   │  │  daily    │  │ malformed │  │   │
//! │  │   │ Calendar  │  │  average  │  │  products │  │  records  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              tally-db (SQLite order store, cache mirror)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, SalesMonth, ReportCalendar, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Malformed-record detection and input checks
//! - [`analytics`] - Daily/weekly/monthly sales, products, customers
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same batch in, same report out, in any order
//! 2. **No I/O**: fetching and caching live in tally-analytics
//! 3. **Integer Money**: all monetary values are in cents (i64)
//! 4. **Total Functions**: malformed orders are logged and skipped, never fatal
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use tally_core::analytics::{compute_daily_sales, compute_weekly_sales};
//! use tally_core::{ReportCalendar, SalesMonth};
//!
//! let month: SalesMonth = "2026-09".parse().unwrap();
//! let calendar = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());
//!
//! let daily = compute_daily_sales(&[], month, &calendar);
//! let weekly = compute_weekly_sales(&daily);
//! assert_eq!(weekly.len(), 4);
//! assert_eq!(weekly[3].last_day, 30);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Orders within the current month that make a customer loyal.
pub const LOYAL_ORDER_THRESHOLD: u32 = 5;

/// Highest order count still in the `TwoToTen` segment.
pub const TWO_TO_TEN_MAX: u32 = 10;

/// Number of week buckets per month.
///
/// ## Business Reason
/// Weeks are fixed 7-day slices of the month rather than ISO weeks, so every
/// month charts as exactly four bars. Days 29-31 fold into the last one.
pub const WEEKS_PER_MONTH: usize = 4;

/// Width of each week bucket in days.
pub const DAYS_PER_WEEK_BUCKET: u32 = 7;
