//! # Aggregation Engine
//!
//! Pure functions that turn a batch of orders into sales figures.
//!
//! ## Passes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Aggregation Passes                                │
//! │                                                                         │
//! │  &[Order] ──┬──► well_formed() ──► status == Delivered ──┐              │
//! │             │                                            │              │
//! │             │         ┌──────────────────────────────────┤              │
//! │             │         ▼                  ▼               ▼              │
//! │             │   compute_daily_sales  compute_product  compute_sales     │
//! │             │         │              _aggregates      _totals           │
//! │             │         ▼                                                 │
//! │             │   compute_weekly_sales (4 fixed buckets)                  │
//! │             │                                                           │
//! │             └──► well_formed() (ALL statuses) ──► compute_customer      │
//! │                                                   _frequency            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function is deterministic: the same batch gives the same result in
//! any arrival order. Maps are `BTreeMap` so serialized output is stable too.

pub mod customers;
pub mod products;
pub mod sales;

pub use customers::{
    compute_customer_frequency, CustomerFrequency, CustomerSegment, CustomerStats, LoyalCustomer,
    MonthlyCustomerTally, SegmentCounts,
};
pub use products::{compute_product_aggregates, rank_products, ProductAggregate, ProductSales};
pub use sales::{
    compute_daily_sales, compute_monthly_sales, compute_payment_breakdown, compute_sales_totals,
    compute_weekly_sales, week_of_month, DailyBucket, DailySales, MonthlyBucket,
    PaymentBreakdown, SalesTotals, WeeklyBucket, WeeklySales,
};
