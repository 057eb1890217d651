//! # tally-analytics: Cached Sales Reports for Tally POS
//!
//! Turns the order store into cached reports that stay current as orders
//! are delivered.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Analytics Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 AnalyticsService (orchestrator)                  │  │
//! │  │                                                                  │  │
//! │  │  daily_report / month_report / year_overview                     │  │
//! │  │  product_report / customer_report / invalidate_all               │  │
//! │  └──────────┬──────────────────────┬───────────────────────┬────────┘  │
//! │             ▼                      ▼                       ▼           │
//! │  ┌────────────────────┐  ┌───────────────────┐  ┌──────────────────┐   │
//! │  │ CacheStore         │  │ ResilientSource   │  │ tally-core       │   │
//! │  │                    │  │                   │  │ analytics engine │   │
//! │  │ TTL per category   │  │ timeout + backoff │  │                  │   │
//! │  │ single-flight      │  │ over OrderSource  │  │ pure functions   │   │
//! │  │ stale on failure   │  │ (Database, ...)   │  │                  │   │
//! │  │ SQLite mirror      │  │                   │  │                  │   │
//! │  └─────────▲──────────┘  └───────────────────┘  └──────────────────┘   │
//! │            │ invalidate                                                │
//! │  ┌─────────┴──────────────────────────────────────────────────────┐    │
//! │  │ ChangeNotifier (spawned task)                                  │    │
//! │  │ OrderFeed ──► became Delivered today? ──► DeliveryListeners    │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `AnalyticsService`, the entry point
//! - [`report`] - Report types the service returns
//! - [`cache`] - TTL cache, snapshots, mirror
//! - [`notifier`] - Live invalidation and delivery callbacks
//! - [`source`] - Ingestion adapter traits and the retrying wrapper
//! - [`clock`] - Where "today" comes from
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Analytics error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_analytics::{AnalyticsConfig, AnalyticsService};
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let service = AnalyticsService::with_database(db.clone(), AnalyticsConfig::load_or_default(None)).await;
//!
//! let notifier = service.start_notifier(Arc::new(db)).await;
//! notifier.on_order_delivered(|event: &DeliveryEvent| println!("{} delivered", event.order_id)).await?;
//!
//! let month = service.calendar().current_month();
//! let report = service.month_report(month, false).await?;
//! println!("{} orders this month", report.value.totals.order_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod notifier;
pub mod report;
pub mod service;
pub mod source;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{
    CacheCategory, CacheKey, CacheLookup, CacheMirror, CacheStore, DbCacheMirror, Freshness,
    Snapshot,
};
pub use clock::ReportClock;
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, AnalyticsResult};
pub use notifier::{ChangeNotifier, DeliveryEvent, DeliveryListener, NotifierHandle};
pub use report::{CustomerReport, DayReport, MonthReport, ProductReport, YearOverview};
pub use service::AnalyticsService;
pub use source::{OrderFeed, OrderSource, ResilientSource, RetryPolicy};
