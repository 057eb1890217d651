//! # tally-db: Order Store for Tally POS
//!
//! SQLite storage for orders, the live change feed, and the durable mirror of
//! the analytics cache.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  Checkout / kitchen workflow          tally-analytics                  │
//! │       │ insert / update_status             ▲ fetch_* / subscribe       │
//! │       ▼                                    │                            │
//! │  ┌─────────────────────────────────────────┴───────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo      │    │ 001_orders   │  │   │
//! │  │   │ change feed   │    │ CacheMirrorRepo│    │ 002_cache    │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and the change feed
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Order and cache mirror repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let mut feed = db.subscribe_changes();
//!
//! db.orders().insert(&order).await?;
//! let change = feed.recv().await?; // ChangeKind::Added
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cache::{CacheMirrorRepository, MirroredEntry, StoreOutcome};
pub use repository::order::OrderRepository;
