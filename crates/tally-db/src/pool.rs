//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite, plus the in-process
//! change feed every write publishes to.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────┐   ┌──────────────────────────────┐    │
//! │  │        SqlitePool           │   │ broadcast::Sender<OrderChange>│    │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐   │   │                              │    │
//! │  │  │Conn1│ │Conn2│ │Conn3│   │   │  OrderRepository writes ──►  │    │
//! │  │  └─────┘ └─────┘ └─────┘   │   │  subscribe_changes() ◄── rx  │    │
//! │  └─────────────────────────────┘   └──────────────────────────────┘    │
//! │       │                                        │                        │
//! │       ▼                                        ▼                        │
//! │  db.orders() / db.cache_mirror()       Change notifier task            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for file databases so
//! report reads never block the checkout path that writes orders.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tally_core::OrderChange;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cache::CacheMirrorRepository;
use crate::repository::order::OrderRepository;

/// Path that selects a private in-memory database.
const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/tally.db")
///     .max_connections(5)
///     .change_feed_capacity(512);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Buffered changes per subscriber before it starts lagging.
    /// Default: 256
    pub change_feed_capacity: usize,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            change_feed_capacity: 256,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the change feed buffer size.
    pub fn change_feed_capacity(mut self, capacity: usize) -> Self {
        self.change_feed_capacity = capacity.max(1);
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The database lives as long as its single pooled connection, which is
    /// never recycled.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1, // each connection would get its own database
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            change_feed_capacity: 256,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access and the change feed.
///
/// Cloning is cheap: clones share the pool and the feed.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Live order feed; every repository write publishes here.
    changes: broadcast::Sender<OrderChange>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    /// 5. Opens the change feed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let pool = if config.is_in_memory() {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(config.connect_timeout)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

            let options = SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                // Readers don't block writers, writers don't block readers
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.connect_timeout)
                .idle_timeout(Some(config.idle_timeout))
                .connect_with(options)
                .await
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        };

        debug!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let (changes, _) = broadcast::channel(config.change_feed_capacity);
        let db = Database { pool, changes };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the order repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let orders = db.orders().fetch_delivered_between(start, end).await?;
    /// ```
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.changes.clone())
    }

    /// Returns the analytics cache mirror repository.
    pub fn cache_mirror(&self) -> CacheMirrorRepository {
        CacheMirrorRepository::new(self.pool.clone())
    }

    /// Subscribes to the live order feed.
    ///
    /// The receiver sees every change published after this call. A receiver
    /// that falls more than `change_feed_capacity` changes behind gets
    /// `RecvError::Lagged`.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<OrderChange> {
        self.changes.subscribe()
    }

    /// Closes the database connection pool.
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .change_feed_capacity(0);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.change_feed_capacity, 1);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
