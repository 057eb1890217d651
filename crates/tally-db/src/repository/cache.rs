//! # Cache Mirror Repository
//!
//! Durable copy of computed analytics reports.
//!
//! ## Size Cap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    store(key, payload, max_bytes)                       │
//! │                                                                         │
//! │  payload > max_bytes? ──yes──► Skipped (never stored)                   │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │  ┌──────────────── SINGLE TRANSACTION ─────────────────┐                │
//! │  │ 1. UPSERT row (key, category, payload, bytes, time) │                │
//! │  │ 2. SUM(payload_bytes) > max_bytes?                  │                │
//! │  │      └── delete oldest other rows until it fits     │                │
//! │  └─────────────────────────────────────────────────────┘                │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  Stored { evicted }                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;

/// One mirrored report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredEntry {
    pub cache_key: String,
    pub category: String,
    /// Serialized report (JSON).
    pub payload: String,
    pub computed_at: DateTime<Utc>,
}

/// What `store` did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Written; `evicted` older entries were dropped to make room.
    Stored { evicted: usize },
    /// Larger than the whole budget on its own.
    Skipped,
}

#[derive(Debug, sqlx::FromRow)]
struct MirrorRow {
    cache_key: String,
    category: String,
    payload: String,
    computed_at_ms: i64,
}

/// Repository for the `analytics_cache` table.
#[derive(Debug, Clone)]
pub struct CacheMirrorRepository {
    pool: SqlitePool,
}

impl CacheMirrorRepository {
    /// Creates a new CacheMirrorRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CacheMirrorRepository { pool }
    }

    /// Writes (or replaces) an entry, keeping the table within `max_bytes`.
    pub async fn store(
        &self,
        cache_key: &str,
        category: &str,
        payload: &str,
        computed_at: DateTime<Utc>,
        max_bytes: u64,
    ) -> DbResult<StoreOutcome> {
        let bytes = payload.len() as u64;
        if bytes > max_bytes {
            warn!(cache_key, bytes, max_bytes, "Cache payload exceeds mirror budget, skipping");
            return Ok(StoreOutcome::Skipped);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analytics_cache (cache_key, category, payload, payload_bytes, computed_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(cache_key) DO UPDATE SET
                category = excluded.category,
                payload = excluded.payload,
                payload_bytes = excluded.payload_bytes,
                computed_at_ms = excluded.computed_at_ms
            "#,
        )
        .bind(cache_key)
        .bind(category)
        .bind(payload)
        .bind(bytes as i64)
        .bind(computed_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(payload_bytes), 0) FROM analytics_cache")
                .fetch_one(&mut *tx)
                .await?;

        let mut total = total.max(0) as u64;
        let mut evicted = 0;

        if total > max_bytes {
            let oldest: Vec<(String, i64)> = sqlx::query_as(
                "SELECT cache_key, payload_bytes FROM analytics_cache \
                 WHERE cache_key != ?1 ORDER BY computed_at_ms ASC, cache_key ASC",
            )
            .bind(cache_key)
            .fetch_all(&mut *tx)
            .await?;

            for (key, size) in oldest {
                if total <= max_bytes {
                    break;
                }
                sqlx::query("DELETE FROM analytics_cache WHERE cache_key = ?1")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?;
                total = total.saturating_sub(size.max(0) as u64);
                evicted += 1;
            }
        }

        tx.commit().await?;

        debug!(cache_key, bytes, evicted, "Mirrored cache entry");
        Ok(StoreOutcome::Stored { evicted })
    }

    /// Loads every mirrored entry, oldest first.
    pub async fn load_all(&self) -> DbResult<Vec<MirroredEntry>> {
        let rows: Vec<MirrorRow> = sqlx::query_as(
            "SELECT cache_key, category, payload, computed_at_ms FROM analytics_cache \
             ORDER BY computed_at_ms ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MirroredEntry {
                cache_key: row.cache_key,
                category: row.category,
                payload: row.payload,
                computed_at: Utc
                    .timestamp_millis_opt(row.computed_at_ms)
                    .single()
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Removes one entry.
    pub async fn remove(&self, cache_key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM analytics_cache WHERE cache_key = ?1")
            .bind(cache_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes every entry of a category.
    pub async fn remove_category(&self, category: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM analytics_cache WHERE category = ?1")
            .bind(category)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Removes everything.
    pub async fn clear(&self) -> DbResult<()> {
        sqlx::query("DELETE FROM analytics_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Total bytes currently mirrored.
    pub async fn total_bytes(&self) -> DbResult<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(payload_bytes), 0) FROM analytics_cache")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.max(0) as u64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, minute, 0).unwrap()
    }

    async fn repo() -> CacheMirrorRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().cache_mirror()
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let repo = repo().await;
        repo.store("daily:2026-10-18", "daily", "{\"a\":1}", at(0), 1000)
            .await
            .unwrap();
        // Replacing keeps one row
        repo.store("daily:2026-10-18", "daily", "{\"a\":2}", at(1), 1000)
            .await
            .unwrap();

        let entries = repo.load_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, "{\"a\":2}");
        assert_eq!(entries[0].computed_at, at(1));
    }

    #[tokio::test]
    async fn test_oldest_entries_evicted_over_budget() {
        let repo = repo().await;
        let ten = "x".repeat(10);
        repo.store("a", "daily", &ten, at(0), 25).await.unwrap();
        repo.store("b", "daily", &ten, at(1), 25).await.unwrap();

        let outcome = repo.store("c", "monthly", &ten, at(2), 25).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Stored { evicted: 1 });

        let keys: Vec<String> = repo
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.cache_key)
            .collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(repo.total_bytes().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_oversize_payload_skipped() {
        let repo = repo().await;
        let outcome = repo.store("big", "daily", &"x".repeat(11), at(0), 10).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Skipped);
        assert!(repo.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_category() {
        let repo = repo().await;
        repo.store("a", "daily", "1", at(0), 100).await.unwrap();
        repo.store("b", "product", "2", at(1), 100).await.unwrap();
        repo.store("c", "product", "3", at(2), 100).await.unwrap();

        assert_eq!(repo.remove_category("product").await.unwrap(), 2);
        repo.remove("a").await.unwrap();
        assert!(repo.load_all().await.unwrap().is_empty());
    }
}
