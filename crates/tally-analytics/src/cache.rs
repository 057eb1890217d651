//! # Report Cache
//!
//! In-memory TTL cache of computed reports with single-flight refresh and an
//! optional durable mirror.
//!
//! ## Lookup Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     get_or_compute(key, force)                          │
//! │                                                                         │
//! │  Fresh entry and !force ───────────────────────────────► return it      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  lock key flight (one computation per key)                              │
//! │        │                                                                │
//! │        ├── refreshed while we waited? ─────────────────► return it      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  compute()                                                              │
//! │        ├── Ok, invalidated meanwhile ──► return as Stale, not stored    │
//! │        ├── Ok  ──► put (new Arc, new generation) ──► mirror ──► Fresh   │
//! │        └── Err ──► entry exists? ──yes──► serve it as Stale             │
//! │                                  └─no───► propagate error               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Categories
//! | Category | Keys                                   | Default TTL |
//! |----------|----------------------------------------|-------------|
//! | Daily    | `2026-10-18`                           | 15 min      |
//! | Monthly  | `2026-10`, `year:2026`, `customers:..` | 30 min      |
//! | Product  | `2026-10`                              | 30 min      |
//!
//! TTL is checked lazily on read; expired entries stay resident as `Stale`
//! until replaced or invalidated.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_db::{Database, StoreOutcome};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CacheSettings, MAX_TTL_SECS};
use crate::error::AnalyticsResult;
use crate::report::{CacheValue, CachedAggregate};

// =============================================================================
// Keys
// =============================================================================

/// Cache partition; each has its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Daily,
    Monthly,
    Product,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [
        CacheCategory::Daily,
        CacheCategory::Monthly,
        CacheCategory::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Daily => "daily",
            CacheCategory::Monthly => "monthly",
            CacheCategory::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        CacheCategory::ALL.into_iter().find(|c| c.as_str() == s)
    }

    fn index(self) -> usize {
        match self {
            CacheCategory::Daily => 0,
            CacheCategory::Monthly => 1,
            CacheCategory::Product => 2,
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category plus key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub category: CacheCategory,
    pub key: String,
}

impl CacheKey {
    pub fn new(category: CacheCategory, key: impl Into<String>) -> Self {
        CacheKey {
            category,
            key: key.into(),
        }
    }

    /// Key used in the mirror table, e.g. `monthly:2026-10`.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.category.as_str(), self.key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Whether a snapshot is within its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
}

/// An immutable computed report and when it was computed.
#[derive(Debug, Serialize)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    pub computed_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Snapshot {
            value: Arc::clone(&self.value),
            computed_at: self.computed_at,
            freshness: self.freshness,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    fn into_stale(mut self) -> Self {
        self.freshness = Freshness::Stale;
        self
    }
}

/// Result of a cache read.
#[derive(Debug)]
pub enum CacheLookup<T> {
    Fresh(Snapshot<T>),
    Stale(Snapshot<T>),
    Miss,
}

impl<T> CacheLookup<T> {
    /// The snapshot regardless of freshness.
    pub fn snapshot(self) -> Option<Snapshot<T>> {
        match self {
            CacheLookup::Fresh(s) | CacheLookup::Stale(s) => Some(s),
            CacheLookup::Miss => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }
}

// =============================================================================
// Mirror
// =============================================================================

/// A serialized entry as held by a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    pub key: CacheKey,
    /// JSON of a [`CachedAggregate`].
    pub payload: String,
    pub computed_at: DateTime<Utc>,
}

/// Durable key-value storage for cache entries, so reports survive restarts.
#[async_trait]
pub trait CacheMirror: Send + Sync {
    async fn load(&self) -> AnalyticsResult<Vec<MirrorRecord>>;
    async fn store(&self, record: &MirrorRecord) -> AnalyticsResult<()>;
    async fn remove(&self, key: &CacheKey) -> AnalyticsResult<()>;
    async fn remove_category(&self, category: CacheCategory) -> AnalyticsResult<()>;
}

/// Mirror backed by the `analytics_cache` table.
#[derive(Debug, Clone)]
pub struct DbCacheMirror {
    db: Database,
    max_bytes: u64,
}

impl DbCacheMirror {
    pub fn new(db: Database, max_bytes: u64) -> Self {
        DbCacheMirror { db, max_bytes }
    }
}

#[async_trait]
impl CacheMirror for DbCacheMirror {
    async fn load(&self) -> AnalyticsResult<Vec<MirrorRecord>> {
        let entries = self.db.cache_mirror().load_all().await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let category = CacheCategory::parse(&entry.category)?;
                let prefix = format!("{}:", category.as_str());
                let key = entry.cache_key.strip_prefix(&prefix)?;
                Some(MirrorRecord {
                    key: CacheKey::new(category, key),
                    payload: entry.payload,
                    computed_at: entry.computed_at,
                })
            })
            .collect())
    }

    async fn store(&self, record: &MirrorRecord) -> AnalyticsResult<()> {
        let outcome = self
            .db
            .cache_mirror()
            .store(
                &record.key.storage_key(),
                record.key.category.as_str(),
                &record.payload,
                record.computed_at,
                self.max_bytes,
            )
            .await?;

        if let StoreOutcome::Stored { evicted } = outcome {
            if evicted > 0 {
                debug!(key = %record.key, evicted, "Mirror evicted older entries");
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> AnalyticsResult<()> {
        self.db.cache_mirror().remove(&key.storage_key()).await?;
        Ok(())
    }

    async fn remove_category(&self, category: CacheCategory) -> AnalyticsResult<()> {
        self.db
            .cache_mirror()
            .remove_category(category.as_str())
            .await?;
        Ok(())
    }
}

// =============================================================================
// Cache Store
// =============================================================================

struct Entry {
    value: CachedAggregate,
    computed_at: DateTime<Utc>,
    expires_at: Instant,
    generation: u64,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// TTL cache of reports.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    /// One async mutex per key with a computation in flight.
    flights: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    /// Bumped on every write; lets a waiter detect a refresh it waited on.
    generation: AtomicU64,
    /// Per-category invalidation counters. A computation that spans an
    /// invalidation of its category is returned but never stored.
    epochs: [AtomicU64; 3],
    daily_ttl: Duration,
    monthly_ttl: Duration,
    product_ttl: Duration,
    mirror: Option<Arc<dyn CacheMirror>>,
}

impl CacheStore {
    pub fn new(settings: &CacheSettings) -> Self {
        CacheStore {
            entries: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            epochs: Default::default(),
            daily_ttl: settings.ttl(CacheCategory::Daily),
            monthly_ttl: settings.ttl(CacheCategory::Monthly),
            product_ttl: settings.ttl(CacheCategory::Product),
            mirror: None,
        }
    }

    /// Attaches a durable mirror. Writes and invalidations are forwarded to it.
    pub fn with_mirror(mut self, mirror: Arc<dyn CacheMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn ttl(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Daily => self.daily_ttl,
            CacheCategory::Monthly => self.monthly_ttl,
            CacheCategory::Product => self.product_ttl,
        }
    }

    /// Number of resident entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    // =========================================================================
    // Reads and writes
    // =========================================================================

    /// Looks up a report. An entry holding a different report type is a miss.
    pub async fn get<T: CacheValue>(&self, category: CacheCategory, key: &str) -> CacheLookup<T> {
        self.lookup(&CacheKey::new(category, key)).await
    }

    async fn lookup<T: CacheValue>(&self, key: &CacheKey) -> CacheLookup<T> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(key) else {
            return CacheLookup::Miss;
        };
        let Some(value) = T::unwrap(&entry.value) else {
            debug!(%key, "Cached entry holds a different report type");
            return CacheLookup::Miss;
        };

        let fresh = entry.is_fresh(Instant::now());
        let snapshot = Snapshot {
            value,
            computed_at: entry.computed_at,
            freshness: if fresh { Freshness::Fresh } else { Freshness::Stale },
        };

        if fresh {
            CacheLookup::Fresh(snapshot)
        } else {
            CacheLookup::Stale(snapshot)
        }
    }

    /// Stores a report, replacing any previous entry for the key.
    pub async fn put<T: CacheValue>(
        &self,
        category: CacheCategory,
        key: &str,
        value: Arc<T>,
    ) -> Snapshot<T> {
        self.store(CacheKey::new(category, key), value).await
    }

    async fn store<T: CacheValue>(&self, key: CacheKey, value: Arc<T>) -> Snapshot<T> {
        let computed_at = Utc::now();
        let aggregate = T::wrap(Arc::clone(&value));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let payload = match &self.mirror {
            Some(_) => match serde_json::to_string(&aggregate) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(%key, error = %e, "Failed to encode report for mirror");
                    None
                }
            },
            None => None,
        };

        self.entries.write().await.insert(
            key.clone(),
            Entry {
                value: aggregate,
                computed_at,
                expires_at: expiry(Instant::now(), self.ttl(key.category)),
                generation,
            },
        );
        debug!(%key, generation, "Cached report");

        if let (Some(mirror), Some(payload)) = (&self.mirror, payload) {
            let record = MirrorRecord {
                key,
                payload,
                computed_at,
            };
            if let Err(e) = mirror.store(&record).await {
                warn!(key = %record.key, error = %e, "Failed to mirror report");
            }
        }

        Snapshot {
            value,
            computed_at,
            freshness: Freshness::Fresh,
        }
    }

    /// Drops one key, or the whole category when `key` is `None`. Returns the
    /// number of entries removed.
    pub async fn invalidate(&self, category: CacheCategory, key: Option<&str>) -> usize {
        self.epoch(category).fetch_add(1, Ordering::SeqCst);
        let removed = {
            let mut entries = self.entries.write().await;
            match key {
                Some(key) => entries
                    .remove(&CacheKey::new(category, key))
                    .map_or(0, |_| 1),
                None => {
                    let before = entries.len();
                    entries.retain(|k, _| k.category != category);
                    before - entries.len()
                }
            }
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!(%category, key = ?key, removed, "Invalidated cache");

        if let Some(mirror) = &self.mirror {
            let result = match key {
                Some(key) => mirror.remove(&CacheKey::new(category, key)).await,
                None => mirror.remove_category(category).await,
            };
            if let Err(e) = result {
                warn!(%category, error = %e, "Failed to invalidate mirror");
            }
        }

        removed
    }

    /// Drops everything in every category.
    pub async fn clear(&self) -> usize {
        let mut removed = 0;
        for category in CacheCategory::ALL {
            removed += self.invalidate(category, None).await;
        }
        removed
    }

    // =========================================================================
    // Single-flight
    // =========================================================================

    /// Returns the fresh entry for `key`, or computes, stores and returns a
    /// new one. Concurrent callers for the same key share one computation.
    ///
    /// ## When This Fails
    /// Only when `compute` fails and nothing, not even a stale entry, is
    /// cached for the key. Otherwise the old entry is served as `Stale`.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: CacheKey,
        force_refresh: bool,
        compute: F,
    ) -> AnalyticsResult<Snapshot<T>>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        if !force_refresh {
            if let CacheLookup::Fresh(snapshot) = self.lookup::<T>(&key).await {
                return Ok(snapshot);
            }
        }

        let observed = self.generation.load(Ordering::SeqCst);
        let flight = self.flight(&key).await;
        let result = {
            let _guard = flight.lock().await;

            match self.refreshed_since::<T>(&key, observed).await {
                Some(snapshot) => Ok(snapshot),
                None => self.compute_and_store(&key, compute).await,
            }
        };
        self.land(&key, flight).await;

        result
    }

    async fn compute_and_store<T, F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> AnalyticsResult<Snapshot<T>>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        let epoch = self.epoch(key.category).load(Ordering::SeqCst);

        match compute().await {
            Ok(value) if self.epoch(key.category).load(Ordering::SeqCst) != epoch => {
                debug!(%key, "Invalidated during refresh, result not cached");
                Ok(Snapshot {
                    value: Arc::new(value),
                    computed_at: Utc::now(),
                    freshness: Freshness::Stale,
                })
            }
            Ok(value) => Ok(self.store(key.clone(), Arc::new(value)).await),
            Err(e) => match self.lookup::<T>(key).await.snapshot() {
                Some(snapshot) => {
                    warn!(%key, error = %e, "Refresh failed, serving stale report");
                    Ok(snapshot.into_stale())
                }
                None => Err(e),
            },
        }
    }

    /// A fresh entry written after `observed`, if another caller refreshed
    /// the key while this one waited for the flight.
    async fn refreshed_since<T: CacheValue>(
        &self,
        key: &CacheKey,
        observed: u64,
    ) -> Option<Snapshot<T>> {
        let newer = {
            let entries = self.entries.read().await;
            entries.get(key).is_some_and(|e| e.generation > observed)
        };
        if !newer {
            return None;
        }
        match self.lookup::<T>(key).await {
            CacheLookup::Fresh(snapshot) => {
                debug!(%key, "Joined in-flight refresh");
                Some(snapshot)
            }
            _ => None,
        }
    }

    fn epoch(&self, category: CacheCategory) -> &AtomicU64 {
        &self.epochs[category.index()]
    }

    async fn flight(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(flights.entry(key.clone()).or_default())
    }

    /// Forgets the key's flight mutex once no other caller holds it.
    async fn land(&self, key: &CacheKey, flight: Arc<Mutex<()>>) {
        let mut flights = self.flights.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&flight) <= 2 {
            flights.remove(key);
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Loads mirrored entries as `Stale`. Keys already resident are kept.
    /// Returns the number of entries loaded.
    pub async fn hydrate(&self) -> usize {
        let Some(mirror) = &self.mirror else {
            return 0;
        };

        let records = match mirror.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to load cache mirror");
                return 0;
            }
        };

        let now = Instant::now();
        let mut loaded = 0;
        let mut entries = self.entries.write().await;

        for record in records {
            let value: CachedAggregate = match serde_json::from_str(&record.payload) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = %record.key, error = %e, "Skipping undecodable mirror entry");
                    continue;
                }
            };

            if entries.contains_key(&record.key) {
                continue;
            }
            entries.insert(
                record.key,
                Entry {
                    value,
                    computed_at: record.computed_at,
                    expires_at: now,
                    generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
                },
            );
            loaded += 1;
        }

        info!(loaded, "Hydrated report cache from mirror");
        loaded
    }
}

/// `now + ttl`, saturating at a far-future instant instead of overflowing.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .unwrap_or_else(|| now + Duration::from_secs(MAX_TTL_SECS))
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("daily_ttl", &self.daily_ttl)
            .field("monthly_ttl", &self.monthly_ttl)
            .field("product_ttl", &self.product_ttl)
            .field("mirrored", &self.mirror.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::report::{CustomerReport, MonthReport};
    use std::sync::atomic::AtomicU32;
    use tally_core::analytics::CustomerFrequency;
    use tally_core::SalesMonth;
    use tally_db::DbConfig;

    fn report(month: u32) -> CustomerReport {
        CustomerReport {
            month: SalesMonth::new(2026, month).unwrap(),
            frequency: CustomerFrequency::default(),
        }
    }

    fn store() -> CacheStore {
        CacheStore::new(&CacheSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale_after_ttl() {
        let cache = store();
        cache
            .put(CacheCategory::Daily, "2026-10-18", Arc::new(report(10)))
            .await;

        let lookup = cache.get::<CustomerReport>(CacheCategory::Daily, "2026-10-18").await;
        assert!(matches!(lookup, CacheLookup::Fresh(_)));

        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;

        let lookup = cache.get::<CustomerReport>(CacheCategory::Daily, "2026-10-18").await;
        assert!(matches!(lookup, CacheLookup::Stale(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_read_returns_stored_arc() {
        let cache = store();
        let value = Arc::new(report(10));
        cache
            .put(CacheCategory::Monthly, "2026-10", Arc::clone(&value))
            .await;

        let snapshot = cache
            .get::<CustomerReport>(CacheCategory::Monthly, "2026-10")
            .await
            .snapshot()
            .unwrap();
        assert!(Arc::ptr_eq(&snapshot.value, &value));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_type_is_a_miss() {
        let cache = store();
        cache
            .put(CacheCategory::Monthly, "2026-10", Arc::new(report(10)))
            .await;

        assert!(cache
            .get::<MonthReport>(CacheCategory::Monthly, "2026-10")
            .await
            .is_miss());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_key_and_category() {
        let cache = store();
        cache.put(CacheCategory::Monthly, "2026-09", Arc::new(report(9))).await;
        cache.put(CacheCategory::Monthly, "2026-10", Arc::new(report(10))).await;
        cache.put(CacheCategory::Product, "2026-10", Arc::new(report(10))).await;

        assert_eq!(cache.invalidate(CacheCategory::Monthly, Some("2026-09")).await, 1);
        assert_eq!(cache.invalidate(CacheCategory::Monthly, Some("2026-09")).await, 0);
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.invalidate(CacheCategory::Monthly, None).await, 1);
        assert!(cache
            .get::<CustomerReport>(CacheCategory::Product, "2026-10")
            .await
            .snapshot()
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_compute_serves_fresh_without_computing() {
        let cache = store();
        let key = CacheKey::new(CacheCategory::Monthly, "2026-10");
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            cache
                .get_or_compute(key.clone(), false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(report(10))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let forced = cache
            .get_or_compute(key, true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(report(10))
            })
            .await
            .unwrap();
        assert!(forced.is_fresh());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(store());
        let calls = Arc::new(AtomicU32::new(0));
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_compute(CacheKey::new(CacheCategory::Product, "2026-10"), false, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok(report(10))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap().value);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(cache.flights.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_serves_stale() {
        let cache = store();
        let key = CacheKey::new(CacheCategory::Daily, "2026-10-18");
        cache
            .get_or_compute(key.clone(), false, || async { Ok(report(10)) })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(16 * 60)).await;

        let snapshot = cache
            .get_or_compute::<CustomerReport, _, _>(key, false, || async {
                Err(AnalyticsError::DataUnavailable("offline".into()))
            })
            .await
            .unwrap();
        assert_eq!(snapshot.freshness, Freshness::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_compute_without_entry_propagates() {
        let cache = store();

        let err = cache
            .get_or_compute::<CustomerReport, _, _>(
                CacheKey::new(CacheCategory::Daily, "2026-10-18"),
                false,
                || async { Err(AnalyticsError::Timeout(10)) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Timeout(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_refresh_is_not_overwritten() {
        let cache = Arc::new(store());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let refresh = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(CacheKey::new(CacheCategory::Monthly, "2026-10"), false, move || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(report(10))
                    })
                    .await
                    .unwrap()
            })
        };

        started_rx.await.unwrap();
        cache.invalidate(CacheCategory::Monthly, None).await;
        release_tx.send(()).unwrap();

        let snapshot = refresh.await.unwrap();
        assert_eq!(snapshot.freshness, Freshness::Stale);
        assert!(cache
            .get::<CustomerReport>(CacheCategory::Monthly, "2026-10")
            .await
            .is_miss());

        // The next read computes again and caches normally.
        let next = cache
            .get_or_compute(CacheKey::new(CacheCategory::Monthly, "2026-10"), false, || async {
                Ok(report(10))
            })
            .await
            .unwrap();
        assert!(next.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidating_other_category_keeps_refresh() {
        let cache = store();
        let snapshot = cache
            .get_or_compute(CacheKey::new(CacheCategory::Product, "2026-10"), false, || async {
                cache.invalidate(CacheCategory::Daily, None).await;
                Ok(report(10))
            })
            .await
            .unwrap();
        assert!(snapshot.is_fresh());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_saturates() {
        let settings = CacheSettings {
            daily_ttl_secs: u64::MAX,
            ..CacheSettings::default()
        };
        let cache = CacheStore::new(&settings);
        cache
            .put(CacheCategory::Daily, "2026-10-18", Arc::new(report(10)))
            .await;

        tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
        let lookup = cache.get::<CustomerReport>(CacheCategory::Daily, "2026-10-18").await;
        assert!(matches!(lookup, CacheLookup::Fresh(_)));
    }

    #[tokio::test]
    async fn test_mirror_round_trip_hydrates_as_stale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mirror: Arc<dyn CacheMirror> = Arc::new(DbCacheMirror::new(db.clone(), 1_000_000));

        let first = store().with_mirror(Arc::clone(&mirror));
        first
            .put(CacheCategory::Monthly, "customers:2026-10", Arc::new(report(10)))
            .await;
        first.put(CacheCategory::Product, "2026-10", Arc::new(report(10))).await;
        first.invalidate(CacheCategory::Product, None).await;

        let second = store().with_mirror(mirror);
        assert_eq!(second.hydrate().await, 1);

        let lookup = second
            .get::<CustomerReport>(CacheCategory::Monthly, "customers:2026-10")
            .await;
        let CacheLookup::Stale(snapshot) = lookup else {
            panic!("hydrated entry should be stale");
        };
        assert_eq!(snapshot.value.month, SalesMonth::new(2026, 10).unwrap());
    }

    #[test]
    fn test_category_parse() {
        for category in CacheCategory::ALL {
            assert_eq!(CacheCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(CacheCategory::parse("weekly"), None);
        assert_eq!(
            CacheKey::new(CacheCategory::Daily, "2026-10-18").storage_key(),
            "daily:2026-10-18"
        );
    }
}
