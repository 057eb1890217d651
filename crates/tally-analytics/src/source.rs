//! # Order Source
//!
//! The seam between the analytics layer and wherever orders live.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ingestion Adapter                                 │
//! │                                                                         │
//! │  AnalyticsService                                                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ResilientSource ── timeout per attempt ──► OrderSource (Database, ...) │
//! │        │                                                                │
//! │        └── DataUnavailable / Timeout ──► backoff ──► retry (max N)      │
//! │                                                                         │
//! │  ChangeNotifier ──► OrderFeed::subscribe()      live changes            │
//! │                 └─► OrderFeed::recent_orders()  priming snapshot        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sources return orders as stored, malformed ones included. The aggregation
//! engine decides what to skip.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use tally_core::{Order, OrderChange, ReportCalendar, SalesMonth};
use tally_db::Database;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SourceSettings;
use crate::error::{AnalyticsError, AnalyticsResult};

// =============================================================================
// Traits
// =============================================================================

/// Read access to orders by time window.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Delivered orders placed in `[start, end]`.
    async fn fetch_delivered_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Order>>;

    /// Orders of every status placed in `month` (local calendar).
    async fn fetch_all_orders_in_month(
        &self,
        month: SalesMonth,
        calendar: &ReportCalendar,
    ) -> AnalyticsResult<Vec<Order>>;
}

/// Live order changes.
#[async_trait]
pub trait OrderFeed: Send + Sync {
    /// A receiver for every change published after this call.
    fn subscribe(&self) -> broadcast::Receiver<OrderChange>;

    /// The most recent orders placed at or after `since`, newest first.
    async fn recent_orders(&self, since: DateTime<Utc>, limit: u32)
        -> AnalyticsResult<Vec<Order>>;
}

#[async_trait]
impl<S: OrderSource + ?Sized> OrderSource for Arc<S> {
    async fn fetch_delivered_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Order>> {
        (**self).fetch_delivered_orders(start, end).await
    }

    async fn fetch_all_orders_in_month(
        &self,
        month: SalesMonth,
        calendar: &ReportCalendar,
    ) -> AnalyticsResult<Vec<Order>> {
        (**self).fetch_all_orders_in_month(month, calendar).await
    }
}

// =============================================================================
// Database Adapter
// =============================================================================

#[async_trait]
impl OrderSource for Database {
    async fn fetch_delivered_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Order>> {
        Ok(self.orders().fetch_delivered_between(start, end).await?)
    }

    async fn fetch_all_orders_in_month(
        &self,
        month: SalesMonth,
        calendar: &ReportCalendar,
    ) -> AnalyticsResult<Vec<Order>> {
        let (start, end) = calendar.month_window(month);
        Ok(self.orders().fetch_placed_between(start, end).await?)
    }
}

#[async_trait]
impl OrderFeed for Database {
    fn subscribe(&self) -> broadcast::Receiver<OrderChange> {
        self.subscribe_changes()
    }

    async fn recent_orders(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> AnalyticsResult<Vec<Order>> {
        Ok(self.orders().recent_since(since, limit).await?)
    }
}

// =============================================================================
// Resilient Source
// =============================================================================

/// Timeout and retry policy for a single fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Limit for one attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &SourceSettings) -> Self {
        RetryPolicy {
            timeout: settings.fetch_timeout(),
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_settings(&SourceSettings::default())
    }
}

/// Wraps a source with a per-attempt timeout and exponential-backoff retries.
///
/// Only retryable errors (`DataUnavailable`, `Timeout`) are retried; anything
/// else, including permanent store failures, is returned immediately.
pub struct ResilientSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: OrderSource> ResilientSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        ResilientSource { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt_fn: F) -> AnalyticsResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = AnalyticsResult<T>> + Send,
        T: Send,
    {
        let mut backoff = self.policy.create_backoff();
        let mut retries = 0u32;

        loop {
            let result = match timeout(self.policy.timeout, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(AnalyticsError::Timeout(
                    u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            };

            match result {
                Ok(value) => {
                    if retries > 0 {
                        debug!(operation, retries, "Fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && retries < self.policy.max_retries => {
                    retries += 1;
                    let delay = backoff.next_backoff().unwrap_or(self.policy.max_backoff);
                    warn!(
                        operation,
                        attempt = retries,
                        ?delay,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, retries, error = %e, "Fetch failed, giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl<S: OrderSource> OrderSource for ResilientSource<S> {
    async fn fetch_delivered_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Order>> {
        self.with_retry("fetch_delivered_orders", || {
            self.inner.fetch_delivered_orders(start, end)
        })
        .await
    }

    async fn fetch_all_orders_in_month(
        &self,
        month: SalesMonth,
        calendar: &ReportCalendar,
    ) -> AnalyticsResult<Vec<Order>> {
        self.with_retry("fetch_all_orders_in_month", || {
            self.inner.fetch_all_orders_in_month(month, calendar)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tally_core::{OrderItem, OrderStatus, PaymentMethod};
    use tally_db::DbConfig;

    /// Fails `failures` times, then returns one order.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> AnalyticsError,
        delay: Duration,
    }

    impl FlakySource {
        fn new(failures: u32) -> Self {
            FlakySource {
                failures,
                calls: AtomicU32::new(0),
                error: || AnalyticsError::DataUnavailable("store offline".into()),
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderSource for FlakySource {
        async fn fetch_delivered_orders(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> AnalyticsResult<Vec<Order>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(vec![sample_order(Utc::now())])
        }

        async fn fetch_all_orders_in_month(
            &self,
            _month: SalesMonth,
            _calendar: &ReportCalendar,
        ) -> AnalyticsResult<Vec<Order>> {
            Ok(Vec::new())
        }
    }

    fn sample_order(at: DateTime<Utc>) -> Order {
        Order::checkout(
            "Juan",
            at,
            PaymentMethod::Cash,
            vec![OrderItem::new("Adobo", 18500, 1)],
        )
        .with_status(OrderStatus::Delivered)
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(10),
            max_retries,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let source = ResilientSource::new(FlakySource::new(2), policy(3));

        let orders = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(source.inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let source = ResilientSource::new(FlakySource::new(10), policy(2));

        let err = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::DataUnavailable(_)));
        assert_eq!(source.inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_not_retried() {
        let mut flaky = FlakySource::new(10);
        flaky.error = || AnalyticsError::CacheError("bad payload".into());
        let source = ResilientSource::new(flaky, policy(3));

        let err = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::CacheError(_)));
        assert_eq!(source.inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let mut slow = FlakySource::new(0);
        slow.delay = Duration::from_secs(60);
        let source = ResilientSource::new(slow, policy(0));

        let err = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::Timeout(10_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_timeout_reports_millis() {
        let mut slow = FlakySource::new(0);
        slow.delay = Duration::from_secs(1);
        let mut policy = policy(0);
        policy.timeout = Duration::from_millis(500);
        let source = ResilientSource::new(slow, policy);

        let err = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::Timeout(500)));
        assert!(err.to_string().contains("500 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_store_error_is_not_retried() {
        let mut broken = FlakySource::new(10);
        broken.error = || tally_db::DbError::Serialization("bad items_json".into()).into();
        let source = ResilientSource::new(broken, policy(3));

        let err = source
            .fetch_delivered_orders(Utc::now(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::Store(_)));
        assert_eq!(source.inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_database_source_month_includes_every_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let in_month = Utc.with_ymd_and_hms(2026, 10, 5, 12, 0, 0).unwrap();
        let next_month = Utc.with_ymd_and_hms(2026, 11, 1, 12, 0, 0).unwrap();

        db.orders().insert(&sample_order(in_month)).await.unwrap();
        db.orders()
            .insert(&sample_order(in_month).with_status(OrderStatus::Cancelled))
            .await
            .unwrap();
        db.orders().insert(&sample_order(next_month)).await.unwrap();

        let calendar = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        let month = SalesMonth::new(2026, 10).unwrap();

        let all = db.fetch_all_orders_in_month(month, &calendar).await.unwrap();
        assert_eq!(all.len(), 2);

        let (start, end) = calendar.month_window(month);
        let delivered = db.fetch_delivered_orders(start, end).await.unwrap();
        assert_eq!(delivered.len(), 1);
    }

    #[tokio::test]
    async fn test_database_feed_sees_inserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut rx = OrderFeed::subscribe(&db);

        let order = sample_order(Utc::now());
        db.orders().insert(&order).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.order.id, order.id);

        let recent = db
            .recent_orders(Utc::now() - chrono::Duration::hours(1), 50)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }
}
