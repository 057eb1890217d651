//! # Analytics Service
//!
//! Orchestrates source, cache and engine into cached reports.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  month_report(2026-10, force)                                           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  CacheStore::get_or_compute(Monthly "2026-10")                          │
//! │        │ miss / stale / forced                                          │
//! │        ▼                                                                │
//! │  ResilientSource::fetch_delivered_orders(month window)                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  tally_core::analytics  (daily ─► weekly, totals, payments)             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Snapshot<MonthReport> { value: Arc, computed_at, freshness }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use tally_core::analytics::{
    compute_customer_frequency, compute_daily_sales, compute_monthly_sales,
    compute_payment_breakdown, compute_product_aggregates, compute_sales_totals,
    compute_weekly_sales, rank_products,
};
use tally_core::{ReportCalendar, SalesMonth};
use tally_db::Database;
use tracing::{debug, info};

use crate::cache::{CacheCategory, CacheKey, CacheStore, DbCacheMirror, Snapshot};
use crate::clock::ReportClock;
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsResult;
use crate::notifier::{ChangeNotifier, NotifierHandle};
use crate::report::{CustomerReport, DayReport, MonthReport, ProductReport, YearOverview};
use crate::source::{OrderFeed, OrderSource, ResilientSource, RetryPolicy};

/// Cached sales reports over an order source.
pub struct AnalyticsService {
    source: Arc<dyn OrderSource>,
    cache: Arc<CacheStore>,
    config: AnalyticsConfig,
    clock: ReportClock,
}

impl AnalyticsService {
    /// Creates a service over `source`, wrapped with the configured timeout
    /// and retry policy. The cache starts empty and is not mirrored.
    pub fn new(source: Arc<dyn OrderSource>, config: AnalyticsConfig) -> Self {
        let policy = RetryPolicy::from_settings(&config.source);
        AnalyticsService {
            source: Arc::new(ResilientSource::new(source, policy)),
            cache: Arc::new(CacheStore::new(&config.cache)),
            clock: config.clock(),
            config,
        }
    }

    /// Creates a service reading from the database, mirroring the cache into
    /// it when `cache.persist` is set and hydrating from the mirror.
    pub async fn with_database(db: Database, config: AnalyticsConfig) -> Self {
        let mut service = AnalyticsService::new(Arc::new(db.clone()), config);

        if service.config.cache.persist {
            let mirror = DbCacheMirror::new(db, service.config.cache.persist_max_bytes);
            let cache = CacheStore::new(&service.config.cache).with_mirror(Arc::new(mirror));
            cache.hydrate().await;
            service.cache = Arc::new(cache);
        }

        service
    }

    /// Replaces the clock (fixed calendars for replays and tests).
    pub fn with_clock(mut self, clock: ReportClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the cache, e.g. to share one between services.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// The calendar reports are currently bucketed in.
    pub fn calendar(&self) -> ReportCalendar {
        self.clock.calendar()
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Delivered sales of one local day.
    pub async fn daily_report(
        &self,
        date: NaiveDate,
        force_refresh: bool,
    ) -> AnalyticsResult<Snapshot<DayReport>> {
        let key = CacheKey::new(CacheCategory::Daily, date.to_string());
        self.cache
            .get_or_compute(key, force_refresh, || self.compute_day(date))
            .await
    }

    /// Delivered sales of a month by day and by week.
    pub async fn month_report(
        &self,
        month: SalesMonth,
        force_refresh: bool,
    ) -> AnalyticsResult<Snapshot<MonthReport>> {
        let key = CacheKey::new(CacheCategory::Monthly, month.key());
        self.cache
            .get_or_compute(key, force_refresh, || self.compute_month(month))
            .await
    }

    /// Twelve monthly buckets of delivered sales.
    pub async fn year_overview(
        &self,
        year: i32,
        force_refresh: bool,
    ) -> AnalyticsResult<Snapshot<YearOverview>> {
        SalesMonth::new(year, 1)?;
        let key = CacheKey::new(CacheCategory::Monthly, format!("year:{year}"));
        self.cache
            .get_or_compute(key, force_refresh, || self.compute_year(year))
            .await
    }

    /// Revenue and units per product for a month, plus the best sellers.
    pub async fn product_report(
        &self,
        month: SalesMonth,
        force_refresh: bool,
    ) -> AnalyticsResult<Snapshot<ProductReport>> {
        let key = CacheKey::new(CacheCategory::Product, month.key());
        self.cache
            .get_or_compute(key, force_refresh, || self.compute_products(month))
            .await
    }

    /// Customer segmentation over January through `month` of its year.
    ///
    /// Orders of every status count. Loyalty is judged within `month` itself:
    /// as of today for the current month, as of the month's last day for any
    /// other.
    pub async fn customer_report(
        &self,
        month: SalesMonth,
        force_refresh: bool,
    ) -> AnalyticsResult<Snapshot<CustomerReport>> {
        let key = CacheKey::new(CacheCategory::Monthly, format!("customers:{}", month.key()));
        self.cache
            .get_or_compute(key, force_refresh, || self.compute_customers(month))
            .await
    }

    // =========================================================================
    // Computation
    // =========================================================================

    async fn compute_day(&self, date: NaiveDate) -> AnalyticsResult<DayReport> {
        let (start, end) = self.calendar().day_window(date);
        let orders = self.source.fetch_delivered_orders(start, end).await?;
        let products = compute_product_aggregates(&orders);

        debug!(%date, orders = orders.len(), "Computed day report");
        Ok(DayReport {
            date,
            totals: compute_sales_totals(&orders),
            payments: compute_payment_breakdown(&orders),
            top_products: rank_products(&products, self.config.report.top_products),
        })
    }

    async fn compute_month(&self, month: SalesMonth) -> AnalyticsResult<MonthReport> {
        let calendar = self.calendar();
        let (start, end) = calendar.month_window(month);
        let orders = self.source.fetch_delivered_orders(start, end).await?;

        let daily = compute_daily_sales(&orders, month, &calendar);
        let weekly = compute_weekly_sales(&daily);

        debug!(%month, orders = orders.len(), "Computed month report");
        Ok(MonthReport {
            month,
            daily,
            weekly,
            totals: compute_sales_totals(&orders),
            payments: compute_payment_breakdown(&orders),
        })
    }

    async fn compute_year(&self, year: i32) -> AnalyticsResult<YearOverview> {
        let calendar = self.calendar();
        let (start, end) = calendar.year_window(year);
        let orders = self.source.fetch_delivered_orders(start, end).await?;

        debug!(year, orders = orders.len(), "Computed year overview");
        Ok(YearOverview {
            year,
            months: compute_monthly_sales(&orders, year, &calendar),
            totals: compute_sales_totals(&orders),
        })
    }

    async fn compute_products(&self, month: SalesMonth) -> AnalyticsResult<ProductReport> {
        let (start, end) = self.calendar().month_window(month);
        let orders = self.source.fetch_delivered_orders(start, end).await?;
        let products = compute_product_aggregates(&orders);
        let top = rank_products(&products, self.config.report.top_products);

        debug!(%month, products = products.len(), "Computed product report");
        Ok(ProductReport {
            month,
            products,
            top,
        })
    }

    async fn compute_customers(&self, month: SalesMonth) -> AnalyticsResult<CustomerReport> {
        let calendar = self.calendar();
        let as_of = if month.contains(calendar.today()) {
            calendar
        } else {
            ReportCalendar::new(calendar.offset(), month.last_day())
        };

        let mut orders = Vec::new();
        let mut current = SalesMonth::new(month.year(), 1)?;
        while current <= month {
            orders.extend(self.source.fetch_all_orders_in_month(current, &as_of).await?);
            current = current.next();
        }

        let frequency = compute_customer_frequency(&orders, &as_of);
        debug!(
            %month,
            orders = orders.len(),
            customers = frequency.customers.len(),
            loyal = frequency.loyal_customers.len(),
            "Computed customer report"
        );
        Ok(CustomerReport { month, frequency })
    }

    // =========================================================================
    // Cache control
    // =========================================================================

    /// Drops every cached report. Returns the number removed.
    pub async fn invalidate_all(&self) -> usize {
        let removed = self.cache.clear().await;
        info!(removed, "Invalidated all cached reports");
        removed
    }

    /// Starts a change notifier that invalidates this service's cache.
    pub async fn start_notifier(&self, feed: Arc<dyn OrderFeed>) -> NotifierHandle {
        ChangeNotifier::new(
            feed,
            Arc::clone(&self.cache),
            self.config.notifier.clone(),
            self.clock,
        )
        .start()
        .await
    }
}
