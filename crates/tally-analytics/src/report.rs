//! # Report Types
//!
//! The values the service computes and the cache stores.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Report          Category   Key                  Orders fetched         │
//! │  ─────────────   ────────   ──────────────────   ────────────────────── │
//! │  DayReport       Daily      2026-10-18           delivered, one day     │
//! │  MonthReport     Monthly    2026-10              delivered, one month   │
//! │  YearOverview    Monthly    year:2026            delivered, one year    │
//! │  CustomerReport  Monthly    customers:2026-10    ALL, Jan..=month       │
//! │  ProductReport   Product    2026-10              delivered, one month   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::analytics::{
    CustomerFrequency, DailySales, MonthlyBucket, PaymentBreakdown, ProductAggregate,
    ProductSales, SalesTotals, WeeklySales,
};
use tally_core::SalesMonth;

// =============================================================================
// Reports
// =============================================================================

/// One day's sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub totals: SalesTotals,
    pub payments: PaymentBreakdown,
    pub top_products: Vec<ProductAggregate>,
}

/// One month's sales by day and by week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthReport {
    pub month: SalesMonth,
    pub daily: DailySales,
    pub weekly: WeeklySales,
    pub totals: SalesTotals,
    pub payments: PaymentBreakdown,
}

/// Twelve monthly buckets of a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearOverview {
    pub year: i32,
    pub months: [MonthlyBucket; 12],
    pub totals: SalesTotals,
}

/// Per-product breakdown of a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReport {
    pub month: SalesMonth,
    pub products: ProductSales,
    /// Best sellers, limited to the configured count.
    pub top: Vec<ProductAggregate>,
}

/// Customer segmentation as of a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerReport {
    pub month: SalesMonth,
    pub frequency: CustomerFrequency,
}

// =============================================================================
// Cached Aggregate
// =============================================================================

/// Any report the cache can hold. Tagged so mirrored payloads decode back to
/// the right type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum CachedAggregate {
    Day(Arc<DayReport>),
    Month(Arc<MonthReport>),
    Year(Arc<YearOverview>),
    Products(Arc<ProductReport>),
    Customers(Arc<CustomerReport>),
}

/// A report type that can live in the cache.
pub trait CacheValue: Send + Sync + Sized + 'static {
    fn wrap(value: Arc<Self>) -> CachedAggregate;
    fn unwrap(aggregate: &CachedAggregate) -> Option<Arc<Self>>;
}

macro_rules! cache_value {
    ($report:ty, $variant:ident) => {
        impl CacheValue for $report {
            fn wrap(value: Arc<Self>) -> CachedAggregate {
                CachedAggregate::$variant(value)
            }

            fn unwrap(aggregate: &CachedAggregate) -> Option<Arc<Self>> {
                match aggregate {
                    CachedAggregate::$variant(value) => Some(Arc::clone(value)),
                    _ => None,
                }
            }
        }
    };
}

cache_value!(DayReport, Day);
cache_value!(MonthReport, Month);
cache_value!(YearOverview, Year);
cache_value!(ProductReport, Products);
cache_value!(CustomerReport, Customers);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_checks_type() {
        let report = Arc::new(CustomerReport {
            month: SalesMonth::new(2026, 10).unwrap(),
            frequency: CustomerFrequency::default(),
        });
        let wrapped = CustomerReport::wrap(Arc::clone(&report));

        let back = CustomerReport::unwrap(&wrapped).unwrap();
        assert!(Arc::ptr_eq(&back, &report));
        assert!(MonthReport::unwrap(&wrapped).is_none());
    }

    #[test]
    fn test_tagged_payload_decodes_to_same_variant() {
        let wrapped = YearOverview::wrap(Arc::new(YearOverview {
            year: 2026,
            months: std::array::from_fn(|i| MonthlyBucket {
                month: i as u32 + 1,
                order_count: 0,
                sales_total: tally_core::Money::zero(),
            }),
            totals: SalesTotals::default(),
        }));

        let json = serde_json::to_string(&wrapped).unwrap();
        assert!(json.contains("\"kind\":\"year\""));

        let decoded: CachedAggregate = serde_json::from_str(&json).unwrap();
        let year = YearOverview::unwrap(&decoded).unwrap();
        assert_eq!(year.year, 2026);
        assert_eq!(year.months[11].month, 12);
    }
}
