//! # Sales Aggregation
//!
//! Daily, weekly and monthly sales totals over `Delivered` orders.
//!
//! ## Week Buckets
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Day of month:  1 ──── 7 │ 8 ──── 14 │ 15 ──── 21 │ 22 ──── 28..31      │
//! │  Bucket:          Week 1 │   Week 2  │   Week 3   │   Week 4            │
//! │                                                                         │
//! │  Not ISO weeks. Days 29-31 always land in week 4; monthly reports       │
//! │  downstream assume exactly four buckets.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::trace;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentMethod, ReportCalendar, SalesMonth};
use crate::validation::{well_formed, WellFormedOrder};
use crate::{DAYS_PER_WEEK_BUCKET, WEEKS_PER_MONTH};

// =============================================================================
// Buckets
// =============================================================================

/// Sales for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyBucket {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub order_count: u32,
    pub sales_total: Money,
}

impl DailyBucket {
    fn empty(date: NaiveDate) -> Self {
        DailyBucket {
            date,
            order_count: 0,
            sales_total: Money::zero(),
        }
    }
}

/// One bucket per day of a month, zero-order days included.
pub type DailySales = BTreeMap<NaiveDate, DailyBucket>;

/// One of the four fixed week buckets of a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WeeklyBucket {
    /// 1-4.
    pub week: u8,
    pub first_day: u32,
    pub last_day: u32,
    pub order_count: u32,
    pub sales_total: Money,
}

/// Exactly four week buckets.
pub type WeeklySales = [WeeklyBucket; WEEKS_PER_MONTH];

/// Sales for one month of a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyBucket {
    /// 1-12.
    pub month: u32,
    pub order_count: u32,
    pub sales_total: Money,
}

/// Count, sum and average of a set of delivered orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesTotals {
    pub order_count: u32,
    pub sales_total: Money,
    pub average_order_value: Money,
}

impl SalesTotals {
    fn record(&mut self, total: Money) {
        self.order_count += 1;
        self.sales_total += total;
        self.average_order_value = self.sales_total.average_over(u64::from(self.order_count));
    }
}

/// Delivered sales split by how they were paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub cash: SalesTotals,
    pub online: SalesTotals,
    /// Orders whose payment method was missing or unrecognized.
    pub unspecified: SalesTotals,
}

// =============================================================================
// Passes
// =============================================================================

fn delivered(orders: &[crate::Order]) -> impl Iterator<Item = WellFormedOrder<'_>> {
    well_formed(orders).filter(|o| o.order.is_delivered())
}

/// Builds one bucket per calendar day of `month` and folds every delivered
/// order whose local placement date falls in that month into its day.
///
/// Non-delivered orders are excluded entirely. Orders outside the month are
/// ignored.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::analytics::compute_daily_sales;
/// use tally_core::{ReportCalendar, SalesMonth};
///
/// let month = SalesMonth::new(2026, 9).unwrap();
/// let calendar = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());
/// let daily = compute_daily_sales(&[], month, &calendar);
/// assert_eq!(daily.len(), 30);
/// ```
pub fn compute_daily_sales(
    orders: &[crate::Order],
    month: SalesMonth,
    calendar: &ReportCalendar,
) -> DailySales {
    let mut daily: DailySales = month
        .days()
        .map(|date| (date, DailyBucket::empty(date)))
        .collect();

    for valid in delivered(orders) {
        let local = calendar.local_date(valid.date);
        match daily.get_mut(&local) {
            Some(bucket) => {
                bucket.order_count += 1;
                bucket.sales_total += valid.order.total();
            }
            None => {
                trace!(order_id = %valid.order.id, %local, %month, "Order outside report month");
            }
        }
    }

    daily
}

/// Index (0-3) of the week bucket a day of the month belongs to.
#[inline]
pub fn week_of_month(day: u32) -> usize {
    let index = (day.max(1) - 1) / DAYS_PER_WEEK_BUCKET;
    (index as usize).min(WEEKS_PER_MONTH - 1)
}

/// Folds daily buckets into the four fixed week buckets.
///
/// The sum over the four buckets always equals the sum over the days.
pub fn compute_weekly_sales(daily: &DailySales) -> WeeklySales {
    let mut weeks: WeeklySales = std::array::from_fn(|i| {
        let first_day = i as u32 * DAYS_PER_WEEK_BUCKET + 1;
        WeeklyBucket {
            week: i as u8 + 1,
            first_day,
            last_day: first_day + DAYS_PER_WEEK_BUCKET - 1,
            order_count: 0,
            sales_total: Money::zero(),
        }
    });

    for bucket in daily.values() {
        let day = bucket.date.day();
        let week = &mut weeks[week_of_month(day)];
        week.order_count += bucket.order_count;
        week.sales_total += bucket.sales_total;
        week.last_day = week.last_day.max(day);
    }

    weeks
}

/// Twelve monthly buckets for `year` over delivered orders.
pub fn compute_monthly_sales(
    orders: &[crate::Order],
    year: i32,
    calendar: &ReportCalendar,
) -> [MonthlyBucket; 12] {
    let mut months: [MonthlyBucket; 12] = std::array::from_fn(|i| MonthlyBucket {
        month: i as u32 + 1,
        order_count: 0,
        sales_total: Money::zero(),
    });

    for valid in delivered(orders) {
        let local = calendar.local_date(valid.date);
        if local.year() != year {
            continue;
        }
        let bucket = &mut months[local.month0() as usize];
        bucket.order_count += 1;
        bucket.sales_total += valid.order.total();
    }

    months
}

/// Count, sum and average order value of the delivered orders in a batch.
pub fn compute_sales_totals(orders: &[crate::Order]) -> SalesTotals {
    delivered(orders).fold(SalesTotals::default(), |mut totals, valid| {
        totals.record(valid.order.total());
        totals
    })
}

/// Delivered sales split by payment method.
pub fn compute_payment_breakdown(orders: &[crate::Order]) -> PaymentBreakdown {
    let mut breakdown = PaymentBreakdown::default();

    for valid in delivered(orders) {
        let slot = match valid.order.payment_method {
            Some(PaymentMethod::Cash) => &mut breakdown.cash,
            Some(PaymentMethod::Online) => &mut breakdown.online,
            None => &mut breakdown.unspecified,
        };
        slot.record(valid.order.total());
    }

    breakdown
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{delivered as delivered_order, order};
    use crate::types::{Order, OrderStatus};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn september() -> SalesMonth {
        SalesMonth::new(2026, 9).unwrap()
    }

    fn calendar() -> ReportCalendar {
        ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap())
    }

    fn sample() -> Vec<Order> {
        vec![
            delivered_order("a", (2026, 9, 3), 100),
            delivered_order("b", (2026, 9, 10), 200),
            delivered_order("c", (2026, 9, 25), 300),
        ]
    }

    #[test]
    fn test_daily_covers_every_day_of_month() {
        let daily = compute_daily_sales(&sample(), september(), &calendar());

        assert_eq!(daily.len(), 30);
        let non_zero: Vec<u32> = daily
            .values()
            .filter(|b| b.order_count > 0)
            .map(|b| b.date.day())
            .collect();
        assert_eq!(non_zero, vec![3, 10, 25]);
    }

    #[test]
    fn test_weekly_example_buckets() {
        let daily = compute_daily_sales(&sample(), september(), &calendar());
        let weekly = compute_weekly_sales(&daily);

        let totals: Vec<i64> = weekly.iter().map(|w| w.sales_total.cents()).collect();
        assert_eq!(totals, vec![100, 200, 0, 300]);
        assert_eq!(weekly[3].first_day, 22);
        assert_eq!(weekly[3].last_day, 30);
    }

    #[test]
    fn test_days_past_28_land_in_week_four() {
        assert_eq!(week_of_month(1), 0);
        assert_eq!(week_of_month(7), 0);
        assert_eq!(week_of_month(8), 1);
        assert_eq!(week_of_month(21), 2);
        assert_eq!(week_of_month(22), 3);
        assert_eq!(week_of_month(29), 3);
        assert_eq!(week_of_month(31), 3);
    }

    #[test]
    fn test_weekly_sum_matches_daily_sum() {
        let month = SalesMonth::new(2026, 10).unwrap();
        let cal = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 10, 31).unwrap());
        let orders: Vec<Order> = (1..=31)
            .map(|d| delivered_order(&format!("o{}", d), (2026, 10, d), i64::from(d) * 111))
            .collect();

        let daily = compute_daily_sales(&orders, month, &cal);
        let weekly = compute_weekly_sales(&daily);

        let daily_sum: Money = daily.values().map(|b| b.sales_total).sum();
        let weekly_sum: Money = weekly.iter().map(|w| w.sales_total).sum();
        assert_eq!(daily_sum, weekly_sum);
        assert_eq!(weekly[3].order_count, 10); // days 22..=31
        assert_eq!(weekly[3].last_day, 31);
    }

    #[test]
    fn test_non_delivered_orders_do_not_change_results() {
        let base = sample();
        let mut noisy = base.clone();
        noisy.push(order("p", "Ana", OrderStatus::Preparing, (2026, 9, 3), 999));
        noisy.push(order("x", "Ana", OrderStatus::Cancelled, (2026, 9, 10), 999));
        noisy.push(order("u", "Ana", OrderStatus::Unknown, (2026, 9, 25), 999));

        assert_eq!(
            compute_daily_sales(&base, september(), &calendar()),
            compute_daily_sales(&noisy, september(), &calendar())
        );
        assert_eq!(compute_sales_totals(&base), compute_sales_totals(&noisy));
    }

    #[test]
    fn test_daily_is_idempotent_and_order_independent() {
        let orders = sample();
        let mut reversed = orders.clone();
        reversed.reverse();

        let first = compute_daily_sales(&orders, september(), &calendar());
        let second = compute_daily_sales(&orders, september(), &calendar());
        let shuffled = compute_daily_sales(&reversed, september(), &calendar());
        assert_eq!(first, second);
        assert_eq!(first, shuffled);
    }

    #[test]
    fn test_malformed_and_out_of_month_orders_are_skipped() {
        let mut orders = sample();
        let mut no_date = delivered_order("nd", (2026, 9, 4), 50);
        no_date.date = None;
        orders.push(no_date);
        orders.push(delivered_order("oct", (2026, 10, 1), 70));

        let daily = compute_daily_sales(&orders, september(), &calendar());
        let total: Money = daily.values().map(|b| b.sales_total).sum();
        assert_eq!(total.cents(), 600);
    }

    #[test]
    fn test_bucketing_uses_calendar_offset() {
        // 23:30 UTC on Sep 3 is Sep 4 in UTC+8
        let mut late = delivered_order("late", (2026, 9, 3), 100);
        late.date = Some(Utc.with_ymd_and_hms(2026, 9, 3, 23, 30, 0).unwrap());
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let cal = ReportCalendar::new(offset, NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());

        let daily = compute_daily_sales(&[late], september(), &cal);
        let day4 = NaiveDate::from_ymd_opt(2026, 9, 4).unwrap();
        assert_eq!(daily[&day4].order_count, 1);
    }

    #[test]
    fn test_monthly_sales() {
        let orders = vec![
            delivered_order("a", (2026, 1, 5), 100),
            delivered_order("b", (2026, 1, 20), 150),
            delivered_order("c", (2026, 12, 31), 300),
            delivered_order("d", (2025, 12, 31), 999),
        ];
        let months = compute_monthly_sales(&orders, 2026, &calendar());

        assert_eq!(months.len(), 12);
        assert_eq!(months[0].order_count, 2);
        assert_eq!(months[0].sales_total.cents(), 250);
        assert_eq!(months[11].sales_total.cents(), 300);
        let year_total: Money = months.iter().map(|m| m.sales_total).sum();
        assert_eq!(year_total.cents(), 550);
    }

    #[test]
    fn test_totals_and_payment_breakdown() {
        let mut online = delivered_order("on", (2026, 9, 1), 400);
        online.payment_method = Some(PaymentMethod::Online);
        let mut unknown = delivered_order("un", (2026, 9, 1), 50);
        unknown.payment_method = None;
        let mut orders = sample();
        orders.push(online);
        orders.push(unknown);

        let totals = compute_sales_totals(&orders);
        assert_eq!(totals.order_count, 5);
        assert_eq!(totals.sales_total.cents(), 1050);
        assert_eq!(totals.average_order_value.cents(), 210);

        let breakdown = compute_payment_breakdown(&orders);
        assert_eq!(breakdown.cash.sales_total.cents(), 600);
        assert_eq!(breakdown.cash.average_order_value.cents(), 200);
        assert_eq!(breakdown.online.order_count, 1);
        assert_eq!(breakdown.unspecified.sales_total.cents(), 50);
    }

    #[test]
    fn test_empty_totals() {
        let totals = compute_sales_totals(&[]);
        assert_eq!(totals.order_count, 0);
        assert!(totals.average_order_value.is_zero());
    }
}
