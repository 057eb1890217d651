//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderItem     │   │  OrderChange    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  product_title  │   │  kind           │       │
//! │  │  status         │   │  unit_price     │   │  order          │       │
//! │  │  total_cents    │   │  quantity       │   └─────────────────┘       │
//! │  │  date           │   └─────────────────┘                              │
//! │  │  recipient      │                                                    │
//! │  │  items          │   ┌─────────────────┐   ┌─────────────────┐       │
//! │  └─────────────────┘   │   SalesMonth    │   │ ReportCalendar  │       │
//! │                        │  year, month    │   │ offset, today   │       │
//! │  ┌─────────────────┐   └─────────────────┘   └─────────────────┘       │
//! │  │  OrderStatus    │   ┌─────────────────┐                              │
//! │  │  Pending        │   │ PaymentMethod   │                              │
//! │  │  Preparing      │   │  Cash           │                              │
//! │  │  Delivered ★    │   │  Online         │                              │
//! │  │  Cancelled      │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ★ Only `Delivered` orders count toward revenue.
//!
//! ## Documents, not rows
//! Orders arrive from a document store where any field can be absent.
//! `date` and `items` are therefore optional here; the validation module
//! decides whether a record is usable.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order. Mutated by the kitchen/delivery workflow, which is
/// outside this crate, until it reaches `Delivered` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum OrderStatus {
    /// Placed, not yet being prepared.
    Pending,
    /// Being prepared.
    Preparing,
    /// Handed over. Terminal, counts toward analytics.
    Delivered,
    /// Terminal, never counts.
    Cancelled,
    /// Any status string this version doesn't know about.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns the canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Unknown => "Unknown",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: unknown strings become `Unknown` rather than an error,
/// since status values are owned by an external workflow.
impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "preparing" => OrderStatus::Preparing,
            "delivered" => OrderStatus::Delivered,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            _ => OrderStatus::Unknown,
        })
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card / e-wallet payment taken online.
    Online,
}

impl PaymentMethod {
    /// Returns the canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Online => "Online",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "online" => Ok(PaymentMethod::Online),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["Cash".to_string(), "Online".to_string()],
            }),
        }
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line of an order. The product is identified only by the title the line
/// carries; there is no link to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub product_title: String,
    /// Unit price in cents at time of sale.
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    /// Creates a line item.
    pub fn new(product_title: impl Into<String>, unit_price_cents: i64, quantity: i64) -> Self {
        OrderItem {
            product_title: product_title.into(),
            unit_price_cents,
            quantity,
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// One purchase transaction, as read from the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    /// Opaque identifier assigned by the store.
    pub id: String,

    pub status: OrderStatus,

    /// Order total in cents. Trusted to equal the sum of line totals.
    pub total_cents: i64,

    /// When the order was placed. Used for bucketing.
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,

    pub payment_method: Option<PaymentMethod>,

    /// Customer display name. Free text, not a stable identity.
    pub recipient: String,

    pub items: Option<Vec<OrderItem>>,

    /// When the row was created (distinct from `date`).
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new order at checkout with a fresh UUID, status `Pending`
    /// and a total computed from its items.
    pub fn checkout(
        recipient: impl Into<String>,
        date: DateTime<Utc>,
        payment_method: PaymentMethod,
        items: Vec<OrderItem>,
    ) -> Self {
        let total: Money = items.iter().map(OrderItem::line_total).sum();
        Order {
            id: Uuid::new_v4().to_string(),
            status: OrderStatus::Pending,
            total_cents: total.cents(),
            date: Some(date),
            payment_method: Some(payment_method),
            recipient: recipient.into(),
            items: Some(items),
            created_at: Some(date),
        }
    }

    /// Returns a copy with the given status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns a copy placed at `date`.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns true if this order counts toward revenue.
    #[inline]
    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }
}

// =============================================================================
// Order Change (live feed)
// =============================================================================

/// Kind of change the store reports on its live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A document change pushed by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChange {
    pub kind: ChangeKind,
    pub order: Order,
}

// =============================================================================
// Sales Month
// =============================================================================

/// A calendar month, the unit of most reports.
///
/// Deserialization goes through [`SalesMonth::new`], so cached or mirrored
/// JSON cannot produce an out-of-range month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "RawSalesMonth")]
#[ts(export)]
pub struct SalesMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawSalesMonth {
    year: i32,
    month: u32,
}

impl TryFrom<RawSalesMonth> for SalesMonth {
    type Error = ValidationError;

    fn try_from(raw: RawSalesMonth) -> Result<Self, Self::Error> {
        SalesMonth::new(raw.year, raw.month)
    }
}

impl SalesMonth {
    /// Creates a month, validating `month` is 1-12 and `year` is 1-9999.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=9999).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: 1,
                max: 9999,
            });
        }
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }
        Ok(SalesMonth { year, month })
    }

    /// The month a date falls in.
    pub fn of(date: NaiveDate) -> Self {
        SalesMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    #[inline]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[inline]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Number of calendar days in this month (28-31).
    pub fn days_in_month(&self) -> u32 {
        match self.month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if NaiveDate::from_ymd_opt(self.year, 2, 29).is_some() => 29,
            2 => 28,
            _ => 0,
        }
    }

    /// Returns the given day of this month, if it exists.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// Every date of the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (1..=self.days_in_month()).filter_map(move |d| self.day(d))
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        self.day(1).unwrap_or_default()
    }

    /// Last day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.day(self.days_in_month()).unwrap_or_default()
    }

    /// Returns true if the date falls inside this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            SalesMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            SalesMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Cache / display key, `YYYY-MM`.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for SalesMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parses `YYYY-MM`.
impl FromStr for SalesMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "month".to_string(),
            reason: format!("expected YYYY-MM, got '{}'", s),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        SalesMonth::new(year, month)
    }
}

// =============================================================================
// Report Calendar
// =============================================================================

/// The calendar reports are bucketed in: a fixed UTC offset (the store's
/// local time) and the date considered "today".
///
/// ## Why not `Local`?
/// Bucketing must be reproducible in tests and on servers whose clock zone
/// differs from the store's. The offset is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCalendar {
    offset: FixedOffset,
    today: NaiveDate,
}

impl ReportCalendar {
    /// Creates a calendar with an explicit "today".
    pub fn new(offset: FixedOffset, today: NaiveDate) -> Self {
        ReportCalendar { offset, today }
    }

    /// UTC calendar with an explicit "today".
    pub fn utc(today: NaiveDate) -> Self {
        ReportCalendar::new(Self::utc_offset(), today)
    }

    /// Calendar for the current wall-clock date at the given offset.
    pub fn now(offset: FixedOffset) -> Self {
        let today = Utc::now().with_timezone(&offset).date_naive();
        ReportCalendar { offset, today }
    }

    /// Zero offset.
    pub fn utc_offset() -> FixedOffset {
        Utc.fix()
    }

    #[inline]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[inline]
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// The month containing "today".
    pub fn current_month(&self) -> SalesMonth {
        SalesMonth::of(self.today)
    }

    /// The local calendar date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The instant local midnight of `date` begins.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::default());
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// The last millisecond of `date` (inclusive window bound).
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
    }

    /// Start of "today".
    pub fn start_of_today(&self) -> DateTime<Utc> {
        self.start_of_day(self.today)
    }

    /// Inclusive UTC bounds of a single day.
    pub fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_of_day(date), self.end_of_day(date))
    }

    /// Inclusive UTC bounds of a month.
    pub fn month_window(&self, month: SalesMonth) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start_of_day(month.first_day()),
            self.end_of_day(month.last_day()),
        )
    }

    /// Inclusive UTC bounds of a year.
    pub fn year_window(&self, year: i32) -> (DateTime<Utc>, DateTime<Utc>) {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default();
        let last = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or_default();
        (self.start_of_day(first), self.end_of_day(last))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!("Delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!("Canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert_eq!("OutForDelivery".parse::<OrderStatus>().unwrap(), OrderStatus::Unknown);
    }

    #[test]
    fn test_status_serde_unknown() {
        let status: OrderStatus = serde_json::from_str("\"Refunded\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        assert_eq!(serde_json::to_string(&OrderStatus::Delivered).unwrap(), "\"Delivered\"");
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("Online".parse::<PaymentMethod>().unwrap(), PaymentMethod::Online);
        assert!("barter".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_checkout_total_from_items() {
        let date = Utc.with_ymd_and_hms(2026, 10, 3, 12, 0, 0).unwrap();
        let order = Order::checkout(
            "Juan",
            date,
            PaymentMethod::Cash,
            vec![OrderItem::new("Adobo", 15000, 2), OrderItem::new("Rice", 2500, 3)],
        );
        assert_eq!(order.total_cents, 37500);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.is_delivered());
        assert!(order.with_status(OrderStatus::Delivered).is_delivered());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(SalesMonth::new(2026, 1).unwrap().days_in_month(), 31);
        assert_eq!(SalesMonth::new(2026, 4).unwrap().days_in_month(), 30);
        assert_eq!(SalesMonth::new(2026, 2).unwrap().days_in_month(), 28);
        assert_eq!(SalesMonth::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(SalesMonth::new(2024, 2).unwrap().days().count(), 29);
    }

    #[test]
    fn test_month_validation_and_parse() {
        assert!(SalesMonth::new(2026, 0).is_err());
        assert!(SalesMonth::new(2026, 13).is_err());

        let month: SalesMonth = "2026-09".parse().unwrap();
        assert_eq!(month.key(), "2026-09");
        assert_eq!(month.next().key(), "2026-10");
        assert_eq!(SalesMonth::new(2026, 12).unwrap().next().key(), "2027-01");
        assert!("2026/09".parse::<SalesMonth>().is_err());
        assert!("2026-14".parse::<SalesMonth>().is_err());
    }

    #[test]
    fn test_month_deserialize_is_validated() {
        let month: SalesMonth = serde_json::from_str(r#"{"year":2026,"month":10}"#).unwrap();
        assert_eq!(month, SalesMonth::new(2026, 10).unwrap());
        assert_eq!(
            serde_json::to_string(&month).unwrap(),
            r#"{"year":2026,"month":10}"#
        );

        assert!(serde_json::from_str::<SalesMonth>(r#"{"year":2026,"month":13}"#).is_err());
        assert!(serde_json::from_str::<SalesMonth>(r#"{"year":0,"month":1}"#).is_err());
    }

    #[test]
    fn test_calendar_local_date_with_offset() {
        // UTC+8: 2026-10-01 20:00 UTC is already Oct 2 locally
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let cal = ReportCalendar::new(offset, NaiveDate::from_ymd_opt(2026, 10, 2).unwrap());
        let instant = Utc.with_ymd_and_hms(2026, 10, 1, 20, 0, 0).unwrap();
        assert_eq!(cal.local_date(instant), NaiveDate::from_ymd_opt(2026, 10, 2).unwrap());

        // Local midnight Oct 2 is 16:00 UTC Oct 1
        assert_eq!(
            cal.start_of_today(),
            Utc.with_ymd_and_hms(2026, 10, 1, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_month_window_is_inclusive() {
        let cal = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 9, 15).unwrap());
        let (start, end) = cal.month_window(SalesMonth::new(2026, 9).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2026, 9, 30, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
        assert_eq!(cal.current_month(), SalesMonth::new(2026, 9).unwrap());
    }
}
