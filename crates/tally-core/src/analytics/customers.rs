//! # Customer Frequency
//!
//! Segments customers by how often they order and flags loyal customers.
//!
//! ## Passes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Customer Frequency Passes                           │
//! │                                                                         │
//! │  1. Group ALL orders (any status) by trimmed recipient                  │
//! │     └── order_count, earliest local order date                          │
//! │                                                                         │
//! │  2. Classify each recipient                                             │
//! │     ├── 1      → OneTime     (counted as "new")                         │
//! │     ├── 2..=10 → TwoToTen    (counted as "returning")                   │
//! │     ├── 11+    → ElevenPlus  (counted as "returning")                   │
//! │     └── tally under the month of the FIRST order                        │
//! │                                                                         │
//! │  3. Current month only: recipients with >= 5 orders are loyal           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! A customer is the recipient name as typed at checkout. Two people with the
//! same name are one customer here, and "Juan" / "juan" are two. Segmentation
//! counts orders, not spend: one very large order is still `OneTime`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::types::{Order, ReportCalendar, SalesMonth};
use crate::validation::{validate_recipient, well_formed};
use crate::{LOYAL_ORDER_THRESHOLD, TWO_TO_TEN_MAX};

// =============================================================================
// Types
// =============================================================================

/// Order-count segment of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum CustomerSegment {
    /// Exactly one order.
    OneTime,
    /// 2 to 10 orders.
    TwoToTen,
    /// More than 10 orders.
    ElevenPlus,
}

impl CustomerSegment {
    /// Segment for an order count (callers never pass zero).
    pub fn of(order_count: u32) -> Self {
        match order_count {
            0 | 1 => CustomerSegment::OneTime,
            n if n <= TWO_TO_TEN_MAX => CustomerSegment::TwoToTen,
            _ => CustomerSegment::ElevenPlus,
        }
    }

    /// Returns true for customers who came back at least once.
    pub fn is_returning(&self) -> bool {
        !matches!(self, CustomerSegment::OneTime)
    }
}

/// How many customers fall in each segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SegmentCounts {
    pub one_time: u32,
    pub two_to_ten: u32,
    pub eleven_plus: u32,
}

impl SegmentCounts {
    fn add(&mut self, segment: CustomerSegment) {
        match segment {
            CustomerSegment::OneTime => self.one_time += 1,
            CustomerSegment::TwoToTen => self.two_to_ten += 1,
            CustomerSegment::ElevenPlus => self.eleven_plus += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.one_time + self.two_to_ten + self.eleven_plus
    }
}

/// Customers attributed to the month of their first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyCustomerTally {
    pub month: SalesMonth,
    pub total: u32,
    pub new: u32,
    pub returning: u32,
}

/// One customer's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerStats {
    pub recipient: String,
    pub order_count: u32,
    #[ts(as = "String")]
    pub first_order_date: NaiveDate,
    pub segment: CustomerSegment,
}

/// A customer with at least `LOYAL_ORDER_THRESHOLD` orders this month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyalCustomer {
    pub recipient: String,
    /// Orders in the current month.
    pub order_count: u32,
}

/// Result of `compute_customer_frequency`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerFrequency {
    /// Customers with exactly one order.
    pub new_customers: u32,
    /// Customers with more than one order.
    pub returning_customers: u32,
    pub segments: SegmentCounts,
    /// Ascending by month.
    pub monthly: Vec<MonthlyCustomerTally>,
    /// Ascending by recipient name.
    pub customers: Vec<CustomerStats>,
    /// Count desc, then name asc.
    pub loyal_customers: Vec<LoyalCustomer>,
}

// =============================================================================
// Computation
// =============================================================================

struct History {
    order_count: u32,
    first_order_date: NaiveDate,
}

/// Segments every recipient in the batch and detects this month's loyal
/// customers.
///
/// Status is NOT filtered: a cancelled order still shows the customer came
/// back. Orders with a blank recipient are ignored.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::analytics::compute_customer_frequency;
/// use tally_core::ReportCalendar;
///
/// let calendar = ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
/// let freq = compute_customer_frequency(&[], &calendar);
/// assert_eq!(freq.new_customers + freq.returning_customers, 0);
/// ```
pub fn compute_customer_frequency(orders: &[Order], calendar: &ReportCalendar) -> CustomerFrequency {
    let current_month = calendar.current_month();

    // Pass 1 (and the current-month counts for pass 3)
    let mut histories: BTreeMap<&str, History> = BTreeMap::new();
    let mut this_month: BTreeMap<&str, u32> = BTreeMap::new();

    for valid in well_formed(orders) {
        let recipient = match validate_recipient(&valid.order.recipient) {
            Ok(name) => name,
            Err(_) => {
                debug!(order_id = %valid.order.id, "Ignoring order without recipient");
                continue;
            }
        };
        let local = calendar.local_date(valid.date);

        histories
            .entry(recipient)
            .and_modify(|h| {
                h.order_count += 1;
                h.first_order_date = h.first_order_date.min(local);
            })
            .or_insert(History {
                order_count: 1,
                first_order_date: local,
            });

        if current_month.contains(local) {
            *this_month.entry(recipient).or_insert(0) += 1;
        }
    }

    // Pass 2
    let mut freq = CustomerFrequency::default();
    let mut monthly: BTreeMap<SalesMonth, MonthlyCustomerTally> = BTreeMap::new();

    for (recipient, history) in &histories {
        let segment = CustomerSegment::of(history.order_count);
        freq.segments.add(segment);

        let month = SalesMonth::of(history.first_order_date);
        let tally = monthly.entry(month).or_insert(MonthlyCustomerTally {
            month,
            total: 0,
            new: 0,
            returning: 0,
        });
        tally.total += 1;

        if segment.is_returning() {
            freq.returning_customers += 1;
            tally.returning += 1;
        } else {
            freq.new_customers += 1;
            tally.new += 1;
        }

        freq.customers.push(CustomerStats {
            recipient: recipient.to_string(),
            order_count: history.order_count,
            first_order_date: history.first_order_date,
            segment,
        });
    }
    freq.monthly = monthly.into_values().collect();

    // Pass 3
    let mut loyal: Vec<LoyalCustomer> = this_month
        .into_iter()
        .filter(|(_, count)| *count >= LOYAL_ORDER_THRESHOLD)
        .map(|(recipient, order_count)| LoyalCustomer {
            recipient: recipient.to_string(),
            order_count,
        })
        .collect();
    loyal.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.recipient.cmp(&b.recipient))
    });
    freq.loyal_customers = loyal;

    debug!(
        customers = histories.len(),
        loyal = freq.loyal_customers.len(),
        month = %current_month,
        "Computed customer frequency"
    );

    freq
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::order;
    use crate::types::OrderStatus;

    fn calendar() -> ReportCalendar {
        ReportCalendar::utc(NaiveDate::from_ymd_opt(2026, 10, 25).unwrap())
    }

    fn repeat(recipient: &str, day: (i32, u32, u32), n: usize, prefix: &str) -> Vec<Order> {
        (0..n)
            .map(|i| order(&format!("{}{}", prefix, i), recipient, OrderStatus::Delivered, day, 100))
            .collect()
    }

    #[test]
    fn test_juan_is_two_to_ten_and_loyal() {
        let mut orders = repeat("Juan", (2026, 10, 2), 5, "j");
        orders.extend(repeat("Juan", (2026, 10, 20), 1, "k"));

        let freq = compute_customer_frequency(&orders, &calendar());

        assert_eq!(freq.customers.len(), 1);
        assert_eq!(freq.customers[0].order_count, 6);
        assert_eq!(freq.customers[0].segment, CustomerSegment::TwoToTen);
        assert_eq!(freq.segments.two_to_ten, 1);
        assert_eq!(freq.segments.eleven_plus, 0);
        assert_eq!(
            freq.loyal_customers,
            vec![LoyalCustomer {
                recipient: "Juan".to_string(),
                order_count: 6
            }]
        );
    }

    #[test]
    fn test_segments_partition_customers() {
        let mut orders = repeat("Ana", (2026, 8, 1), 1, "a");
        orders.extend(repeat("Ben", (2026, 8, 2), 2, "b"));
        orders.extend(repeat("Cy", (2026, 9, 3), 10, "c"));
        orders.extend(repeat("Dee", (2026, 9, 4), 11, "d"));

        let freq = compute_customer_frequency(&orders, &calendar());

        assert_eq!(freq.segments.one_time, 1);
        assert_eq!(freq.segments.two_to_ten, 2);
        assert_eq!(freq.segments.eleven_plus, 1);
        assert_eq!(freq.segments.total(), freq.customers.len() as u32);
        assert_eq!(freq.new_customers + freq.returning_customers, 4);
        assert_eq!(freq.new_customers, 1);
    }

    #[test]
    fn test_history_attributed_to_first_order_month() {
        let mut orders = repeat("Ana", (2026, 10, 5), 2, "a");
        orders.push(order("early", "Ana", OrderStatus::Cancelled, (2026, 7, 30), 100));
        orders.extend(repeat("Ben", (2026, 10, 6), 1, "b"));

        let freq = compute_customer_frequency(&orders, &calendar());

        assert_eq!(freq.monthly.len(), 2);
        assert_eq!(freq.monthly[0].month, SalesMonth::new(2026, 7).unwrap());
        assert_eq!(freq.monthly[0].total, 1);
        assert_eq!(freq.monthly[0].returning, 1);
        assert_eq!(freq.monthly[1].month, SalesMonth::new(2026, 10).unwrap());
        assert_eq!(freq.monthly[1].new, 1);

        let ana = &freq.customers[0];
        assert_eq!(ana.first_order_date, NaiveDate::from_ymd_opt(2026, 7, 30).unwrap());
    }

    #[test]
    fn test_status_is_not_filtered() {
        let orders = vec![
            order("1", "Ana", OrderStatus::Pending, (2026, 10, 1), 100),
            order("2", "Ana", OrderStatus::Cancelled, (2026, 10, 2), 100),
        ];
        let freq = compute_customer_frequency(&orders, &calendar());
        assert_eq!(freq.returning_customers, 1);
    }

    #[test]
    fn test_loyalty_counts_current_month_only() {
        let mut orders = repeat("Ana", (2026, 9, 10), 8, "old");
        orders.extend(repeat("Ana", (2026, 10, 1), 4, "new"));
        orders.extend(repeat("Ben", (2026, 10, 3), 5, "b"));
        orders.extend(repeat("Cy", (2026, 10, 3), 5, "c"));
        orders.extend(repeat("Dee", (2026, 10, 4), 7, "d"));

        let freq = compute_customer_frequency(&orders, &calendar());
        let loyal: Vec<(&str, u32)> = freq
            .loyal_customers
            .iter()
            .map(|l| (l.recipient.as_str(), l.order_count))
            .collect();

        assert_eq!(loyal, vec![("Dee", 7), ("Ben", 5), ("Cy", 5)]);
        // Ana has 12 orders overall but only 4 this month
        assert_eq!(freq.customers[0].segment, CustomerSegment::ElevenPlus);
    }

    #[test]
    fn test_blank_and_padded_recipients() {
        let orders = vec![
            order("1", "  ", OrderStatus::Delivered, (2026, 10, 1), 100),
            order("2", "Juan ", OrderStatus::Delivered, (2026, 10, 1), 100),
            order("3", " Juan", OrderStatus::Delivered, (2026, 10, 2), 100),
        ];
        let freq = compute_customer_frequency(&orders, &calendar());
        assert_eq!(freq.customers.len(), 1);
        assert_eq!(freq.customers[0].recipient, "Juan");
        assert_eq!(freq.customers[0].order_count, 2);
    }
}
