//! # Product Breakdown
//!
//! Revenue and quantity per product title over `Delivered` orders.
//!
//! Products are keyed by the title each line carries at sale time. Two lines
//! with the same title fold into one aggregate even if their unit prices
//! differ; a renamed product shows up as a new entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Order;
use crate::validation::well_formed;

/// Sales of one product title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductAggregate {
    pub title: String,
    pub revenue: Money,
    pub quantity_sold: i64,
}

impl ProductAggregate {
    fn new(title: &str) -> Self {
        ProductAggregate {
            title: title.to_string(),
            revenue: Money::zero(),
            quantity_sold: 0,
        }
    }
}

/// Aggregates keyed by product title.
pub type ProductSales = BTreeMap<String, ProductAggregate>;

/// Folds every line of every delivered order into its product's aggregate.
///
/// `revenue += unit_price × quantity`, `quantity_sold += quantity`. Entries are
/// created the first time a title is seen.
pub fn compute_product_aggregates(orders: &[Order]) -> ProductSales {
    let mut products = ProductSales::new();

    for valid in well_formed(orders).filter(|o| o.order.is_delivered()) {
        for line in valid.items {
            let entry = products
                .entry(line.product_title.clone())
                .or_insert_with(|| ProductAggregate::new(&line.product_title));
            entry.revenue += line.line_total();
            entry.quantity_sold = entry.quantity_sold.saturating_add(line.quantity);
        }
    }

    products
}

/// Best sellers first: revenue desc, then quantity desc, then title asc.
pub fn rank_products(products: &ProductSales, limit: usize) -> Vec<ProductAggregate> {
    let mut ranked: Vec<ProductAggregate> = products.values().cloned().collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| b.quantity_sold.cmp(&a.quantity_sold))
            .then_with(|| a.title.cmp(&b.title))
    });
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// Unit Tests
// =============================================================================
