//! # Seed Data Generator
//!
//! Populates the database with demo orders for development.
//!
//! ## Usage
//! ```bash
//! # 60 days of orders ending today (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom span
//! cargo run -p tally-db --bin seed -- --days 120
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Orders
//! - 4-12 orders per day, placed between 10:00 and 21:00 UTC
//! - ~85% Delivered, the rest Cancelled / Pending / Preparing
//! - A handful of regulars so loyalty and segmentation have something to show
//! - Cash or Online payment, 1-4 lines from a small menu

use chrono::{Duration, TimeZone, Utc};
use std::env;
use tally_core::{Order, OrderItem, OrderStatus, PaymentMethod};
use tally_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Menu items as (title, unit price in cents).
const MENU: &[(&str, i64)] = &[
    ("Chicken Adobo", 18500),
    ("Pork Sinigang", 21000),
    ("Beef Tapa", 19500),
    ("Pancit Canton", 15000),
    ("Garlic Rice", 4500),
    ("Lumpia (6 pcs)", 9000),
    ("Halo-Halo", 12000),
    ("Iced Tea", 6000),
    ("Mango Shake", 9500),
    ("Leche Flan", 8000),
];

/// Regulars who order often; everyone else is a walk-in name.
const REGULARS: &[&str] = &["Juan Dela Cruz", "Maria Santos", "Jose Rizal", "Ana Reyes"];

const WALK_INS: &[&str] = &[
    "Carlo", "Bea", "Miguel", "Liza", "Paolo", "Grace", "Ramon", "Tess", "Nico", "Joy",
    "Andres", "Celia", "Dante", "Elena", "Felix", "Gina",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut days: i64 = 60;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --days <N>     Days of history ending today (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, days, "Seeding demo orders");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.orders().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has orders, skipping seed");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for offset in (0..days.max(1)).rev() {
        let date = today - Duration::days(offset);
        let day_seed = (offset as usize) * 31;
        let per_day = 4 + day_seed % 9;

        for n in 0..per_day {
            let seed = day_seed + n * 7;
            let order = generate_order(date, seed);

            if let Err(e) = db.orders().insert(&order).await {
                warn!(order_id = %order.id, error = %e, "Failed to insert order");
                continue;
            }
            generated += 1;
        }
    }

    info!(
        generated,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Generates a single order with deterministic pseudo-random content.
fn generate_order(date: chrono::NaiveDate, seed: usize) -> Order {
    let hour = 10 + (seed % 12) as u32;
    let minute = ((seed * 13) % 60) as u32;
    let placed_at = date
        .and_hms_opt(hour, minute, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now);

    let recipient = if seed % 3 == 0 {
        REGULARS[seed % REGULARS.len()]
    } else {
        WALK_INS[(seed * 5) % WALK_INS.len()]
    };

    let payment = if seed % 4 == 0 {
        PaymentMethod::Online
    } else {
        PaymentMethod::Cash
    };

    let lines = 1 + seed % 4;
    let items: Vec<OrderItem> = (0..lines)
        .map(|l| {
            let (title, price) = MENU[(seed + l * 3) % MENU.len()];
            OrderItem::new(title, price, 1 + ((seed + l) % 3) as i64)
        })
        .collect();

    let status = match seed % 20 {
        0 => OrderStatus::Cancelled,
        1 => OrderStatus::Pending,
        2 => OrderStatus::Preparing,
        _ => OrderStatus::Delivered,
    };

    Order::checkout(recipient, placed_at, payment, items).with_status(status)
}
