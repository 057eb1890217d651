//! # Report Printer
//!
//! Prints a month's sales report (or customer report) as JSON.
//!
//! ## Usage
//! ```bash
//! # Current month from the dev database
//! cargo run -p tally-analytics --bin report
//!
//! # A specific month, customers instead of sales
//! cargo run -p tally-analytics --bin report -- --month 2026-09 --customers
//!
//! # Specify database and config
//! cargo run -p tally-analytics --bin report -- --db ./data/tally.db --config ./analytics.toml
//! ```

use std::env;
use std::path::PathBuf;

use tally_analytics::{AnalyticsConfig, AnalyticsService};
use tally_core::SalesMonth;
use tally_db::{Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut config_path: Option<PathBuf> = None;
    let mut month_arg: Option<String> = None;
    let mut customers = false;
    let mut force = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--month" | "-m" => {
                if i + 1 < args.len() {
                    month_arg = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--customers" => customers = true,
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                println!("Tally POS Report Printer");
                println!();
                println!("Usage: report [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -m, --month <YYYY-MM>  Month to report (default: current month)");
                println!("      --customers        Customer segmentation instead of sales");
                println!("  -f, --force            Ignore cached reports");
                println!("  -d, --db <PATH>        Database file path (default: ./tally_dev.db)");
                println!("  -c, --config <PATH>    Analytics config file");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = AnalyticsConfig::load(config_path)?;
    let db = Database::new(DbConfig::new(&db_path)).await?;
    let service = AnalyticsService::with_database(db.clone(), config).await;

    let month = match month_arg {
        Some(raw) => raw.parse::<SalesMonth>()?,
        None => service.calendar().current_month(),
    };
    info!(db = %db_path, %month, customers, "Building report");

    let json = if customers {
        let report = service.customer_report(month, force).await?;
        serde_json::to_string_pretty(&report)?
    } else {
        let report = service.month_report(month, force).await?;
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");

    db.close().await;
    Ok(())
}
