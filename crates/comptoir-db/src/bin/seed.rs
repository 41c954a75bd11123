//! # Seed Data Generator
//!
//! Populates a development database with a small catalog, rings up a few
//! sales and prints the resulting day report.
//!
//! ## Usage
//! ```bash
//! # Seed ./comptoir_dev.db with the default number of sales
//! cargo run -p comptoir-db --bin seed
//!
//! # Ring up more sample sales
//! cargo run -p comptoir-db --bin seed -- --count 40
//!
//! # Specify database path
//! cargo run -p comptoir-db --bin seed -- --db ./data/comptoir.db
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;

use comptoir_core::{
    CartLine, CheckoutRequest, Money, NewArticle, PaymentMethod, ReportRange, TaxRate,
};
use comptoir_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, name, price excl. tax in cents, tax rate in thousandths, stock)
const CATALOG: &[(&str, &str, i64, u32, i64)] = &[
    ("Boulangerie", "Baguette tradition", 114, 55, 80),
    ("Boulangerie", "Croissant au beurre", 104, 55, 40),
    ("Boulangerie", "Pain de campagne", 284, 55, 15),
    ("Epicerie", "Huile d'olive 1L", 749, 55, 24),
    ("Epicerie", "Pates penne 500g", 142, 55, 60),
    ("Epicerie", "Cafe moulu 250g", 379, 55, 3),
    ("Boissons", "Eau minerale 1.5L", 62, 55, 120),
    ("Boissons", "Jus d'orange 1L", 229, 55, 30),
    ("Boissons", "Vin rouge AOC", 749, 200, 12),
    ("Droguerie", "Lessive 2L", 999, 200, 10),
    ("Droguerie", "Liquide vaisselle", 249, 200, 0),
    ("Presse", "Quotidien regional", 127, 21, 25),
];

const CLIENTS: &[Option<&str>] = &[None, Some("Awa Diallo"), None, Some("Jean Martin"), None];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 12;
    let mut db_path = String::from("./comptoir_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(12);
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
                println!("Comptoir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of sample checkouts (default: 12)");
                println!("  -d, --db <PATH>    Database file path (default: ./comptoir_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path).apply_env_overrides()).await?;
    info!(path = %db_path, "Connected, migrations applied");

    let existing = db.articles().count_active().await?;
    if existing > 0 {
        warn!(existing, "Catalog already populated, skipping seed");
        return Ok(());
    }

    let mut ids = Vec::with_capacity(CATALOG.len());
    for (index, &(category, name, excl, rate, stock)) in CATALOG.iter().enumerate() {
        let mut article = NewArticle::priced(
            format!("376{:010}", index + 1),
            name,
            Money::from_cents(excl),
            TaxRate::from_thousandths(rate),
            stock,
        );
        article.category = Some(category.to_string());
        article.stock_minimum = 5;

        match db.articles().insert(&article).await {
            Ok(inserted) => ids.push(inserted.id),
            Err(e) => warn!(barcode = %article.barcode, error = %e, "Insert failed"),
        }
    }
    info!(articles = ids.len(), "Catalog seeded");

    if ids.is_empty() {
        return Ok(());
    }

    let mut committed = 0;
    for n in 0..count {
        let lines = vec![
            CartLine::new(ids[n % ids.len()], 1 + (n % 3) as i64),
            CartLine::new(ids[(n * 7 + 3) % ids.len()], 1),
        ];
        let mut request = CheckoutRequest::new(lines)
            .payment_method(PaymentMethod::ALL[n % PaymentMethod::ALL.len()]);
        if let Some(name) = CLIENTS[n % CLIENTS.len()] {
            request = request.client(name);
        }

        match db.checkout().checkout(&request).await {
            Ok(_) => committed += 1,
            Err(e) => warn!(sale = n, error = %e, "Sample checkout rejected"),
        }
    }
    info!(committed, attempted = count, "Sample sales rung up");

    let report = db.reports().report(ReportRange::from_keyword("day")).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;
    Ok(())
}
