//! # comptoir-db: Persistence and Engines for Comptoir
//!
//! SQLite storage for the catalog, clients and invoices, plus the two
//! engines built on it: checkout and reporting.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Data Flow                               │
//! │                                                                         │
//! │  Caller (web layer, seed tool)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   comptoir-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌────────────────┐  ┌─────────────────┐  │   │
//! │  │   │   Database    │  │    Engines     │  │  Repositories   │  │   │
//! │  │   │   (pool.rs)   │  │ CheckoutEngine │  │ ArticleRepo     │  │   │
//! │  │   │  SqlitePool   │─►│ ReportingEngine│─►│ ClientRepo      │  │   │
//! │  │   │  DbConfig     │  │                │  │ InvoiceRepo     │  │   │
//! │  │   └───────────────┘  └────────────────┘  └─────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   pricing, totals, windows, trends ──► comptoir-core           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) + embedded migrations                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comptoir_core::{CartLine, CheckoutRequest, ReportRange};
//! use comptoir_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//!
//! let receipt = db
//!     .checkout()
//!     .checkout(&CheckoutRequest::new(vec![CartLine::new(12, 2)]).client("Awa"))
//!     .await?;
//! println!("{}", receipt.invoice_number); // FAC-00000001
//!
//! let report = db.reports().report(ReportRange::from_keyword("month")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod reporting;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutEngine;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use reporting::ReportingEngine;

pub use repository::article::ArticleRepository;
pub use repository::client::ClientRepository;
pub use repository::invoice::InvoiceRepository;
