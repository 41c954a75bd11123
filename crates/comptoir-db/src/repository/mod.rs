//! # Repository Module
//!
//! Database repositories for Comptoir.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Repositories                                    │
//! │                                                                         │
//! │  ArticleRepository     search, get_by_id/barcode, insert, low_stock    │
//! │                        lock_for_update, decrement_stock (in a tx)      │
//! │                                                                         │
//! │  ClientRepository      create, get_by_id                               │
//! │                        find_or_create_by_name, walk_in (in a tx)       │
//! │                                                                         │
//! │  InvoiceRepository     get_by_id/number, get_lines, list_*, events     │
//! │                        cancel, refund                                  │
//! │                        insert_invoice, insert_line (crate-private)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods on `&self` run on the pool. Associated functions taking a
//! `&mut SqliteConnection` run on the caller's transaction.

pub mod article;
pub mod client;
pub mod invoice;
