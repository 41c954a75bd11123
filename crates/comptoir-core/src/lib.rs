//! # comptoir-core: Pure Business Logic for Comptoir
//!
//! Money arithmetic, cart pricing and report math with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web layer (out of this workspace)                  │   │
//! │  │    article search ──► cart ──► checkout ──► reports            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          comptoir-db (engines, repositories, SQLite)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ comptoir-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  money   │ │ checkout │ │  report  │          │   │
//! │  │   │ Article  │ │  Money   │ │ CartLine │ │ Period   │          │   │
//! │  │   │ Invoice  │ │ rounding │ │ totals   │ │ Trend    │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Article, Client, Invoice, ...)
//! - [`money`] - Money type with integer cent arithmetic, round half up
//! - [`checkout`] - Cart validation, line pricing, invoice totals
//! - [`report`] - Periods, windows, trends, report payload
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use comptoir_core::money::Money;
//! use comptoir_core::types::TaxRate;
//!
//! let excl = Money::from_cents(1000); // 10.00
//! let incl = excl.apply_tax_rate(TaxRate::from_thousandths(55)); // 5.5%
//! assert_eq!(incl.cents(), 1055);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{CartLine, CheckoutReceipt, CheckoutRequest, InvoiceTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use report::{Period, ReportPayload, ReportRange, ReportWindow, Trend};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name of the standing client that receives anonymous sales.
pub const WALK_IN_CLIENT_NAME: &str = "Walk-in customer";

/// Default number of results of a catalog search.
pub const SEARCH_RESULT_LIMIT: i64 = 10;

/// Highest unit price a catalog article may carry, in cents (10 000 000.00).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Highest stock level a catalog article may carry.
///
/// Together with [`MAX_PRICE_CENTS`] keeps `price × stock` inside an SQLite
/// integer for every article.
pub const MAX_STOCK: i64 = 1_000_000_000;

/// Allowed gap between a stored tax-inclusive price and the one derived
/// from the tax-exclusive price and rate.
pub const PRICE_COHERENCE_TOLERANCE_CENTS: i64 = 1;

/// Number of recent sold lines in a report.
pub const RECENT_SALES_LIMIT: i64 = 2;

/// Number of out-of-stock names listed in the inventory snapshot.
pub const OUT_OF_STOCK_NAMES_LIMIT: i64 = 3;
