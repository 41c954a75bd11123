//! # Checkout Math
//!
//! The pure half of checkout: cart validation, per-article quantity
//! aggregation, line pricing and invoice totals. The transactional half
//! (locking, persistence, stock decrement) lives in `comptoir-db`.
//!
//! ## Pricing Flow
//! ```text
//! CartLine[] (as submitted)
//!      │
//!      ▼
//! validate_cart ──► EmptyCart / InvalidLine { position }
//!      │
//!      ▼
//! quantities_by_article ──► BTreeMap<article_id, Σ qty>   (lock order)
//!      │
//!      ▼
//! check_stock(article, Σ qty) ──► InsufficientStock
//!      │
//!      ▼
//! price_line (submission order)
//!      line_excl = price_excl × qty
//!      line_incl = price_incl × qty
//!      line_tax  = line_incl − line_excl
//!      │
//!      ▼
//! InvoiceTotals = Σ rounded line values
//! ```
//!
//! Totals are sums of already-rounded line values. Nothing is re-derived
//! from rates, so an invoice always equals the sum of its lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Article, PaymentMethod, TaxRate};
use crate::validation::validate_quantity;

// =============================================================================
// Request
// =============================================================================

/// One line of a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Missing ids are rejected as `InvalidLine`.
    pub article_id: Option<i64>,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(article_id: i64, quantity: i64) -> Self {
        CartLine {
            article_id: Some(article_id),
            quantity,
        }
    }
}

/// A checkout request as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    /// Blank or absent resolves to the walk-in client.
    pub client_name: Option<String>,
    /// Defaults to cash.
    pub payment_method: Option<PaymentMethod>,
    pub cashier_id: Option<i64>,
    pub lines: Vec<CartLine>,
}

impl CheckoutRequest {
    pub fn new(lines: Vec<CartLine>) -> Self {
        CheckoutRequest {
            lines,
            ..Default::default()
        }
    }

    pub fn client(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn cashier(mut self, cashier_id: i64) -> Self {
        self.cashier_id = Some(cashier_id);
        self
    }

    /// Payment method with the cash default applied.
    pub fn effective_payment_method(&self) -> PaymentMethod {
        self.payment_method.unwrap_or_default()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// A cart line that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedLine {
    pub position: usize,
    pub article_id: i64,
    pub quantity: i64,
}

/// Validates every line in submission order.
///
/// Fails fast on the first bad line; the error carries its 0-based position.
pub fn validate_cart(lines: &[CartLine]) -> CoreResult<Vec<ValidatedLine>> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    lines
        .iter()
        .enumerate()
        .map(|(position, line)| {
            let article_id = line.article_id.ok_or_else(|| CoreError::InvalidLine {
                position,
                reason: "article id is missing".to_string(),
            })?;

            validate_quantity(line.quantity).map_err(|e| CoreError::InvalidLine {
                position,
                reason: e.to_string(),
            })?;

            Ok(ValidatedLine {
                position,
                article_id,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Sums requested quantities per article.
///
/// The map iterates in ascending article id, which is the order locks are
/// taken in.
pub fn quantities_by_article(lines: &[ValidatedLine]) -> BTreeMap<i64, i64> {
    let mut totals = BTreeMap::new();
    for line in lines {
        let entry = totals.entry(line.article_id).or_insert(0i64);
        *entry = entry.saturating_add(line.quantity);
    }
    totals
}

/// Fails with `InsufficientStock` when `requested` exceeds the article's
/// stock.
pub fn check_stock(article: &Article, requested: i64) -> CoreResult<()> {
    if requested > article.stock {
        return Err(CoreError::InsufficientStock {
            article_name: article.name.clone(),
            available: article.stock,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Pricing
// =============================================================================

/// A priced invoice line, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub position: usize,
    pub article_id: i64,
    pub quantity: i64,
    pub unit_price_excl: Money,
    pub unit_price_incl: Money,
    pub tax_rate: TaxRate,
    pub discount: Money,
    pub line_excl: Money,
    pub line_tax: Money,
    pub line_total: Money,
}

/// Prices one line from the article as read under lock.
///
/// The catalog's two prices are trusted as read; no tax is re-derived here.
/// A line whose amount does not fit in cents is rejected as `InvalidLine`.
pub fn price_line(line: &ValidatedLine, article: &Article) -> CoreResult<PricedLine> {
    let unit_price_excl = article.price_excl();
    let unit_price_incl = article.price_incl();
    let discount = Money::zero();

    let too_large = || CoreError::InvalidLine {
        position: line.position,
        reason: format!("line amount overflows at quantity {}", line.quantity),
    };
    let line_excl = unit_price_excl
        .checked_multiply_quantity(line.quantity)
        .ok_or_else(too_large)?;
    let line_total = unit_price_incl
        .checked_multiply_quantity(line.quantity)
        .ok_or_else(too_large)?
        - discount;

    Ok(PricedLine {
        position: line.position,
        article_id: article.id,
        quantity: line.quantity,
        unit_price_excl,
        unit_price_incl,
        tax_rate: article.tax_rate(),
        discount,
        line_excl,
        line_tax: line_total - line_excl,
        line_total,
    })
}

/// Invoice totals accumulated from priced lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub total_excl: Money,
    pub total_tax: Money,
    pub total_incl: Money,
}

impl InvoiceTotals {
    /// Adds a line, rejecting it as `InvalidLine` if a total would overflow.
    pub fn add_line(&mut self, line: &PricedLine) -> CoreResult<()> {
        let overflow = || CoreError::InvalidLine {
            position: line.position,
            reason: "invoice total overflows".to_string(),
        };
        self.total_excl = self.total_excl.checked_add(line.line_excl).ok_or_else(overflow)?;
        self.total_tax = self.total_tax.checked_add(line.line_tax).ok_or_else(overflow)?;
        self.total_incl = self.total_incl.checked_add(line.line_total).ok_or_else(overflow)?;
        Ok(())
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a PricedLine>) -> CoreResult<Self> {
        let mut totals = InvoiceTotals::default();
        for line in lines {
            totals.add_line(line)?;
        }
        Ok(totals)
    }
}

/// What a successful checkout returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutReceipt {
    pub invoice_id: i64,
    /// `FAC-00000042`.
    pub invoice_number: String,
    pub totals: InvoiceTotals,
    pub line_count: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================
