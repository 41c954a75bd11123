//! # Domain Types
//!
//! Core domain types shared by the checkout and reporting engines.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Article      │   │     Invoice     │   │  InvoiceLine    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id → FAC-…     │   │  invoice_id     │       │
//! │  │  barcode        │   │  totals (cents) │   │  unit price     │       │
//! │  │  prices, rate   │   │  payment method │   │  (snapshot)     │       │
//! │  │  stock          │   │  status         │   │  rate snapshot  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │  InvoiceStatus  │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  thousandths    │   │  Paid           │   │  Cash, Card,    │       │
//! │  │  55 = 5.5%      │   │  Cancelled      │   │  Cheque, ...    │       │
//! │  └─────────────────┘   │  Refunded       │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Invoice lines copy the unit prices and tax rate of the article at the time
//! of sale. Later catalog edits never change a committed invoice or the tax
//! breakdown of a past report.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{round_half_up, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate as a decimal fraction with three-decimal precision.
///
/// Stored as an integer count of thousandths: `0.055` (5.5%) is `55`,
/// `0.18` (18%) is `180`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Denominator of the stored fraction.
    pub const SCALE: i128 = 1000;

    /// Upper bound: a rate of 1.000 (100%).
    pub const MAX_THOUSANDTHS: u32 = 1000;

    /// Creates a tax rate from thousandths.
    #[inline]
    pub const fn from_thousandths(thousandths: u32) -> Self {
        TaxRate(thousandths)
    }

    /// Creates a tax rate from a decimal fraction, rounding half up to three
    /// decimals. Returns `None` for negative rates or rates above 100%.
    ///
    /// ```rust
    /// use comptoir_core::types::TaxRate;
    /// use rust_decimal::Decimal;
    ///
    /// let rate = TaxRate::from_decimal(Decimal::new(55, 3)).unwrap(); // 0.055
    /// assert_eq!(rate.thousandths(), 55);
    /// ```
    pub fn from_decimal(fraction: Decimal) -> Option<Self> {
        let thousandths = (round_half_up(fraction, 3) * Decimal::ONE_THOUSAND).to_u32()?;
        (thousandths <= Self::MAX_THOUSANDTHS).then_some(TaxRate(thousandths))
    }

    /// Returns the rate in thousandths.
    #[inline]
    pub const fn thousandths(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a decimal fraction (`0.055`).
    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 3)
    }

    /// Returns the rate as a percentage (`5.5`), for labels.
    pub fn percentage(&self) -> Decimal {
        (self.as_fraction() * Decimal::ONE_HUNDRED).normalize()
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Parses a decimal fraction such as `"0.055"` or `"0.18"`.
impl FromStr for TaxRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .ok()
            .and_then(TaxRate::from_decimal)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "tax_rate".to_string(),
                min: 0,
                max: 1,
            })
    }
}

// =============================================================================
// Article
// =============================================================================

/// A catalog article.
///
/// Mutated by catalog management (outside this workspace) and by checkout,
/// which only ever decrements `stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Article {
    /// Numeric identifier.
    pub id: i64,

    /// Barcode (EAN-13, internal code, ...). Unique.
    pub barcode: String,

    /// Display name shown to the cashier and on the invoice.
    pub name: String,

    pub description: Option<String>,

    /// Free-form category, used by the category breakdown of reports.
    pub category: Option<String>,

    /// Unit price excluding tax, in cents.
    pub price_excl_cents: i64,

    /// Unit price including tax, in cents.
    pub price_incl_cents: i64,

    /// Tax rate in thousandths (55 = 5.5%).
    pub tax_rate_thousandths: u32,

    /// Units currently in stock. Never negative.
    pub stock: i64,

    /// At or below this level (and above zero) the article is "low stock".
    pub stock_minimum: i64,

    /// Inactive articles cannot be sold or found by search.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Article {
    #[inline]
    pub fn price_excl(&self) -> Money {
        Money::from_cents(self.price_excl_cents)
    }

    #[inline]
    pub fn price_incl(&self) -> Money {
        Money::from_cents(self.price_incl_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_thousandths(self.tax_rate_thousandths)
    }

    /// Classifies the current stock against the minimum threshold.
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.stock, self.stock_minimum)
    }
}

/// Input for inserting a new catalog article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub barcode: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_excl: Money,
    pub price_incl: Money,
    pub tax_rate: TaxRate,
    pub stock: i64,
    pub stock_minimum: i64,
    pub is_active: bool,
}

impl NewArticle {
    /// Builds an active article whose tax-inclusive price is derived from the
    /// tax-exclusive price and rate.
    pub fn priced(
        barcode: impl Into<String>,
        name: impl Into<String>,
        price_excl: Money,
        tax_rate: TaxRate,
        stock: i64,
    ) -> Self {
        NewArticle {
            barcode: barcode.into(),
            name: name.into(),
            description: None,
            category: None,
            price_excl,
            price_incl: price_excl.apply_tax_rate(tax_rate),
            tax_rate,
            stock,
            stock_minimum: 0,
            is_active: true,
        }
    }
}

/// Stock classification used by the inventory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// Stock is zero.
    OutOfStock,
    /// `0 < stock <= minimum`.
    Low,
    /// Above the minimum.
    Normal,
}

impl StockLevel {
    pub fn classify(stock: i64, minimum: i64) -> Self {
        if stock <= 0 {
            StockLevel::OutOfStock
        } else if stock <= minimum {
            StockLevel::Low
        } else {
            StockLevel::Normal
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Whether a client was registered by name or is the standing walk-in party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Registered,
    WalkIn,
}

/// The party an invoice is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub kind: ClientKind,
    /// Unique when present.
    pub email: Option<String>,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for registering a client explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an invoice was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash. The default when the caller does not say.
    #[default]
    Cash,
    Card,
    Cheque,
    BankTransfer,
    MealVoucher,
    /// Several tenders on one invoice.
    Mixed,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Cheque,
        PaymentMethod::BankTransfer,
        PaymentMethod::MealVoucher,
        PaymentMethod::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MealVoucher => "meal_voucher",
            PaymentMethod::Mixed => "mixed",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus the till's legacy codes
/// (`especes`, `carte`, `virement`, `ticket_resto`, `mixte`).
impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "especes" | "espèces" => Ok(PaymentMethod::Cash),
            "card" | "carte" => Ok(PaymentMethod::Card),
            "cheque" | "check" | "chèque" => Ok(PaymentMethod::Cheque),
            "bank_transfer" | "transfer" | "virement" => Ok(PaymentMethod::BankTransfer),
            "meal_voucher" | "ticket_resto" => Ok(PaymentMethod::MealVoucher),
            "mixed" | "mixte" => Ok(PaymentMethod::Mixed),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Lifecycle status of a committed invoice.
///
/// ```text
///            ┌──────────► Cancelled
///   Paid ────┤
///            └──────────► Refunded
/// ```
/// Both targets are terminal. Status never changes monetary totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Paid,
    Cancelled,
    Refunded,
}

impl InvoiceStatus {
    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Paid, InvoiceStatus::Cancelled)
                | (InvoiceStatus::Paid, InvoiceStatus::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// Prefix of the printed invoice number.
pub const INVOICE_NUMBER_PREFIX: &str = "FAC-";

/// Formats the printed invoice number: `42` → `FAC-00000042`.
///
/// ```rust
/// use comptoir_core::types::invoice_number;
///
/// assert_eq!(invoice_number(7), "FAC-00000007");
/// ```
pub fn invoice_number(invoice_id: i64) -> String {
    format!("{}{:08}", INVOICE_NUMBER_PREFIX, invoice_id)
}

/// A committed invoice. Totals are frozen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub total_excl_cents: i64,
    pub total_tax_cents: i64,
    pub total_incl_cents: i64,
    pub payment_method: PaymentMethod,
    /// Derived from the event log; `Paid` until a transition is recorded.
    pub status: InvoiceStatus,
    pub client_id: i64,
    /// Operator who ran the checkout, when known.
    pub cashier_id: Option<i64>,
}

impl Invoice {
    /// Printed invoice number (`FAC-00000042`).
    pub fn number(&self) -> String {
        invoice_number(self.id)
    }

    pub fn total_excl(&self) -> Money {
        Money::from_cents(self.total_excl_cents)
    }

    pub fn total_tax(&self) -> Money {
        Money::from_cents(self.total_tax_cents)
    }

    pub fn total_incl(&self) -> Money {
        Money::from_cents(self.total_incl_cents)
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// One article's contribution to an invoice.
/// Uses the snapshot pattern: prices and rate are frozen at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: i64,
    pub invoice_id: i64,
    pub article_id: i64,
    /// Position of the line in the submitted cart (0-based).
    pub position: i64,
    pub quantity: i64,
    /// Unit price including tax at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit price excluding tax at time of sale (frozen).
    pub unit_price_excl_cents: i64,
    /// Tax rate at time of sale (frozen), used by the tax breakdown.
    pub tax_rate_thousandths: u32,
    pub discount_cents: i64,
    pub line_excl_cents: i64,
    pub line_tax_cents: i64,
    /// `unit_price × quantity − discount`.
    pub line_total_cents: i64,
}

impl InvoiceLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_thousandths(self.tax_rate_thousandths)
    }
}

// =============================================================================
// Invoice Event
// =============================================================================

/// An append-only status transition recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceEvent {
    /// UUID v4.
    pub id: String,
    pub invoice_id: i64,
    pub from_status: InvoiceStatus,
    pub to_status: InvoiceStatus,
    pub reason: Option<String>,
    pub operator_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_decimal() {
        assert_eq!(TaxRate::from_decimal(Decimal::new(55, 3)).unwrap().thousandths(), 55);
        assert_eq!(TaxRate::from_decimal(Decimal::new(18, 2)).unwrap().thousandths(), 180);
        // 0.0555 → 0.056 (half up at the third decimal)
        assert_eq!(TaxRate::from_decimal(Decimal::new(555, 4)).unwrap().thousandths(), 56);
        assert!(TaxRate::from_decimal(Decimal::new(-1, 2)).is_none());
        assert!(TaxRate::from_decimal(Decimal::new(1001, 3)).is_none());
    }

    #[test]
    fn test_tax_rate_parse_and_percentage() {
        let rate: TaxRate = "0.055".parse().unwrap();
        assert_eq!(rate.percentage(), Decimal::new(55, 1));
        assert_eq!(rate.as_fraction(), Decimal::new(55, 3));
        assert!("abc".parse::<TaxRate>().is_err());
    }

    #[test]
    fn test_stock_level() {
        assert_eq!(StockLevel::classify(0, 5), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(5, 5), StockLevel::Low);
        assert_eq!(StockLevel::classify(6, 5), StockLevel::Normal);
        assert_eq!(StockLevel::classify(1, 0), StockLevel::Normal);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("especes".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("CARD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(
            "ticket_resto".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::MealVoucher
        );
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "bank_transfer");
    }

    #[test]
    fn test_status_transitions() {
        assert!(InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Cancelled));
        assert!(InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Refunded));
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Paid));
        assert!(!InvoiceStatus::Cancelled.can_transition_to(InvoiceStatus::Refunded));
        assert!(!InvoiceStatus::Refunded.can_transition_to(InvoiceStatus::Paid));
    }

    #[test]
    fn test_invoice_number() {
        assert_eq!(invoice_number(42), "FAC-00000042");
        assert_eq!(invoice_number(7), "FAC-00000007");
        assert_eq!(invoice_number(123456789), "FAC-123456789");
    }

    #[test]
    fn test_new_article_priced() {
        let article = NewArticle::priced("A-1", "Riz", Money::from_cents(1000), TaxRate::from_thousandths(100), 10);
        assert_eq!(article.price_incl.cents(), 1100);
        assert!(article.is_active);
    }
}
