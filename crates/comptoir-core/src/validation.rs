//! # Validation Module
//!
//! Input validation utilities for Comptoir.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (web layer, seed tool)                                │
//! │  └── Deserialization into typed requests                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Cart lines, quantities                                            │
//! │  └── Catalog / client writes (barcode, prices, email)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (stock >= 0, totals add up)                     │
//! │  ├── UNIQUE constraints (barcode, client email)                        │
//! │  └── Triggers (invoices are append-only)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comptoir_core::validation::{validate_barcode, validate_quantity};
//!
//! validate_barcode("3017620422003").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewArticle, TaxRate};
use crate::{MAX_PRICE_CENTS, MAX_STOCK, PRICE_COHERENCE_TOLERANCE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an article barcode.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use comptoir_core::validation::validate_barcode;
///
/// assert!(validate_barcode("3017620422003").is_ok());
/// assert!(validate_barcode("").is_err());
/// assert!(validate_barcode("has space").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 64,
        });
    }

    if !barcode
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an article name.
pub fn validate_article_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name, 200)
}

/// Validates a client name.
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    validate_name("client name", name, 200)
}

fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Normalizes a catalog search query.
///
/// Returns `None` for a blank query: blank searches match nothing.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok((!query.is_empty()).then(|| query.to_string()))
}

/// Validates and normalizes (trim, lowercase) an email address.
///
/// Only the shape `local@domain.tld` is checked.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "expected local@domain".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(email)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
///
/// There is no upper bound here: available stock caps what a cart can take.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price: zero up to [`MAX_PRICE_CENTS`].
///
/// ```rust
/// use comptoir_core::money::Money;
/// use comptoir_core::validation::validate_price;
/// use comptoir_core::MAX_PRICE_CENTS;
///
/// assert!(validate_price("price", Money::from_cents(1099)).is_ok());
/// assert!(validate_price("price", Money::zero()).is_ok());
/// assert!(validate_price("price", Money::from_cents(-100)).is_err());
/// assert!(validate_price("price", Money::from_cents(MAX_PRICE_CENTS + 1)).is_err());
/// ```
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.cents() > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a tax rate: 0 to 1000 thousandths (0% to 100%).
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.thousandths() > TaxRate::MAX_THOUSANDTHS {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: TaxRate::MAX_THOUSANDTHS as i64,
        });
    }

    Ok(())
}

/// Validates a stock quantity or threshold: zero up to [`MAX_STOCK`].
pub fn validate_stock(field: &str, stock: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK).contains(&stock) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK,
        });
    }

    Ok(())
}

/// Checks `price_incl ≈ price_excl × (1 + rate)` within one cent.
///
/// ```rust
/// use comptoir_core::money::Money;
/// use comptoir_core::types::TaxRate;
/// use comptoir_core::validation::validate_price_coherence;
///
/// let rate = TaxRate::from_thousandths(100);
/// assert!(validate_price_coherence(Money::from_cents(1000), Money::from_cents(1100), rate).is_ok());
/// assert!(validate_price_coherence(Money::from_cents(1000), Money::from_cents(1200), rate).is_err());
/// ```
pub fn validate_price_coherence(
    price_excl: Money,
    price_incl: Money,
    rate: TaxRate,
) -> ValidationResult<()> {
    let expected = price_excl.apply_tax_rate(rate);
    if (price_incl - expected).cents().abs() > PRICE_COHERENCE_TOLERANCE_CENTS {
        return Err(ValidationError::Inconsistent {
            field: "price_incl".to_string(),
            reason: format!(
                "{} does not match {} at {}% (expected {})",
                price_incl,
                price_excl,
                rate.percentage(),
                expected
            ),
        });
    }

    Ok(())
}

/// Validates every field of a catalog insert.
pub fn validate_new_article(article: &NewArticle) -> ValidationResult<()> {
    validate_barcode(&article.barcode)?;
    validate_article_name(&article.name)?;
    validate_price("price_excl", article.price_excl)?;
    validate_price("price_incl", article.price_incl)?;
    // A sellable article never prices a line at zero.
    if article.price_incl.is_zero() {
        return Err(ValidationError::MustBePositive {
            field: "price_incl".to_string(),
        });
    }
    validate_tax_rate(article.tax_rate)?;
    validate_stock("stock", article.stock)?;
    validate_stock("stock_minimum", article.stock_minimum)?;
    validate_price_coherence(article.price_excl, article.price_incl, article.tax_rate)
}

// =============================================================================
// Unit Tests
// =============================================================================
