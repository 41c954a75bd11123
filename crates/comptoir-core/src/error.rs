//! # Error Types
//!
//! Domain-specific error types for comptoir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comptoir-core errors (this file)                                      │
//! │  ├── CoreError        - Checkout / invoice rule violations             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  comptoir-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every checkout error aborts the whole transaction. Nothing here is retried
//! automatically: the caller resubmits with corrected input.

use thiserror::Error;

use crate::types::InvoiceStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Checkout and invoice lifecycle errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The cart has no lines. Raised before the store is touched.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line is malformed (missing article id, non-positive quantity).
    /// `position` is the 0-based index of the line as submitted.
    #[error("Invalid cart line {position}: {reason}")]
    InvalidLine { position: usize, reason: String },

    /// Article is missing or inactive.
    #[error("Article not found: {0}")]
    ArticleNotFound(i64),

    /// Not enough stock to cover the requested quantity.
    ///
    /// `requested` is the total quantity asked for this article across every
    /// line of the cart.
    ///
    /// ```text
    /// Cart: Riz 5kg × 6
    ///      │
    ///      ▼
    /// Lock article: stock = 5
    ///      │
    ///      ▼
    /// InsufficientStock { article_name: "Riz 5kg", available: 5, requested: 6 }
    ///      │
    ///      ▼
    /// Transaction rolled back, no invoice
    /// ```
    #[error("Insufficient stock for {article_name}: available {available}, requested {requested}")]
    InsufficientStock {
        article_name: String,
        available: i64,
        requested: i64,
    },

    /// A unique client identifier is already taken.
    #[error("Client {field} '{value}' already exists")]
    ClientConflict { field: String, value: String },

    /// Invoice cannot be found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(i64),

    /// The invoice's current status does not allow the requested transition.
    #[error("Invoice {invoice_id} is {from}, cannot become {to}")]
    InvalidStatusTransition {
        invoice_id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed amount or email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields that must agree do not.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            article_name: "Riz 5kg".to_string(),
            available: 5,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Riz 5kg: available 5, requested 6"
        );

        let err = CoreError::InvalidLine {
            position: 2,
            reason: "quantity must be positive".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid cart line 2: quantity must be positive");
    }

    #[test]
    fn test_transition_message() {
        let err = CoreError::InvalidStatusTransition {
            invoice_id: 7,
            from: InvoiceStatus::Cancelled,
            to: InvoiceStatus::Refunded,
        };
        assert_eq!(err.to_string(), "Invoice 7 is cancelled, cannot become refunded");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
