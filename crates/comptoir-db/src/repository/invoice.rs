//! # Invoice Repository
//!
//! The invoice store. Invoices and their lines are written once, by the
//! checkout engine, and never updated or deleted: SQLite triggers abort any
//! UPDATE or DELETE, and the insert functions are crate-private.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  1. CHECKOUT (CheckoutEngine, one transaction)                         │
//! │     └── insert_invoice() + insert_line() × n → status: paid            │
//! │                                                                         │
//! │  2. (OPTIONAL) ONE TRANSITION                                          │
//! │     ├── cancel() → invoice_events row: paid → cancelled                │
//! │     └── refund() → invoice_events row: paid → refunded                 │
//! │                                                                         │
//! │  Current status = latest event's to_status, or paid without events.    │
//! │  Transitions never touch totals, lines or stock.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use comptoir_core::checkout::{InvoiceTotals, PricedLine};
use comptoir_core::{
    CoreError, Invoice, InvoiceEvent, InvoiceLine, InvoiceStatus, PaymentMethod,
    INVOICE_NUMBER_PREFIX,
};

/// Columns of the `invoices_current` view, in [`Invoice`] field order.
pub(crate) const INVOICE_COLUMNS: &str = "id, created_at, total_excl_cents, total_tax_cents, \
     total_incl_cents, payment_method, status, client_id, cashier_id";

const LINE_COLUMNS: &str = "id, invoice_id, article_id, position, quantity, unit_price_cents, \
     unit_price_excl_cents, tax_rate_thousandths, discount_cents, line_excl_cents, \
     line_tax_cents, line_total_cents";

const EVENT_COLUMNS: &str =
    "id, invoice_id, from_status, to_status, reason, operator_id, created_at";

/// Repository for invoices, their lines and status events.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice with its current status.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices_current WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Gets an invoice by its printed number (`FAC-00000042`).
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let id = number
            .trim()
            .strip_prefix(INVOICE_NUMBER_PREFIX)
            .and_then(|digits| digits.parse::<i64>().ok());

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Lines of an invoice, in cart order.
    pub async fn get_lines(&self, invoice_id: i64) -> DbResult<Vec<InvoiceLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = ?1 ORDER BY position"
        );
        let lines = sqlx::query_as::<_, InvoiceLine>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    /// Invoices of a client, newest first.
    pub async fn list_by_client(&self, client_id: i64) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices_current \
             WHERE client_id = ?1 ORDER BY created_at DESC, id DESC"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(invoices)
    }

    /// Invoices created in `[start, end)`, any status, oldest first.
    pub async fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices_current \
             WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at, id"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(invoices)
    }

    /// Status events of an invoice, oldest first.
    pub async fn events(&self, invoice_id: i64) -> DbResult<Vec<InvoiceEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM invoice_events \
             WHERE invoice_id = ?1 ORDER BY created_at, id"
        );
        let events = sqlx::query_as::<_, InvoiceEvent>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    /// Current status of an invoice, `None` if it doesn't exist.
    pub async fn status(&self, invoice_id: i64) -> DbResult<Option<InvoiceStatus>> {
        let status = sqlx::query_scalar::<_, InvoiceStatus>(
            "SELECT status FROM invoices_current WHERE id = ?1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    /// Cancels a paid invoice. Stock is not restored.
    pub async fn cancel(
        &self,
        invoice_id: i64,
        reason: Option<&str>,
        operator_id: Option<i64>,
    ) -> DbResult<InvoiceEvent> {
        self.transition(invoice_id, InvoiceStatus::Cancelled, reason, operator_id)
            .await
    }

    /// Marks a paid invoice as refunded. Stock is not restored.
    pub async fn refund(
        &self,
        invoice_id: i64,
        reason: Option<&str>,
        operator_id: Option<i64>,
    ) -> DbResult<InvoiceEvent> {
        self.transition(invoice_id, InvoiceStatus::Refunded, reason, operator_id)
            .await
    }

    /// Records `paid → to` as a single guarded insert.
    ///
    /// The `NOT EXISTS` guard and the insert run as one statement, so two
    /// concurrent transitions cannot both succeed.
    async fn transition(
        &self,
        invoice_id: i64,
        to: InvoiceStatus,
        reason: Option<&str>,
        operator_id: Option<i64>,
    ) -> DbResult<InvoiceEvent> {
        let event = InvoiceEvent {
            id: Uuid::new_v4().to_string(),
            invoice_id,
            from_status: InvoiceStatus::Paid,
            to_status: to,
            reason: reason.map(str::trim).filter(|r| !r.is_empty()).map(String::from),
            operator_id,
            created_at: Utc::now(),
        };

        let recorded = InvoiceStatus::Paid.can_transition_to(to)
            && sqlx::query(
                "INSERT INTO invoice_events \
                     (id, invoice_id, from_status, to_status, reason, operator_id, created_at) \
                 SELECT ?1, i.id, ?3, ?4, ?5, ?6, ?7 FROM invoices i \
                 WHERE i.id = ?2 \
                   AND NOT EXISTS (SELECT 1 FROM invoice_events e WHERE e.invoice_id = i.id)",
            )
            .bind(&event.id)
            .bind(invoice_id)
            .bind(event.from_status)
            .bind(event.to_status)
            .bind(&event.reason)
            .bind(event.operator_id)
            .bind(event.created_at)
            .execute(&self.pool)
            .await?
            .rows_affected()
                == 1;

        if recorded {
            info!(invoice_id, to = %to, "Invoice status changed");
            return Ok(event);
        }

        let current = self
            .status(invoice_id)
            .await?
            .ok_or(CoreError::InvoiceNotFound(invoice_id))?;

        warn!(invoice_id, from = %current, to = %to, "Rejected invoice status change");
        Err(CoreError::InvalidStatusTransition {
            invoice_id,
            from: current,
            to,
        }
        .into())
    }
}

// =============================================================================
// Checkout write surface
// =============================================================================

/// Inserts the invoice header on the checkout transaction. Returns its id.
pub(crate) async fn insert_invoice(
    conn: &mut SqliteConnection,
    created_at: DateTime<Utc>,
    totals: &InvoiceTotals,
    payment_method: PaymentMethod,
    client_id: i64,
    cashier_id: Option<i64>,
) -> DbResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO invoices ( \
             created_at, total_excl_cents, total_tax_cents, total_incl_cents, \
             payment_method, client_id, cashier_id \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         RETURNING id",
    )
    .bind(created_at)
    .bind(totals.total_excl.cents())
    .bind(totals.total_tax.cents())
    .bind(totals.total_incl.cents())
    .bind(payment_method)
    .bind(client_id)
    .bind(cashier_id)
    .fetch_one(&mut *conn)
    .await?;

    debug!(invoice_id = id, "Invoice header inserted");
    Ok(id)
}

/// Inserts one priced line on the checkout transaction.
pub(crate) async fn insert_line(
    conn: &mut SqliteConnection,
    invoice_id: i64,
    line: &PricedLine,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO invoice_lines ( \
             invoice_id, article_id, position, quantity, \
             unit_price_cents, unit_price_excl_cents, tax_rate_thousandths, \
             discount_cents, line_excl_cents, line_tax_cents, line_total_cents \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(invoice_id)
    .bind(line.article_id)
    .bind(line.position as i64)
    .bind(line.quantity)
    .bind(line.unit_price_incl.cents())
    .bind(line.unit_price_excl.cents())
    .bind(line.tax_rate.thousandths())
    .bind(line.discount.cents())
    .bind(line.line_excl.cents())
    .bind(line.line_tax.cents())
    .bind(line.line_total.cents())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use comptoir_core::{CartLine, CheckoutRequest, Money, NewArticle, TaxRate};

    async fn db_with_invoice() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let article = db
            .articles()
            .insert(&NewArticle::priced(
                "INV-1",
                "Bissap 1L",
                Money::from_cents(1000),
                TaxRate::from_thousandths(100),
                10,
            ))
            .await
            .unwrap();
        let receipt = db
            .checkout()
            .checkout(&CheckoutRequest::new(vec![CartLine::new(article.id, 2)]).client("Fatou"))
            .await
            .unwrap();
        (db, receipt.invoice_id)
    }

    #[tokio::test]
    async fn test_reads() {
        let (db, id) = db_with_invoice().await;
        let store = db.invoices();

        let invoice = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.total_incl_cents, 2200);
        assert_eq!(invoice.payment_method, PaymentMethod::Cash);
        assert_eq!(store.get_by_number(&invoice.number()).await.unwrap(), Some(invoice.clone()));
        assert_eq!(store.get_by_number("FAC-x").await.unwrap(), None);

        let lines = store.get_lines(id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_price_cents, 1100);
        assert_eq!(lines[0].line_total_cents, 2200);

        assert_eq!(store.list_by_client(invoice.client_id).await.unwrap().len(), 1);
        let window = store
            .list_in_range(invoice.created_at, invoice.created_at + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        // end is exclusive
        assert!(store
            .list_in_range(invoice.created_at - chrono::Duration::seconds(1), invoice.created_at)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cancel_then_refund_rejected() {
        let (db, id) = db_with_invoice().await;
        let store = db.invoices();

        let event = store.cancel(id, Some("erreur de caisse"), Some(3)).await.unwrap();
        assert_eq!(event.from_status, InvoiceStatus::Paid);
        assert_eq!(event.to_status, InvoiceStatus::Cancelled);
        assert_eq!(store.status(id).await.unwrap(), Some(InvoiceStatus::Cancelled));

        let err = store.refund(id, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidStatusTransition {
                from: InvoiceStatus::Cancelled,
                to: InvoiceStatus::Refunded,
                ..
            })
        ));

        let events = store.events(id).await.unwrap();
        assert_eq!(events, vec![event]);

        // totals untouched
        let invoice = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(invoice.total_incl_cents, 2200);
    }

    #[tokio::test]
    async fn test_refund_and_missing_invoice() {
        let (db, id) = db_with_invoice().await;
        let store = db.invoices();

        store.refund(id, Some("  "), None).await.unwrap();
        assert_eq!(store.status(id).await.unwrap(), Some(InvoiceStatus::Refunded));
        assert_eq!(store.events(id).await.unwrap()[0].reason, None);

        let err = store.cancel(999, None, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvoiceNotFound(999))));
    }

    #[tokio::test]
    async fn test_invoices_are_append_only() {
        let (db, id) = db_with_invoice().await;

        let err: DbError = sqlx::query("UPDATE invoices SET total_incl_cents = 0 WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::ImmutableRecord(_)));

        let err: DbError = sqlx::query("DELETE FROM invoice_lines WHERE invoice_id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::ImmutableRecord(_)));
    }
}
