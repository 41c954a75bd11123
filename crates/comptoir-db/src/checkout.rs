//! # Checkout Engine
//!
//! Turns a cart into a committed invoice and the matching stock decrements,
//! all or nothing.
//!
//! ## Transaction Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           checkout(request)                             │
//! │                                                                         │
//! │  validate_cart ────────────────► EmptyCart / InvalidLine  (no I/O yet) │
//! │       │                                                                 │
//! │  BEGIN ─────────────────────────────────────────────────────────┐      │
//! │  │ for id in ascending article id:                               │      │
//! │  │     lock_for_update(id) ─────► ArticleNotFound                │      │
//! │  │     check_stock(Σ qty)  ─────► InsufficientStock              │      │
//! │  │ find_or_create client                                         │      │
//! │  │ price lines (cart order), accumulate totals                   │      │
//! │  │ INSERT invoice, INSERT lines                                  │      │
//! │  │ decrement stock once per article                              │      │
//! │  COMMIT ◄───────────────────────────────────────────────────────┘      │
//! │                                                                         │
//! │  Any error, or dropping the future before COMMIT, rolls back.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock Order
//! Articles are locked in ascending id regardless of cart order, so two
//! carts sharing articles always queue in the same order. SQLite grants the
//! write lock to one transaction at a time: the first lock taken by a
//! checkout serializes it against every other writer until it commits.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::article::ArticleRepository;
use crate::repository::client::ClientRepository;
use crate::repository::invoice::{insert_invoice, insert_line};
use comptoir_core::checkout::{
    check_stock, price_line, quantities_by_article, validate_cart, PricedLine,
};
use comptoir_core::{invoice_number, Article, CheckoutReceipt, CheckoutRequest, CoreError, InvoiceTotals};

/// Runs checkouts against the store.
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    pool: SqlitePool,
}

impl CheckoutEngine {
    /// Creates a new CheckoutEngine.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutEngine { pool }
    }

    /// Checks out a cart now.
    ///
    /// ## Returns
    /// * `Ok(CheckoutReceipt)` - invoice committed, stock decremented
    /// * `Err(DbError::Domain(..))` - `EmptyCart`, `InvalidLine`,
    ///   `ArticleNotFound`, `InsufficientStock`; nothing was written
    pub async fn checkout(&self, request: &CheckoutRequest) -> DbResult<CheckoutReceipt> {
        self.checkout_at(request, Utc::now()).await
    }

    /// Checks out a cart with an explicit invoice timestamp (imports,
    /// backdated entry).
    ///
    /// Every line is validated before any article is looked up, so a
    /// malformed line is reported even when an earlier line names an
    /// unknown article. Lookups then run in ascending article id order,
    /// not submission order.
    pub async fn checkout_at(
        &self,
        request: &CheckoutRequest,
        at: DateTime<Utc>,
    ) -> DbResult<CheckoutReceipt> {
        debug!(lines = request.lines.len(), "Checkout started");

        let lines = validate_cart(&request.lines).map_err(rejected)?;
        let quantities = quantities_by_article(&lines);

        let mut tx = self.pool.begin().await?;

        let mut articles: BTreeMap<i64, Article> = BTreeMap::new();
        for (&article_id, &requested) in &quantities {
            let article = ArticleRepository::lock_for_update(&mut tx, article_id)
                .await
                .map_err(rejected_db)?;
            check_stock(&article, requested).map_err(rejected)?;
            articles.insert(article_id, article);
        }

        let client =
            ClientRepository::find_or_create_by_name(&mut tx, request.client_name.as_deref(), at)
                .await?;

        let priced = lines
            .iter()
            .map(|line| {
                articles
                    .get(&line.article_id)
                    .ok_or(CoreError::ArticleNotFound(line.article_id))
                    .and_then(|article| price_line(line, article))
            })
            .collect::<Result<Vec<PricedLine>, CoreError>>()
            .map_err(rejected)?;
        let totals = InvoiceTotals::from_lines(&priced).map_err(rejected)?;

        let payment_method = request.effective_payment_method();
        let invoice_id = insert_invoice(
            &mut tx,
            at,
            &totals,
            payment_method,
            client.id,
            request.cashier_id,
        )
        .await?;

        for line in &priced {
            insert_line(&mut tx, invoice_id, line).await?;
        }

        for (&article_id, &quantity) in &quantities {
            ArticleRepository::decrement_stock(&mut tx, article_id, quantity).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let receipt = CheckoutReceipt {
            invoice_id,
            invoice_number: invoice_number(invoice_id),
            totals,
            line_count: priced.len(),
        };

        info!(
            invoice = %receipt.invoice_number,
            client_id = client.id,
            payment_method = %payment_method,
            lines = receipt.line_count,
            total_excl = %totals.total_excl,
            total_tax = %totals.total_tax,
            total_incl = %totals.total_incl,
            "Checkout committed"
        );

        Ok(receipt)
    }
}

fn rejected(err: CoreError) -> DbError {
    warn!(error = %err, "Checkout rejected");
    err.into()
}

fn rejected_db(err: DbError) -> DbError {
    if err.as_domain().is_some() {
        warn!(error = %err, "Checkout rejected");
    }
    err
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use comptoir_core::{CartLine, ClientKind, Money, NewArticle, PaymentMethod, TaxRate};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn article(db: &Database, barcode: &str, excl: i64, rate: u32, stock: i64) -> Article {
        db.articles()
            .insert(&NewArticle::priced(
                barcode,
                format!("Article {barcode}"),
                Money::from_cents(excl),
                TaxRate::from_thousandths(rate),
                stock,
            ))
            .await
            .unwrap()
    }

    async fn invoice_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_two_line_checkout() {
        let db = db().await;
        let a = article(&db, "A", 1000, 100, 10).await;
        let b = article(&db, "B", 500, 100, 10).await;

        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 2), CartLine::new(b.id, 1)])
            .payment_method(PaymentMethod::Card)
            .cashier(7);
        let receipt = db.checkout().checkout(&request).await.unwrap();

        assert_eq!(receipt.totals.total_excl.cents(), 2500);
        assert_eq!(receipt.totals.total_incl.cents(), 2750);
        assert_eq!(receipt.totals.total_tax.cents(), 250);
        assert_eq!(receipt.invoice_number, format!("FAC-{:08}", receipt.invoice_id));
        assert_eq!(receipt.line_count, 2);

        let invoice = db.invoices().get_by_id(receipt.invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.payment_method, PaymentMethod::Card);
        assert_eq!(invoice.cashier_id, Some(7));
        let client = db.clients().get_by_id(invoice.client_id).await.unwrap().unwrap();
        assert_eq!(client.kind, ClientKind::WalkIn);

        assert_eq!(db.articles().get_by_id(a.id).await.unwrap().unwrap().stock, 8);
        assert_eq!(db.articles().get_by_id(b.id).await.unwrap().unwrap().stock, 9);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let db = db().await;
        let err = db.checkout().checkout(&CheckoutRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_unknown_article_rolls_back() {
        let db = db().await;
        let a = article(&db, "A", 1000, 100, 10).await;

        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 1), CartLine::new(9999, 1)])
            .client("Nouveau client");
        let err = db.checkout().checkout(&request).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ArticleNotFound(9999))));

        assert_eq!(invoice_count(&db).await, 0);
        let clients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(clients, 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_summed_against_stock() {
        let db = db().await;
        let a = article(&db, "A", 1000, 100, 5).await;

        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 3), CartLine::new(a.id, 3)]);
        match db.checkout().checkout(&request).await.unwrap_err() {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 2), CartLine::new(a.id, 3)]);
        let receipt = db.checkout().checkout(&request).await.unwrap();
        assert_eq!(receipt.line_count, 2);
        assert_eq!(db.articles().get_by_id(a.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_checkout_at_uses_given_timestamp() {
        let db = db().await;
        let a = article(&db, "A", 1000, 0, 5).await;
        let at = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let receipt = db
            .checkout()
            .checkout_at(&CheckoutRequest::new(vec![CartLine::new(a.id, 1)]), at)
            .await
            .unwrap();
        let invoice = db.invoices().get_by_id(receipt.invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.created_at, at);
        assert_eq!(invoice.total_tax_cents, 0);
    }
}
