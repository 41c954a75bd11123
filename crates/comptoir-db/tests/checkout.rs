//! Integration tests for the checkout engine against file-backed databases.

use std::collections::HashMap;
use std::error::Error;

use comptoir_core::{
    Article, CartLine, CheckoutRequest, ClientKind, CoreError, Money, NewArticle, PaymentMethod,
    TaxRate, ValidationError, MAX_PRICE_CENTS, MAX_STOCK,
};
use comptoir_db::{Database, DbConfig, DbError};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

/// A pooled database in a fresh temporary directory. Keep the `TempDir`
/// alive for the duration of the test.
async fn file_db(max_connections: u32) -> Result<(TempDir, Database), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = DbConfig::new(dir.path().join("comptoir.db")).max_connections(max_connections);
    let db = Database::new(config).await?;
    Ok((dir, db))
}

async fn stocked(db: &Database, barcode: &str, excl: i64, rate: u32, stock: i64) -> Result<Article, DbError> {
    db.articles()
        .insert(&NewArticle::priced(
            barcode,
            format!("Article {barcode}"),
            Money::from_cents(excl),
            TaxRate::from_thousandths(rate),
            stock,
        ))
        .await
}

async fn stock_of(db: &Database, id: i64) -> Result<i64, DbError> {
    Ok(db.articles().get_by_id(id).await?.map(|a| a.stock).unwrap_or(-1))
}

async fn count(db: &Database, table: &str) -> Result<i64, DbError> {
    Ok(sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await?)
}

async fn client_of(db: &Database, invoice_id: i64) -> Result<i64, DbError> {
    Ok(db
        .invoices()
        .get_by_id(invoice_id)
        .await?
        .map(|i| i.client_id)
        .unwrap_or_default())
}

#[tokio::test]
async fn failing_last_line_leaves_no_trace() -> TestResult {
    let (_dir, db) = file_db(2).await?;
    let a = stocked(&db, "A", 1000, 200, 10).await?;
    let b = stocked(&db, "B", 250, 55, 10).await?;
    let c = stocked(&db, "C", 99, 55, 2).await?;

    let request = CheckoutRequest::new(vec![
        CartLine::new(a.id, 1),
        CartLine::new(b.id, 4),
        CartLine::new(c.id, 100),
    ])
    .client("Claire Dubois");

    let err = db.checkout().checkout(&request).await.unwrap_err();
    match err {
        DbError::Domain(CoreError::InsufficientStock {
            article_name,
            available,
            requested,
        }) => {
            assert_eq!(article_name, "Article C");
            assert_eq!(available, 2);
            assert_eq!(requested, 100);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_of(&db, a.id).await?, 10);
    assert_eq!(stock_of(&db, b.id).await?, 10);
    assert_eq!(stock_of(&db, c.id).await?, 2);
    assert_eq!(count(&db, "invoices").await?, 0);
    assert_eq!(count(&db, "invoice_lines").await?, 0);
    assert_eq!(count(&db, "clients").await?, 0);
    Ok(())
}

#[tokio::test]
async fn stock_drops_by_exactly_what_was_invoiced() -> TestResult {
    let (_dir, db) = file_db(2).await?;
    let a = stocked(&db, "A", 1000, 200, 50).await?;
    let b = stocked(&db, "B", 333, 55, 50).await?;
    let c = stocked(&db, "C", 1999, 0, 50).await?;

    let carts = [
        vec![CartLine::new(a.id, 2), CartLine::new(b.id, 3)],
        vec![CartLine::new(c.id, 1)],
        vec![CartLine::new(b.id, 1), CartLine::new(a.id, 4), CartLine::new(b.id, 2)],
    ];

    let mut invoiced: HashMap<i64, i64> = HashMap::new();
    for cart in carts {
        let receipt = db.checkout().checkout(&CheckoutRequest::new(cart)).await?;
        let lines = db.invoices().get_lines(receipt.invoice_id).await?;
        let invoice = db
            .invoices()
            .get_by_id(receipt.invoice_id)
            .await?
            .ok_or("invoice missing")?;

        let lines_total: i64 = lines.iter().map(|l| l.line_total_cents).sum();
        let lines_excl: i64 = lines.iter().map(|l| l.line_excl_cents).sum();
        assert_eq!(invoice.total_incl_cents, lines_total);
        assert_eq!(invoice.total_excl_cents, lines_excl);
        assert_eq!(
            invoice.total_excl_cents + invoice.total_tax_cents,
            invoice.total_incl_cents
        );

        for line in lines {
            *invoiced.entry(line.article_id).or_default() += line.quantity;
        }
    }

    for article in [&a, &b, &c] {
        let sold = invoiced.get(&article.id).copied().unwrap_or(0);
        assert_eq!(stock_of(&db, article.id).await?, 50 - sold);
    }
    assert_eq!(invoiced[&a.id], 6);
    assert_eq!(invoiced[&b.id], 6);
    assert_eq!(invoiced[&c.id], 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_carts_never_oversell() -> TestResult {
    let (_dir, db) = file_db(4).await?;
    let a = stocked(&db, "A", 500, 55, 10).await?;

    let first = {
        let db = db.clone();
        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 6)]);
        tokio::spawn(async move { db.checkout().checkout(&request).await })
    };
    let second = {
        let db = db.clone();
        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 6)]);
        tokio::spawn(async move { db.checkout().checkout(&request).await })
    };

    let results = [first.await?, second.await?];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);

    let rejected = results.iter().find_map(|r| r.as_ref().err()).ok_or("no rejection")?;
    match rejected {
        DbError::Domain(CoreError::InsufficientStock {
            available,
            requested,
            ..
        }) => {
            assert_eq!(*available, 4);
            assert_eq!(*requested, 6);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_of(&db, a.id).await?, 4);
    assert_eq!(count(&db, "invoices").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_single_unit_sales_stop_at_zero() -> TestResult {
    let (_dir, db) = file_db(4).await?;
    let a = stocked(&db, "A", 120, 55, 5).await?;
    let b = stocked(&db, "B", 80, 55, 100).await?;

    let mut handles = Vec::new();
    for n in 0..8 {
        let db = db.clone();
        // Alternate line order so carts reach the same articles from both sides.
        let lines = if n % 2 == 0 {
            vec![CartLine::new(a.id, 1), CartLine::new(b.id, 1)]
        } else {
            vec![CartLine::new(b.id, 1), CartLine::new(a.id, 1)]
        };
        handles.push(tokio::spawn(async move {
            db.checkout().checkout(&CheckoutRequest::new(lines)).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => committed += 1,
            Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(committed, 5);
    assert_eq!(stock_of(&db, a.id).await?, 0);
    assert_eq!(stock_of(&db, b.id).await?, 95);
    assert_eq!(count(&db, "invoices").await?, 5);
    Ok(())
}

#[tokio::test]
async fn invoice_numbers_follow_ids() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let a = stocked(&db, "A", 100, 0, 100).await?;

    let mut last = None;
    for _ in 0..7 {
        last = Some(
            db.checkout()
                .checkout(&CheckoutRequest::new(vec![CartLine::new(a.id, 1)]))
                .await?,
        );
    }
    let last = last.ok_or("no checkout")?;
    assert_eq!(last.invoice_number, "FAC-00000007");

    let found = db
        .invoices()
        .get_by_number("FAC-00000007")
        .await?
        .ok_or("invoice not found by number")?;
    assert_eq!(found.id, last.invoice_id);
    assert!(db.invoices().get_by_number("FAC-00000008").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn named_clients_are_reused_and_walk_ins_share_one_record() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let a = stocked(&db, "A", 100, 0, 100).await?;
    let cart = || vec![CartLine::new(a.id, 1)];

    let first = db
        .checkout()
        .checkout(&CheckoutRequest::new(cart()).client("Awa Diallo"))
        .await?;
    let second = db
        .checkout()
        .checkout(&CheckoutRequest::new(cart()).client("  Awa Diallo "))
        .await?;
    let anonymous = db.checkout().checkout(&CheckoutRequest::new(cart())).await?;
    let blank = db
        .checkout()
        .checkout(&CheckoutRequest::new(cart()).client("   "))
        .await?;

    let named = client_of(&db, first.invoice_id).await?;
    assert_eq!(named, client_of(&db, second.invoice_id).await?);
    let walk_in = client_of(&db, anonymous.invoice_id).await?;
    assert_eq!(walk_in, client_of(&db, blank.invoice_id).await?);
    assert_ne!(named, walk_in);

    let client = db.clients().get_by_id(named).await?.ok_or("client missing")?;
    assert_eq!(client.name, "Awa Diallo");
    assert_eq!(client.kind, ClientKind::Registered);
    assert_eq!(db.invoices().list_by_client(named).await?.len(), 2);
    assert_eq!(count(&db, "clients").await?, 2);
    Ok(())
}

#[tokio::test]
async fn payment_method_defaults_to_cash() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let a = stocked(&db, "A", 100, 0, 10).await?;

    let receipt = db
        .checkout()
        .checkout(&CheckoutRequest::new(vec![CartLine::new(a.id, 1)]))
        .await?;
    let invoice = db.invoices().get_by_id(receipt.invoice_id).await?.ok_or("missing")?;
    assert_eq!(invoice.payment_method, PaymentMethod::Cash);
    assert_eq!(invoice.cashier_id, None);
    Ok(())
}

#[tokio::test]
async fn inactive_articles_cannot_be_sold() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let mut retired = NewArticle::priced("OLD", "Retired", Money::from_cents(100), TaxRate::zero(), 10);
    retired.is_active = false;
    let retired = db.articles().insert(&retired).await?;

    let err = db
        .checkout()
        .checkout(&CheckoutRequest::new(vec![CartLine::new(retired.id, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::ArticleNotFound(id)) if id == retired.id));
    assert_eq!(stock_of(&db, retired.id).await?, 10);
    Ok(())
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_any_write() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let a = stocked(&db, "A", 100, 0, 10).await?;

    for bad in [
        CartLine::new(a.id, 0),
        CartLine::new(a.id, -3),
        CartLine { article_id: None, quantity: 1 },
    ] {
        let request = CheckoutRequest::new(vec![CartLine::new(a.id, 1), bad]);
        let err = db.checkout().checkout(&request).await.unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::InvalidLine { position: 1, .. })),
            "got {err:?}"
        );
    }

    assert_eq!(stock_of(&db, a.id).await?, 10);
    assert_eq!(count(&db, "invoices").await?, 0);
    Ok(())
}

#[tokio::test]
async fn bulk_quantities_are_limited_only_by_stock() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let eau = stocked(&db, "EAU", 500, 55, 20_000).await?;

    let receipt = db
        .checkout()
        .checkout(&CheckoutRequest::new(vec![CartLine::new(eau.id, 10_000)]))
        .await?;
    assert_eq!(receipt.totals.total_excl.cents(), 5_000_000);
    assert_eq!(receipt.totals.total_incl.cents(), 10_000 * eau.price_incl_cents);
    assert_eq!(stock_of(&db, eau.id).await?, 10_000);

    let err = db
        .checkout()
        .checkout(&CheckoutRequest::new(vec![CartLine::new(eau.id, 10_001)]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, DbError::Domain(CoreError::InsufficientStock { available: 10_000, requested: 10_001, .. })),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn malformed_line_wins_over_unknown_article() -> TestResult {
    let (_dir, db) = file_db(1).await?;
    let a = stocked(&db, "A", 100, 0, 10).await?;

    let request = CheckoutRequest::new(vec![CartLine::new(999_999, 1), CartLine::new(a.id, 0)]);
    let err = db.checkout().checkout(&request).await.unwrap_err();
    assert!(
        matches!(err, DbError::Domain(CoreError::InvalidLine { position: 1, .. })),
        "got {err:?}"
    );
    assert_eq!(count(&db, "invoices").await?, 0);
    Ok(())
}

#[tokio::test]
async fn catalog_rejects_prices_and_stock_beyond_caps() -> TestResult {
    let (_dir, db) = file_db(1).await?;

    let priceless = NewArticle::priced(
        "GOLD",
        "Lingot",
        Money::from_cents(MAX_PRICE_CENTS + 1),
        TaxRate::zero(),
        1,
    );
    let err = db.articles().insert(&priceless).await.unwrap_err();
    assert!(
        matches!(err, DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))),
        "got {err:?}"
    );

    let hoard = NewArticle::priced("SAND", "Sable", Money::from_cents(1), TaxRate::zero(), MAX_STOCK + 1);
    assert!(db.articles().insert(&hoard).await.is_err());
    assert_eq!(count(&db, "articles").await?, 0);

    // At the caps the inventory value still fits and the report succeeds.
    let top = NewArticle::priced(
        "TOP",
        "Coffre",
        Money::from_cents(MAX_PRICE_CENTS),
        TaxRate::zero(),
        MAX_STOCK,
    );
    db.articles().insert(&top).await?;
    let report = db.reports().report(comptoir_core::ReportRange::from_keyword("day")).await?;
    assert_eq!(report.inventory.stock_value.cents(), MAX_PRICE_CENTS * MAX_STOCK);
    Ok(())
}
