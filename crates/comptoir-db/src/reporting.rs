//! # Reporting Engine
//!
//! Aggregates paid invoices over a window and its comparison window.
//!
//! All sums are integer SQL sums of cents already rounded at checkout, so a
//! report always agrees with the invoices it covers. Every query of one
//! report runs inside a single read transaction: the report reflects one
//! committed state of the store, never a checkout halfway through.
//!
//! Cancelled and refunded invoices are left out of every figure.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use comptoir_core::report::{
    CategoryBucket, DailyBucket, InventorySnapshot, PaymentBucket, RecentSale, ReportPayload,
    ReportRange, ReportWindow, SalesSummary, SalesTrends, TaxBucket, UNCATEGORIZED,
};
use comptoir_core::{
    invoice_number, Money, PaymentMethod, TaxRate, OUT_OF_STOCK_NAMES_LIMIT, RECENT_SALES_LIMIT,
};

/// Builds reports.
#[derive(Debug, Clone)]
pub struct ReportingEngine {
    pool: SqlitePool,
}

impl ReportingEngine {
    /// Creates a new ReportingEngine.
    pub fn new(pool: SqlitePool) -> Self {
        ReportingEngine { pool }
    }

    /// Report for a range as of now.
    pub async fn report(&self, range: ReportRange) -> DbResult<ReportPayload> {
        self.report_at(range, Utc::now()).await
    }

    /// Report for a range as of `now`.
    pub async fn report_at(&self, range: ReportRange, now: DateTime<Utc>) -> DbResult<ReportPayload> {
        let window = range.window(now);
        let previous_window = window.previous();

        debug!(
            range = %range.label(),
            start = %window.start,
            end = %window.end,
            "Building report"
        );

        let mut tx = self.pool.begin().await?;

        let summary = fetch_summary(&mut tx, &window).await?;
        let previous_summary = fetch_summary(&mut tx, &previous_window).await?;
        let tax_breakdown = fetch_tax_breakdown(&mut tx, &window).await?;
        let payment_breakdown = fetch_payment_breakdown(&mut tx, &window).await?;
        let daily = fetch_daily(&mut tx, &window).await?;
        let categories = fetch_categories(&mut tx, &window).await?;
        let recent_sales = fetch_recent_sales(&mut tx, &window, RECENT_SALES_LIMIT).await?;
        let inventory = fetch_inventory(&mut tx).await?;

        tx.commit().await?;

        info!(
            range = %range.label(),
            transactions = summary.transactions,
            revenue_incl = %summary.revenue_incl,
            "Report built"
        );

        Ok(ReportPayload {
            range: range.label(),
            window,
            previous_window,
            trends: SalesTrends::between(&summary, &previous_summary),
            summary,
            previous_summary,
            tax_breakdown,
            payment_breakdown,
            daily,
            categories,
            recent_sales,
            inventory,
            generated_at: now,
        })
    }

    /// Headline figures only, for one window.
    pub async fn summary(&self, window: &ReportWindow) -> DbResult<SalesSummary> {
        let mut conn = self.pool.acquire().await?;
        fetch_summary(&mut conn, window).await
    }

    /// Current stock position.
    pub async fn inventory(&self) -> DbResult<InventorySnapshot> {
        let mut conn = self.pool.acquire().await?;
        fetch_inventory(&mut conn).await
    }
}

// =============================================================================
// Queries
// =============================================================================
//
// Every sales query filters on paid invoices created in the window:
// `?1` is its start, `?2` its end, included or not per the window.

fn paid_in(window: &ReportWindow, alias: &str) -> String {
    let end_op = if window.end_inclusive { "<=" } else { "<" };
    format!(
        "{alias}status = 'paid' AND {alias}created_at >= ?1 AND {alias}created_at {end_op} ?2"
    )
}

async fn fetch_summary(conn: &mut SqliteConnection, window: &ReportWindow) -> DbResult<SalesSummary> {
    let (transactions, revenue_excl, revenue_incl): (i64, i64, i64) = sqlx::query_as(&format!(
        "SELECT COUNT(*), \
                COALESCE(SUM(total_excl_cents), 0), \
                COALESCE(SUM(total_incl_cents), 0) \
         FROM invoices_current \
         WHERE {}",
        paid_in(window, "")
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_one(&mut *conn)
    .await?;

    let units_sold: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(l.quantity), 0) \
         FROM invoice_lines l \
         JOIN invoices_current i ON i.id = l.invoice_id \
         WHERE {}",
        paid_in(window, "i.")
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(SalesSummary::from_totals(
        transactions,
        units_sold,
        Money::from_cents(revenue_excl),
        Money::from_cents(revenue_incl),
    ))
}

/// Grouped by the rate stored on each line at sale time.
async fn fetch_tax_breakdown(conn: &mut SqliteConnection, window: &ReportWindow) -> DbResult<Vec<TaxBucket>> {
    let rows: Vec<(u32, i64, i64)> = sqlx::query_as(&format!(
        "SELECT l.tax_rate_thousandths, \
                COALESCE(SUM(l.line_excl_cents), 0), \
                COALESCE(SUM(l.line_total_cents), 0) \
         FROM invoice_lines l \
         JOIN invoices_current i ON i.id = l.invoice_id \
         WHERE {} \
         GROUP BY l.tax_rate_thousandths \
         ORDER BY l.tax_rate_thousandths",
        paid_in(window, "i.")
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(rate, excl, incl)| {
            TaxBucket::new(
                TaxRate::from_thousandths(rate),
                Money::from_cents(excl),
                Money::from_cents(incl),
            )
        })
        .collect())
}

async fn fetch_payment_breakdown(
    conn: &mut SqliteConnection,
    window: &ReportWindow,
) -> DbResult<Vec<PaymentBucket>> {
    let rows: Vec<(PaymentMethod, i64, i64)> = sqlx::query_as(&format!(
        "SELECT payment_method, COUNT(*), COALESCE(SUM(total_incl_cents), 0) \
         FROM invoices_current \
         WHERE {} \
         GROUP BY payment_method \
         ORDER BY 3 DESC, payment_method",
        paid_in(window, "")
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(method, transactions, revenue)| PaymentBucket {
            method,
            transactions,
            revenue_incl: Money::from_cents(revenue),
        })
        .collect())
}

/// One bucket per UTC day with activity, oldest first.
async fn fetch_daily(conn: &mut SqliteConnection, window: &ReportWindow) -> DbResult<Vec<DailyBucket>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(&format!(
        "SELECT substr(created_at, 1, 10) AS day, COUNT(*), COALESCE(SUM(total_incl_cents), 0) \
         FROM invoices_current \
         WHERE {} \
         GROUP BY day \
         ORDER BY day",
        paid_in(window, "")
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(day, transactions, revenue)| {
            let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .map_err(|e| DbError::Internal(format!("bad invoice date '{day}': {e}")))?;
            Ok(DailyBucket {
                day,
                transactions,
                revenue_incl: Money::from_cents(revenue),
            })
        })
        .collect()
}

/// Revenue per article category; articles without one are grouped as
/// [`UNCATEGORIZED`].
async fn fetch_categories(
    conn: &mut SqliteConnection,
    window: &ReportWindow,
) -> DbResult<Vec<CategoryBucket>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(&format!(
        "SELECT COALESCE(NULLIF(TRIM(a.category), ''), ?3) AS bucket, \
                COALESCE(SUM(l.quantity), 0), \
                COALESCE(SUM(l.line_total_cents), 0) \
         FROM invoice_lines l \
         JOIN invoices_current i ON i.id = l.invoice_id \
         JOIN articles a ON a.id = l.article_id \
         WHERE {} \
         GROUP BY bucket \
         ORDER BY 3 DESC, bucket",
        paid_in(window, "i.")
    ))
    .bind(window.start)
    .bind(window.end)
    .bind(UNCATEGORIZED)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(category, units_sold, revenue)| CategoryBucket {
            category,
            units_sold,
            revenue_incl: Money::from_cents(revenue),
        })
        .collect())
}

async fn fetch_recent_sales(
    conn: &mut SqliteConnection,
    window: &ReportWindow,
    limit: i64,
) -> DbResult<Vec<RecentSale>> {
    let rows: Vec<(i64, DateTime<Utc>, String, i64, i64)> = sqlx::query_as(&format!(
        "SELECT i.id, i.created_at, a.name, l.quantity, l.line_total_cents \
         FROM invoice_lines l \
         JOIN invoices_current i ON i.id = l.invoice_id \
         JOIN articles a ON a.id = l.article_id \
         WHERE {} \
         ORDER BY i.created_at DESC, l.id DESC \
         LIMIT ?3",
        paid_in(window, "i.")
    ))
    .bind(window.start)
    .bind(window.end)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(invoice_id, sold_at, article_name, quantity, total)| RecentSale {
            invoice_id,
            invoice_number: invoice_number(invoice_id),
            sold_at,
            article_name,
            quantity,
            line_total: Money::from_cents(total),
        })
        .collect())
}

/// Stock classification matches `StockLevel::classify`.
async fn fetch_inventory(conn: &mut SqliteConnection) -> DbResult<InventorySnapshot> {
    let (active_articles, out_of_stock, low_stock, normal_stock): (i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN stock <= 0 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN stock > 0 AND stock <= stock_minimum THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN stock > 0 AND stock > stock_minimum THEN 1 ELSE 0 END), 0) \
             FROM articles \
             WHERE is_active = 1",
        )
        .fetch_one(&mut *conn)
        .await?;

    // Catalog caps keep each product in range; the sum saturates instead
    // of letting SQLite raise on overflow.
    let stock_values: Vec<i64> = sqlx::query_scalar(
        "SELECT price_incl_cents * stock FROM articles \
         WHERE is_active = 1 AND stock > 0",
    )
    .fetch_all(&mut *conn)
    .await?;
    let stock_value = stock_values.into_iter().fold(0_i64, i64::saturating_add);

    let out_of_stock_names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM articles \
         WHERE is_active = 1 AND stock <= 0 \
         ORDER BY name \
         LIMIT ?1",
    )
    .bind(OUT_OF_STOCK_NAMES_LIMIT)
    .fetch_all(&mut *conn)
    .await?;

    Ok(InventorySnapshot {
        active_articles,
        stock_value: Money::from_cents(stock_value),
        out_of_stock,
        low_stock,
        normal_stock,
        out_of_stock_names,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use comptoir_core::{Period, Trend};

    #[tokio::test]
    async fn test_empty_store_reports_zeros() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let report = db
            .reports()
            .report(ReportRange::from_keyword("nonsense"))
            .await
            .unwrap();

        assert_eq!(report.range, "day");
        assert_eq!(report.summary, SalesSummary::default());
        assert!(report.summary.average_basket.is_zero());
        assert_eq!(report.trends.revenue, Trend::NotApplicable);
        assert_eq!(report.trends.transactions, Trend::NotApplicable);
        assert!(report.tax_breakdown.is_empty());
        assert!(report.payment_breakdown.is_empty());
        assert!(report.daily.is_empty());
        assert!(report.categories.is_empty());
        assert!(report.recent_sales.is_empty());
        assert_eq!(report.inventory, InventorySnapshot::default());
        assert_eq!(report.window.start, Period::Day.start_of(report.generated_at));
    }
}
