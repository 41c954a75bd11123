//! # Article Repository
//!
//! Catalog reads for the till, and the two calls checkout makes inside its
//! transaction: [`ArticleRepository::lock_for_update`] and
//! [`ArticleRepository::decrement_stock`].
//!
//! ## Locking an Article
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  lock_for_update (inside a transaction)                 │
//! │                                                                         │
//! │  UPDATE articles SET stock = stock        ← no-op write: takes the     │
//! │  WHERE id = ? AND is_active = 1             write lock first, then     │
//! │  RETURNING *                                reads the row under it     │
//! │       │                                                                 │
//! │       ├── no row  → ArticleNotFound(id)                                │
//! │       └── row     → Article as of now; nobody else can change it       │
//! │                     until this transaction ends                         │
//! │                                                                         │
//! │  Why write first: a read-then-write transaction on a WAL database can  │
//! │  lose the race to upgrade its snapshot. Writing first waits on         │
//! │  busy_timeout instead and always reads the latest committed stock.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use comptoir_core::validation::{validate_new_article, validate_search_query};
use comptoir_core::{Article, CoreError, NewArticle};

/// Columns selected for an [`Article`], in struct order.
pub(crate) const ARTICLE_COLUMNS: &str = "id, barcode, name, description, category, \
     price_excl_cents, price_incl_cents, tax_rate_thousandths, stock, stock_minimum, \
     is_active, created_at, updated_at";

/// Escapes LIKE wildcards so user input matches literally (`ESCAPE '\'`).
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Repository for catalog articles.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ArticleRepository::new(pool);
/// let hits = repo.search("riz", SEARCH_RESULT_LIMIT).await?;
/// let article = repo.get_by_barcode("3017620422003").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ArticleRepository {
    pool: SqlitePool,
}

impl ArticleRepository {
    /// Creates a new ArticleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ArticleRepository { pool }
    }

    /// Case-insensitive substring search over name and barcode.
    ///
    /// Only active articles, ordered by name. A blank query returns nothing.
    /// Case folding follows SQLite's LIKE (ASCII letters).
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Article>> {
        let Some(query) = validate_search_query(query)? else {
            return Ok(Vec::new());
        };

        debug!(query = %query, limit, "Searching articles");

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE is_active = 1 \
               AND (name LIKE ?1 ESCAPE '\\' OR barcode LIKE ?1 ESCAPE '\\') \
             ORDER BY name, id \
             LIMIT ?2"
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(like_pattern(&query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = articles.len(), "Search returned articles");
        Ok(articles)
    }

    /// Gets an article by id, active or not.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(article)
    }

    /// Gets an article by its barcode, active or not.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE barcode = ?1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(article)
    }

    /// Counts active articles.
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Active articles at or below their minimum stock, emptiest first.
    pub async fn low_stock(&self, limit: i64) -> DbResult<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE is_active = 1 AND stock <= stock_minimum \
             ORDER BY stock, name \
             LIMIT ?1"
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(articles)
    }

    /// Inserts a catalog article.
    ///
    /// ## Returns
    /// * `Ok(Article)` - the stored row
    /// * `Err(DbError::Domain(Validation))` - bad field or incoherent prices
    /// * `Err(DbError::UniqueViolation)` - barcode already used
    pub async fn insert(&self, article: &NewArticle) -> DbResult<Article> {
        validate_new_article(article)?;

        let barcode = article.barcode.trim();
        debug!(barcode = %barcode, name = %article.name, "Inserting article");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO articles ( \
                 barcode, name, description, category, \
                 price_excl_cents, price_incl_cents, tax_rate_thousandths, \
                 stock, stock_minimum, is_active, created_at, updated_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11) \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, Article>(&sql)
            .bind(barcode)
            .bind(article.name.trim())
            .bind(&article.description)
            .bind(&article.category)
            .bind(article.price_excl.cents())
            .bind(article.price_incl.cents())
            .bind(article.tax_rate.thousandths())
            .bind(article.stock)
            .bind(article.stock_minimum)
            .bind(article.is_active)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, barcode),
                other => other,
            })?;

        Ok(stored)
    }

    /// Locks an article for the rest of the caller's transaction and
    /// returns it as currently committed.
    ///
    /// Missing and inactive articles both fail with `ArticleNotFound`.
    pub async fn lock_for_update(conn: &mut SqliteConnection, id: i64) -> DbResult<Article> {
        let sql = format!(
            "UPDATE articles SET stock = stock \
             WHERE id = ?1 AND is_active = 1 \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(CoreError::ArticleNotFound(id))?;

        debug!(id, stock = article.stock, "Article locked");
        Ok(article)
    }

    /// Removes `quantity` units from stock, inside the caller's transaction.
    ///
    /// Guarded by `stock >= quantity`: the row is left untouched and an error
    /// returned rather than going negative.
    pub async fn decrement_stock(
        conn: &mut SqliteConnection,
        id: i64,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(id, quantity, "Decrementing stock");

        let result = sqlx::query(
            "UPDATE articles SET stock = stock - ?2, updated_at = ?3 \
             WHERE id = ?1 AND stock >= ?2",
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::TransactionFailed(format!(
                "stock guard rejected decrement of {quantity} for article {id}"
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
