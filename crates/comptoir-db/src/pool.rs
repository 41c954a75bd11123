//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::from_env() / DbConfig::new(path)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► db.checkout()  ── one write transaction per checkout        │
//! │       ├──► db.reports()   ── one read transaction per report           │
//! │       └──► db.articles() / clients() / invoices()                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode and Writers
//! Readers never block writers and writers never block readers. Writers
//! queue on SQLite's single write lock; `busy_timeout` bounds how long a
//! checkout waits for it before failing.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::checkout::CheckoutEngine;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::reporting::ReportingEngine;
use crate::repository::article::ArticleRepository;
use crate::repository::client::ClientRepository;
use crate::repository::invoice::InvoiceRepository;

/// Default database file when no path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "./comptoir.db";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/comptoir.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(10));
/// ```
///
/// ## Environment Overrides
/// | Variable                       | Field            |
/// |--------------------------------|------------------|
/// | `COMPTOIR_DB_PATH`             | `database_path`  |
/// | `COMPTOIR_DB_MAX_CONNECTIONS`  | `max_connections`|
/// | `COMPTOIR_DB_BUSY_TIMEOUT_MS`  | `busy_timeout`   |
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Pool acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a statement waits for SQLite's write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        DbConfig::new(DEFAULT_DATABASE_PATH).apply_env_overrides()
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A single connection: every connection to `:memory:` would otherwise
    /// see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Applies environment variable overrides. Unparsable values are ignored.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("COMPTOIR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("COMPTOIR_DB_MAX_CONNECTIONS") {
            if let Ok(parsed) = max.parse::<u32>() {
                debug!(max_connections = parsed, "Overriding pool size from environment");
                self.max_connections = parsed;
            }
        }

        if let Ok(ms) = std::env::var("COMPTOIR_DB_BUSY_TIMEOUT_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                debug!(busy_timeout_ms = parsed, "Overriding busy timeout from environment");
                self.busy_timeout = Duration::from_millis(parsed);
            }
        }

        self
    }

    /// Checks the pool bounds.
    pub fn validate(&self) -> DbResult<()> {
        if self.max_connections == 0 {
            return Err(DbError::ConnectionFailed(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(DbError::ConnectionFailed(
                "min_connections cannot exceed max_connections".into(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository and engine access.
///
/// Cheap to clone: every clone shares the same pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()).await?;
///
/// let receipt = db.checkout().checkout(&request).await?;
/// let report = db.reports().report(ReportRange::from_keyword("week")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys,
    ///    busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;

        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs pending migrations. Called by `new()` unless disabled.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the catalog repository.
    pub fn articles(&self) -> ArticleRepository {
        ArticleRepository::new(self.pool.clone())
    }

    /// Returns the client directory.
    pub fn clients(&self) -> ClientRepository {
        ClientRepository::new(self.pool.clone())
    }

    /// Returns the invoice store.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Returns the checkout engine.
    pub fn checkout(&self) -> CheckoutEngine {
        CheckoutEngine::new(self.pool.clone())
    }

    /// Returns the reporting engine.
    pub fn reports(&self) -> ReportingEngine {
        ReportingEngine::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
