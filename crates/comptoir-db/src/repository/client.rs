//! # Client Repository
//!
//! The client directory. Checkout resolves a client by name inside its own
//! transaction, so a failed checkout never leaves an orphan client behind.
//!
//! ```text
//! client_name ─┬─ blank / absent ──► standing walk-in client (created once)
//!              └─ "Awa Diop"     ──► oldest client with that exact name,
//!                                    or a new registered client
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use comptoir_core::validation::{validate_client_name, validate_email};
use comptoir_core::{Client, ClientKind, CoreError, NewClient, WALK_IN_CLIENT_NAME};

const CLIENT_COLUMNS: &str = "id, name, kind, email, phone, created_at";

/// Repository for clients.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Gets a client by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1");
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(client)
    }

    /// Registers a client explicitly.
    ///
    /// ## Returns
    /// * `Err(CoreError::ClientConflict)` - the email is already registered
    pub async fn create(&self, client: &NewClient) -> DbResult<Client> {
        validate_client_name(&client.name)?;
        let email = client
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(validate_email)
            .transpose()?;

        debug!(name = %client.name.trim(), "Registering client");

        let mut conn = self.pool.acquire().await?;
        insert_client(
            &mut conn,
            client.name.trim(),
            ClientKind::Registered,
            email.as_deref(),
            client.phone.as_deref(),
            Utc::now(),
        )
        .await
    }

    /// Resolves a client by name outside any checkout.
    pub async fn find_or_create(&self, name: Option<&str>) -> DbResult<Client> {
        let mut conn = self.pool.acquire().await?;
        Self::find_or_create_by_name(&mut conn, name, Utc::now()).await
    }

    /// Resolves the client of a checkout, on the caller's connection.
    ///
    /// A trimmed non-empty name matches the oldest client with exactly that
    /// name or registers a new one. A blank or absent name resolves the
    /// walk-in client.
    pub async fn find_or_create_by_name(
        conn: &mut SqliteConnection,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<Client> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let Some(name) = name else {
            return Self::walk_in(conn, now).await;
        };
        validate_client_name(name)?;

        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE name = ?1 AND kind = 'registered' \
             ORDER BY id LIMIT 1"
        );
        let existing = sqlx::query_as::<_, Client>(&sql)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        match existing {
            Some(client) => Ok(client),
            None => insert_client(conn, name, ClientKind::Registered, None, None, now).await,
        }
    }

    /// Returns the standing walk-in client, creating it on first use.
    pub async fn walk_in(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<Client> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE kind = 'walk_in'");
        let existing = sqlx::query_as::<_, Client>(&sql)
            .fetch_optional(&mut *conn)
            .await?;

        match existing {
            Some(client) => Ok(client),
            None => insert_client(conn, WALK_IN_CLIENT_NAME, ClientKind::WalkIn, None, None, now).await,
        }
    }
}

async fn insert_client(
    conn: &mut SqliteConnection,
    name: &str,
    kind: ClientKind,
    email: Option<&str>,
    phone: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<Client> {
    debug!(name = %name, ?kind, "Creating client");

    let sql = format!(
        "INSERT INTO clients (name, kind, email, phone, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         RETURNING {CLIENT_COLUMNS}"
    );
    sqlx::query_as::<_, Client>(&sql)
        .bind(name)
        .bind(kind)
        .bind(email)
        .bind(phone)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("email") => {
                CoreError::ClientConflict {
                    field: "email".to_string(),
                    value: email.unwrap_or_default().to_string(),
                }
                .into()
            }
            other => other,
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
