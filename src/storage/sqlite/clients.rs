//! SQLite implementation for OAuth client storage
//!
//! The client is kept as its camelCase JSON document; `owner`, `public` and
//! `disabled` are copied into columns for operators querying the table directly.

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::storage::traits::{OAuthClientStore, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of OAuth client storage
pub struct SqliteOAuthClientStore {
    pool: SqlitePool,
}

impl SqliteOAuthClientStore {
    /// Create a new SQLite OAuth client store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn serialize_client(client: &Client) -> Result<String> {
        serde_json::to_string(client).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    /// Convert SQLite row to Client
    fn row_to_client(row: &SqliteRow) -> Result<Client> {
        let document: String = row
            .try_get("document")
            .map_err(|e| StorageError::QueryFailed(format!("Failed to get document: {}", e)))?;
        serde_json::from_str(&document).map_err(|e| {
            StorageError::SerializationFailed(format!("Invalid client document: {}", e))
        })
    }
}

#[async_trait]
impl OAuthClientStore for SqliteOAuthClientStore {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let document = Self::serialize_client(client)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO oauth_clients (client_id, owner, public, disabled, document, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&client.id)
        .bind(&client.owner)
        .bind(client.public)
        .bind(client.disabled)
        .bind(&document)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::from_sqlx(e, &format!("client {}", client.id)))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT document FROM oauth_clients WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "get client"))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn update_client(&self, current: &Client, updated: &Client) -> Result<()> {
        let row = sqlx::query("SELECT document FROM oauth_clients WHERE client_id = ?")
            .bind(&updated.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "update client"))?
            .ok_or_else(|| StorageError::NotFound(format!("Client not found: {}", updated.id)))?;

        let stale = || StorageError::Conflict(format!("client {} changed concurrently", updated.id));
        if Self::row_to_client(&row)? != *current {
            return Err(stale());
        }
        let expected: String = row
            .try_get("document")
            .map_err(|e| StorageError::QueryFailed(format!("Failed to get document: {}", e)))?;

        let document = Self::serialize_client(updated)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        // The stored text is the version token: a write in between changes it.
        let result = sqlx::query(
            r#"
            UPDATE oauth_clients SET owner = ?, public = ?, disabled = ?, document = ?, updated_at = ?
            WHERE client_id = ? AND document = ?
            "#,
        )
        .bind(&updated.owner)
        .bind(updated.public)
        .bind(updated.disabled)
        .bind(&document)
        .bind(&now)
        .bind(&updated.id)
        .bind(&expected)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::from_sqlx(e, "update client"))?;

        if result.rows_affected() == 0 {
            return Err(stale());
        }

        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "delete client"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client_id
            )));
        }

        Ok(())
    }

    async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<Client>> {
        let rows = sqlx::query("SELECT document FROM oauth_clients ORDER BY client_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "list clients"))?;

        let clients = rows
            .iter()
            .map(Self::row_to_client)
            .collect::<Result<Vec<_>>>()?;
        Ok(filter.apply(clients))
    }
}
