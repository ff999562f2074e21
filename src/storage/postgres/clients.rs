//! PostgreSQL implementation for OAuth client storage

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::storage::traits::{OAuthClientStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of OAuth client storage
pub struct PostgresOAuthClientStore {
    pool: PgPool,
}

impl PostgresOAuthClientStore {
    /// Create a new PostgreSQL OAuth client store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_client(row: &PgRow) -> Result<Client> {
        let Json(client): Json<Client> = row
            .try_get("document")
            .map_err(|e| StorageError::SerializationFailed(format!("Invalid client document: {}", e)))?;
        Ok(client)
    }
}

#[async_trait]
impl OAuthClientStore for PostgresOAuthClientStore {
    async fn store_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_clients (client_id, owner, public, disabled, document)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&client.id)
        .bind(&client.owner)
        .bind(client.public)
        .bind(client.disabled)
        .bind(Json(client))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::from_sqlx(e, &format!("client {}", client.id)))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT document FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "get client"))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn update_client(&self, current: &Client, updated: &Client) -> Result<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::from_sqlx(e, "update client"))?;

        let row = sqlx::query("SELECT document FROM oauth_clients WHERE client_id = $1 FOR UPDATE")
            .bind(&updated.id)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|e| StorageError::from_sqlx(e, "update client"))?
            .ok_or_else(|| StorageError::NotFound(format!("Client not found: {}", updated.id)))?;

        if Self::row_to_client(&row)? != *current {
            return Err(StorageError::Conflict(format!(
                "client {} changed concurrently",
                updated.id
            )));
        }

        sqlx::query(
            r#"
            UPDATE oauth_clients
            SET owner = $1, public = $2, disabled = $3, document = $4, updated_at = NOW()
            WHERE client_id = $5
            "#,
        )
        .bind(&updated.owner)
        .bind(updated.public)
        .bind(updated.disabled)
        .bind(Json(updated))
        .bind(&updated.id)
        .execute(&mut *transaction)
        .await
        .map_err(|e| StorageError::from_sqlx(e, "update client"))?;

        transaction.commit()
            .await
            .map_err(|e| StorageError::from_sqlx(e, "update client"))?;

        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE client_id = $1")
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
