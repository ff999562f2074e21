//! PostgreSQL implementation for grant artifact storage

use crate::errors::StorageError;
use crate::oauth::session::EncodedSession;
use crate::oauth::types::{ArtifactKind, StoredRequest};
use crate::storage::traits::{ArtifactStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use std::collections::BTreeMap;

const COLUMNS: &str = "request_id, requested_at, client_id, requested_scopes, granted_scopes, \
    requested_audience, granted_audience, form_data, expires_at, session_version, session_data";

/// PostgreSQL implementation of artifact storage, one table per [`ArtifactKind`]
pub struct PostgresArtifactStore {
    pool: PgPool,
}

fn get_column<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::QueryFailed(format!("Failed to get {}: {}", column, e)))
}

impl PostgresArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to StoredRequest
    fn row_to_request(row: &PgRow) -> Result<StoredRequest> {
        let Json(requested_scopes): Json<Vec<String>> = get_column(row, "requested_scopes")?;
        let Json(granted_scopes): Json<Vec<String>> = get_column(row, "granted_scopes")?;
        let Json(requested_audience): Json<Vec<String>> = get_column(row, "requested_audience")?;
        let Json(granted_audience): Json<Vec<String>> = get_column(row, "granted_audience")?;
        let Json(form): Json<BTreeMap<String, Vec<String>>> = get_column(row, "form_data")?;
        let version: i32 = get_column(row, "session_version")?;

        Ok(StoredRequest {
            request_id: get_column(row, "request_id")?,
            requested_at: get_column::<DateTime<Utc>>(row, "requested_at")?,
            client_id: get_column(row, "client_id")?,
            requested_scopes,
            granted_scopes,
            requested_audience,
            granted_audience,
            form,
            expires_at: get_column::<Option<DateTime<Utc>>>(row, "expires_at")?,
            session: EncodedSession {
                version: u16::try_from(version).map_err(|_| {
                    StorageError::InvalidData(format!("Invalid session version: {}", version))
                })?,
                data: get_column(row, "session_data")?,
            },
        })
    }
}

#[async_trait]
impl ArtifactStore for PostgresArtifactStore {
    async fn store_artifact(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &StoredRequest,
    ) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (signature, {}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            kind.table_name(),
            COLUMNS
        );

        sqlx::query(&query)
            .bind(signature)
            .bind(&request.request_id)
            .bind(request.requested_at)
            .bind(&request.client_id)
            .bind(Json(&request.requested_scopes))
            .bind(Json(&request.granted_scopes))
            .bind(Json(&request.requested_audience))
            .bind(Json(&request.granted_audience))
            .bind(Json(&request.form))
            .bind(request.expires_at)
            .bind(i32::from(request.session.version))
            .bind(&request.session.data)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("{} {}", kind, signature)))?;

        Ok(())
    }

    async fn get_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<StoredRequest> {
        let query = format!(
            "SELECT {} FROM {} WHERE signature = $1",
            COLUMNS,
            kind.table_name()
        );

        let row = sqlx::query(&query)
            .bind(signature)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("get {}", kind)))?
            .ok_or_else(|| StorageError::NotFound(format!("{} {}", kind, signature)))?;

        Self::row_to_request(&row)?.ensure_live(kind, signature)
    }

    async fn delete_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE signature = $1", kind.table_name());

        let result = sqlx::query(&query)
            .bind(signature)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("delete {}", kind)))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("{} {}", kind, signature)));
        }

        Ok(())
    }

    async fn delete_sessions_by_request_id(
        &self,
        kind: ArtifactKind,
        request_id: &str,
    ) -> Result<usize> {
        let query = format!("DELETE FROM {} WHERE request_id = $1", kind.table_name());

        let result = sqlx::query(&query)
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("revoke {}", kind)))?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_expired_sessions(&self, kind: ArtifactKind) -> Result<usize> {
        let query = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
            kind.table_name()
        );

        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("purge {}", kind)))?;

        Ok(result.rows_affected() as usize)
    }
}
