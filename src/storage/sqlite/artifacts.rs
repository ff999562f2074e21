//! SQLite implementation for grant artifact storage

use crate::errors::StorageError;
use crate::oauth::session::EncodedSession;
use crate::oauth::types::{ArtifactKind, StoredRequest};
use crate::storage::traits::{ArtifactStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

const COLUMNS: &str = "request_id, requested_at, client_id, requested_scopes, granted_scopes, \
    requested_audience, granted_audience, form_data, expires_at, session_version, session_data";

/// SQLite implementation of artifact storage, one table per [`ArtifactKind`]
pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

/// Fixed-width UTC so that text comparison orders like time
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", column, e)))?
        .with_timezone(&Utc))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

fn get_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| StorageError::QueryFailed(format!("Failed to get {}: {}", column, e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| StorageError::SerializationFailed(format!("Invalid {}: {}", column, e)))
}

fn get_column<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StorageError::QueryFailed(format!("Failed to get {}: {}", column, e)))
}

impl SqliteArtifactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to StoredRequest
    fn row_to_request(row: &SqliteRow) -> Result<StoredRequest> {
        let requested_at: String = get_column(row, "requested_at")?;
        let expires_at: Option<String> = get_column(row, "expires_at")?;
        let version: i64 = get_column(row, "session_version")?;

        Ok(StoredRequest {
            request_id: get_column(row, "request_id")?,
            requested_at: parse_timestamp(&requested_at, "requested_at")?,
            client_id: get_column(row, "client_id")?,
            requested_scopes: get_json(row, "requested_scopes")?,
            granted_scopes: get_json(row, "granted_scopes")?,
            requested_audience: get_json(row, "requested_audience")?,
            granted_audience: get_json(row, "granted_audience")?,
            form: get_json(row, "form_data")?,
            expires_at: expires_at
                .map(|value| parse_timestamp(&value, "expires_at"))
                .transpose()?,
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
impl ArtifactStore for SqliteArtifactStore {
    async fn store_artifact(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &StoredRequest,
    ) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (signature, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            kind.table_name(),
            COLUMNS
        );

        sqlx::query(&query)
            .bind(signature)
            .bind(&request.request_id)
            .bind(format_timestamp(&request.requested_at))
            .bind(&request.client_id)
            .bind(to_json(&request.requested_scopes)?)
            .bind(to_json(&request.granted_scopes)?)
            .bind(to_json(&request.requested_audience)?)
            .bind(to_json(&request.granted_audience)?)
            .bind(to_json(&request.form)?)
            .bind(request.expires_at.as_ref().map(format_timestamp))
            .bind(i64::from(request.session.version))
            .bind(&request.session.data)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("{} {}", kind, signature)))?;

        Ok(())
    }

    async fn get_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<StoredRequest> {
        let query = format!(
            "SELECT {} FROM {} WHERE signature = ?",
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
        let query = format!("DELETE FROM {} WHERE signature = ?", kind.table_name());

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
        let query = format!("DELETE FROM {} WHERE request_id = ?", kind.table_name());

        let result = sqlx::query(&query)
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("revoke {}", kind)))?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_expired_sessions(&self, kind: ArtifactKind) -> Result<usize> {
        let query = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= ?",
            kind.table_name()
        );

        let result = sqlx::query(&query)
            .bind(format_timestamp(&Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from_sqlx(e, &format!("purge {}", kind)))?;

        Ok(result.rows_affected() as usize)
    }
}
