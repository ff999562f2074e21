//! Trait-based storage abstractions with in-memory, SQLite, and PostgreSQL backends.

pub mod inmemory;
pub mod traits;

// Feature-gated storage implementations
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export commonly used types and traits
pub use inmemory::MemoryOAuthStorage;
pub use traits::*;

#[cfg(feature = "postgres")]
pub use postgres::PostgresOAuthStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteOAuthStorage;

use crate::errors::StorageError;
use crate::oauth::types::ArtifactKind;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default SQLite database when no `DATABASE_URL` is given
pub const DEFAULT_SQLITE_URL: &str = "sqlite:grant_store.db";

/// Storage backend configuration and factory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite(String), // Connection string/path
    #[cfg(feature = "postgres")]
    Postgres(String), // Connection string
}

/// Create a storage backend based on configuration
pub async fn create_storage_backend(
    backend: StorageBackend,
) -> std::result::Result<Arc<dyn OAuthStorage>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryOAuthStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite(database_url) => {
            let storage = sqlite::SqliteOAuthStorage::connect(&database_url).await?;

            // Run migrations
            storage.migrate().await?;

            Ok(Arc::new(storage))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres(database_url) => {
            let pool = sqlx::postgres::PgPool::connect(&database_url)
                .await
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("PostgreSQL connection failed: {}", e))
                })?;

            let storage = postgres::PostgresOAuthStorage::new(pool);

            // Run migrations
            storage.migrate().await?;

            Ok(Arc::new(storage))
        }
    }
}

/// Parse storage backend from configuration string
pub fn parse_storage_backend(
    backend_name: &str,
    database_url: Option<&str>,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = database_url.unwrap_or(DEFAULT_SQLITE_URL);
            Ok(StorageBackend::Sqlite(url.to_string()))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = database_url.ok_or_else(|| {
                StorageError::InvalidData("DATABASE_URL required for postgres backend".to_string())
            })?;
            Ok(StorageBackend::Postgres(url.to_string()))
        }
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}

/// Purge expired artifacts of every kind. Every kind is attempted; the first
/// error is returned after the sweep completes.
pub async fn purge_expired<S: ArtifactStore + ?Sized>(
    storage: &S,
) -> std::result::Result<BTreeMap<ArtifactKind, usize>, StorageError> {
    let mut purged = BTreeMap::new();
    let mut first_error = None;
    for kind in ArtifactKind::ALL {
        match storage.purge_expired_sessions(kind).await {
            Ok(count) => {
                purged.insert(kind, count);
            }
            Err(err) => {
                tracing::error!(%kind, error = ?err, "purge failed");
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(purged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::session::DefaultSession;
    use crate::oauth::types::Request;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_purge_expired_sweeps_every_kind() {
        let storage = MemoryOAuthStorage::new();
        let expired = Request::new("req1", "c1", DefaultSession::new("user-1"))
            .with_expiry(Utc::now() - Duration::seconds(1));
        for kind in ArtifactKind::ALL {
            storage.create_session(kind, "old", &expired).await.unwrap();
        }

        let purged = purge_expired(&storage).await.unwrap();
        assert_eq!(purged.len(), ArtifactKind::ALL.len());
        assert!(purged.values().all(|count| *count == 1));
    }

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!(
            parse_storage_backend("memory", None).unwrap(),
            StorageBackend::Memory
        );
        assert!(matches!(
            parse_storage_backend("mongo", None),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_parse_sqlite_default_url() {
        assert_eq!(
            parse_storage_backend("sqlite", None).unwrap(),
            StorageBackend::Sqlite(DEFAULT_SQLITE_URL.to_string())
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_parse_postgres_requires_url() {
        assert!(parse_storage_backend("postgres", None).is_err());
        assert_eq!(
            parse_storage_backend("postgres", Some("postgres://localhost/grants")).unwrap(),
            StorageBackend::Postgres("postgres://localhost/grants".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let storage = create_storage_backend(StorageBackend::Memory).await.unwrap();
        assert!(
            storage
                .list_clients(&Default::default())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
