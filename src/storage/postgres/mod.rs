//! PostgreSQL storage implementations
//!
//! PostgreSQL is suitable for production deployments with several instances
//! sharing one database.

mod artifacts;
mod clients;

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::oauth::types::{ArtifactKind, StoredRequest};
use crate::storage::traits::*;
use async_trait::async_trait;
use sqlx::postgres::PgPool;

pub use artifacts::PostgresArtifactStore;
pub use clients::PostgresOAuthClientStore;

/// Comprehensive PostgreSQL OAuth storage implementation
pub struct PostgresOAuthStorage {
    pool: PgPool,
    client_store: PostgresOAuthClientStore,
    artifact_store: PostgresArtifactStore,
}

impl PostgresOAuthStorage {
    /// Create a new PostgreSQL OAuth storage instance
    pub fn new(pool: PgPool) -> Self {
        Self {
            client_store: PostgresOAuthClientStore::new(pool.clone()),
            artifact_store: PostgresArtifactStore::new(pool.clone()),
            pool,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl OAuthClientStore for PostgresOAuthStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        self.client_store.store_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        self.client_store.get_client(client_id).await
    }

    async fn update_client(&self, current: &Client, updated: &Client) -> Result<()> {
        self.client_store.update_client(current, updated).await
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        self.client_store.delete_client(client_id).await
    }

    async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<Client>> {
        self.client_store.list_clients(filter).await
    }
}

#[async_trait]
impl ArtifactStore for PostgresOAuthStorage {
    async fn store_artifact(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &StoredRequest,
    ) -> Result<()> {
        self.artifact_store
            .store_artifact(kind, signature, request)
            .await
    }

    async fn get_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<StoredRequest> {
        self.artifact_store.get_artifact(kind, signature).await
    }

    async fn delete_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<()> {
        self.artifact_store.delete_artifact(kind, signature).await
    }

    async fn delete_sessions_by_request_id(
        &self,
        kind: ArtifactKind,
        request_id: &str,
    ) -> Result<usize> {
        self.artifact_store
            .delete_sessions_by_request_id(kind, request_id)
            .await
    }

    async fn purge_expired_sessions(&self, kind: ArtifactKind) -> Result<usize> {
        self.artifact_store.purge_expired_sessions(kind).await
    }
}

impl OAuthStorage for PostgresOAuthStorage {}
