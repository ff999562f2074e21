//! SQLite storage implementations
//!
//! SQLite is suitable for single-instance deployments and development.

mod artifacts;
mod clients;

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::oauth::types::{ArtifactKind, StoredRequest};
use crate::storage::traits::*;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub use artifacts::SqliteArtifactStore;
pub use clients::SqliteOAuthClientStore;

/// Comprehensive SQLite OAuth storage implementation
pub struct SqliteOAuthStorage {
    pool: SqlitePool,
    client_store: SqliteOAuthClientStore,
    artifact_store: SqliteArtifactStore,
}

impl SqliteOAuthStorage {
    /// Create a new SQLite OAuth storage instance
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            client_store: SqliteOAuthClientStore::new(pool.clone()),
            artifact_store: SqliteArtifactStore::new(pool.clone()),
            pool,
        }
    }

    /// Open `database_url`, creating the database file if it does not exist
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("SQLite connection failed: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl OAuthClientStore for SqliteOAuthStorage {
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
impl ArtifactStore for SqliteOAuthStorage {
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

impl OAuthStorage for SqliteOAuthStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::session::DefaultSession;
    use crate::oauth::types::Request;
    use chrono::{Duration, Utc};

    async fn create_test_storage() -> SqliteOAuthStorage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqliteOAuthStorage::new(pool);
        storage.migrate().await.unwrap();
        storage
    }

    fn request(request_id: &str) -> Request<DefaultSession> {
        let mut session = DefaultSession::new("user-1");
        session.username = "alice".to_string();
        let mut request = Request::new(request_id, "c1", session)
            .with_granted_scopes(["openid", "offline"])
            .with_expiry(Utc::now() + Duration::hours(1));
        request.requested_scopes = vec!["openid".to_string(), "offline".to_string()];
        request.requested_audience = vec!["https://api.example.com".to_string()];
        request
            .form
            .insert("grant_type".to_string(), vec!["authorization_code".to_string()]);
        request
    }

    #[tokio::test]
    async fn test_client_document_round_trip() {
        let storage = create_test_storage().await;
        let mut client = Client::new("c1");
        client.name = "Example".to_string();
        client.secret = "$argon2id$v=19$stub".to_string();
        client.redirect_uris = vec!["https://app.example.com/cb".to_string()];
        client.enable_scope_access(["openid", "offline"]);
        client.enable_tenant_access(["t1"]);
        client.public = false;

        storage.store_client(&client).await.unwrap();
        assert_eq!(storage.get_client("c1").await.unwrap(), Some(client.clone()));
        assert!(storage.store_client(&client).await.unwrap_err().is_conflict());

        let mut disabled = client.clone();
        disabled.disabled = true;
        storage.update_client(&client, &disabled).await.unwrap();
        assert!(storage.get_client("c1").await.unwrap().unwrap().disabled);

        // a writer holding the pre-disable snapshot must not clobber the flag
        let mut stale = client.clone();
        stale.name = "Stale".to_string();
        assert!(
            storage
                .update_client(&client, &stale)
                .await
                .unwrap_err()
                .is_conflict()
        );
        assert_eq!(storage.get_client("c1").await.unwrap(), Some(disabled.clone()));

        let filter = ClientFilter {
            tenant: Some("t1".to_string()),
            ..Default::default()
        };
        assert_eq!(storage.list_clients(&filter).await.unwrap().len(), 1);

        storage.delete_client("c1").await.unwrap();
        assert!(storage.delete_client("c1").await.unwrap_err().is_not_found());
        assert!(
            storage
                .update_client(&disabled, &disabled)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_artifact_round_trip() {
        let storage = create_test_storage().await;
        let original = request("req1");

        for kind in ArtifactKind::ALL {
            storage.create_session(kind, "sig", &original).await.unwrap();
            let loaded: Request<DefaultSession> = storage.get_session(kind, "sig").await.unwrap();
            assert_eq!(loaded, original);
        }
    }

    #[tokio::test]
    async fn test_duplicate_signature_conflicts() {
        let storage = create_test_storage().await;
        storage
            .create_access_token_session("sig", &request("req1"))
            .await
            .unwrap();
        let err = storage
            .create_access_token_session("sig", &request("req2"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let kept: Request<DefaultSession> =
            storage.get_access_token_session("sig").await.unwrap();
        assert_eq!(kept.request_id, "req1");
    }

    #[tokio::test]
    async fn test_delete_and_revoke_by_request_id() {
        let storage = create_test_storage().await;
        storage
            .create_refresh_token_session("r1", &request("req1"))
            .await
            .unwrap();
        storage
            .create_refresh_token_session("r2", &request("req1"))
            .await
            .unwrap();
        storage
            .create_refresh_token_session("r3", &request("req2"))
            .await
            .unwrap();

        assert!(
            storage
                .delete_refresh_token_session("missing")
                .await
                .unwrap_err()
                .is_not_found()
        );
        let deleted = storage
            .delete_sessions_by_request_id(ArtifactKind::RefreshToken, "req1")
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        storage
            .get_refresh_token_session::<DefaultSession>("r3")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expiry_and_purge() {
        let storage = create_test_storage().await;
        let expired = request("req1").with_expiry(Utc::now() - Duration::seconds(5));
        storage
            .create_authorize_code_session("old", &expired)
            .await
            .unwrap();
        storage
            .create_authorize_code_session("new", &request("req2"))
            .await
            .unwrap();

        assert!(matches!(
            storage
                .get_authorize_code_session::<DefaultSession>("old")
                .await
                .unwrap_err(),
            StorageError::Expired(_)
        ));

        let purged = storage
            .purge_expired_sessions(ArtifactKind::AuthorizeCode)
            .await
            .unwrap();
        assert_eq!(purged, 1);
        storage
            .get_authorize_code_session::<DefaultSession>("new")
            .await
            .unwrap();
    }
}
