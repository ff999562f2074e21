//! Storage trait definitions for OAuth clients and grant artifacts.
//!
//! Defines async storage interfaces that can be implemented by various backend
//! providers, plus the typed session surface the protocol layer calls.

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::oauth::session::Session;
use crate::oauth::types::{ArtifactKind, Request, StoredRequest};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

// ===== OAuth Core Storage Traits =====

/// Trait for storing and retrieving OAuth clients
#[async_trait]
pub trait OAuthClientStore: Send + Sync {
    /// Store a new OAuth client; `Conflict` if the ID is taken
    async fn store_client(&self, client: &Client) -> Result<()>;

    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;

    /// Replace `current` with `updated` (same ID) only if the stored record
    /// still equals `current`; `Conflict` if it changed since it was read,
    /// `NotFound` if absent
    async fn update_client(&self, current: &Client, updated: &Client) -> Result<()>;

    /// Delete a client; `NotFound` if absent
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// List clients matching `filter`, ordered by ID
    async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<Client>>;
}

/// Signature-keyed artifact storage, one namespace per [`ArtifactKind`].
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist a new artifact; `Conflict` if `(kind, signature)` exists
    async fn store_artifact(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &StoredRequest,
    ) -> Result<()>;

    /// Exact-signature lookup; `NotFound` if absent, `Expired` if past validity
    async fn get_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<StoredRequest>;

    /// Delete by signature; `NotFound` if absent
    async fn delete_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<()>;

    /// Delete every artifact of `kind` issued from `request_id`
    async fn delete_sessions_by_request_id(
        &self,
        kind: ArtifactKind,
        request_id: &str,
    ) -> Result<usize>;

    /// Physically remove expired artifacts of `kind`
    async fn purge_expired_sessions(&self, kind: ArtifactKind) -> Result<usize>;
}

/// Typed session operations over any [`ArtifactStore`].
///
/// The per-kind methods are the capability surface the protocol layer expects;
/// all of them go through the generic `create_session` / `get_session` /
/// `delete_session`.
#[async_trait]
pub trait SessionStore: ArtifactStore {
    async fn create_session<S: Session>(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        let stored = request.encode()?;
        tracing::debug!(%kind, signature, request_id = %stored.request_id, "creating session");
        self.store_artifact(kind, signature, &stored).await
    }

    async fn get_session<S: Session>(
        &self,
        kind: ArtifactKind,
        signature: &str,
    ) -> Result<Request<S>> {
        self.get_artifact(kind, signature).await?.decode()
    }

    async fn delete_session(&self, kind: ArtifactKind, signature: &str) -> Result<()> {
        tracing::debug!(%kind, signature, "deleting session");
        self.delete_artifact(kind, signature).await
    }

    async fn create_access_token_session<S: Session>(
        &self,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        self.create_session(ArtifactKind::AccessToken, signature, request)
            .await
    }

    async fn get_access_token_session<S: Session>(&self, signature: &str) -> Result<Request<S>> {
        self.get_session(ArtifactKind::AccessToken, signature).await
    }

    async fn delete_access_token_session(&self, signature: &str) -> Result<()> {
        self.delete_session(ArtifactKind::AccessToken, signature)
            .await
    }

    async fn create_refresh_token_session<S: Session>(
        &self,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        self.create_session(ArtifactKind::RefreshToken, signature, request)
            .await
    }

    async fn get_refresh_token_session<S: Session>(&self, signature: &str) -> Result<Request<S>> {
        self.get_session(ArtifactKind::RefreshToken, signature)
            .await
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<()> {
        self.delete_session(ArtifactKind::RefreshToken, signature)
            .await
    }

    async fn create_authorize_code_session<S: Session>(
        &self,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        self.create_session(ArtifactKind::AuthorizeCode, signature, request)
            .await
    }

    async fn get_authorize_code_session<S: Session>(&self, signature: &str) -> Result<Request<S>> {
        self.get_session(ArtifactKind::AuthorizeCode, signature)
            .await
    }

    async fn delete_authorize_code_session(&self, signature: &str) -> Result<()> {
        self.delete_session(ArtifactKind::AuthorizeCode, signature)
            .await
    }

    async fn create_pkce_request_session<S: Session>(
        &self,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        self.create_session(ArtifactKind::Pkce, signature, request)
            .await
    }

    async fn get_pkce_request_session<S: Session>(&self, signature: &str) -> Result<Request<S>> {
        self.get_session(ArtifactKind::Pkce, signature).await
    }

    async fn delete_pkce_request_session(&self, signature: &str) -> Result<()> {
        self.delete_session(ArtifactKind::Pkce, signature).await
    }

    async fn create_openid_connect_session<S: Session>(
        &self,
        signature: &str,
        request: &Request<S>,
    ) -> Result<()> {
        self.create_session(ArtifactKind::OpenIdSession, signature, request)
            .await
    }

    async fn get_openid_connect_session<S: Session>(&self, signature: &str) -> Result<Request<S>> {
        self.get_session(ArtifactKind::OpenIdSession, signature)
            .await
    }

    async fn delete_openid_connect_session(&self, signature: &str) -> Result<()> {
        self.delete_session(ArtifactKind::OpenIdSession, signature)
            .await
    }
}

impl<T: ArtifactStore + ?Sized> SessionStore for T {}

// ===== Combined Storage Trait =====

/// Combined OAuth storage trait
pub trait OAuthStorage: OAuthClientStore + ArtifactStore + Send + Sync {}
