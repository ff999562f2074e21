//! Client registry: administrative CRUD and authentication over client records.
//!
//! Validates client metadata, hashes secrets before they reach storage, and
//! applies scope/tenant membership edits.

use crate::errors::{ClientError, StorageError};
use crate::oauth::client::{CLIENT_CREDENTIALS_GRANT, Client, ClientFilter};
use crate::oauth::clients::secret::{Argon2SecretHasher, SecretHasher};
use crate::storage::traits::OAuthStorage;
use std::sync::Arc;
use url::Url;

/// Default minimum length of a cleartext client secret
pub const DEFAULT_SECRET_MIN_LENGTH: usize = 6;

/// Read-modify-write attempts before a contended client update gives up
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Client Registry Service
pub struct ClientRegistry {
    storage: Arc<dyn OAuthStorage>,
    hasher: Arc<dyn SecretHasher>,
    /// Minimum cleartext secret length accepted on create/update
    secret_min_length: usize,
}

impl ClientRegistry {
    /// Create a new client registry using Argon2 secret hashing
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self {
            storage,
            hasher: Arc::new(Argon2SecretHasher::new()),
            secret_min_length: DEFAULT_SECRET_MIN_LENGTH,
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_secret_min_length(mut self, secret_min_length: usize) -> Self {
        self.secret_min_length = secret_min_length;
        self
    }

    /// Register a new client. The cleartext secret is hashed before it is
    /// persisted; the returned client carries the hash.
    pub async fn create_client(&self, mut client: Client) -> Result<Client, ClientError> {
        self.validate(&client)?;

        if client.public {
            if !client.secret.is_empty() {
                return Err(ClientError::InvalidClientMetadata(
                    "public clients must not have a secret".to_string(),
                ));
            }
        } else if !client.secret.is_empty() {
            client.secret = self.hash_secret(client.secret).await?;
        }

        self.storage.store_client(&client).await?;
        tracing::info!(client_id = %client.id, public = client.public, "client created");
        Ok(client)
    }

    /// Retrieve a client regardless of its disabled flag
    pub async fn get_client(&self, client_id: &str) -> Result<Client, ClientError> {
        self.storage
            .get_client(client_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("client {}", client_id)).into())
    }

    /// Retrieve a client for grant and token operations; disabled clients fail.
    pub async fn get_active_client(&self, client_id: &str) -> Result<Client, ClientError> {
        let client = self.get_client(client_id).await?;
        if client.disabled {
            return Err(ClientError::ClientDisabled(client.id));
        }
        Ok(client)
    }

    /// Replace a client record.
    ///
    /// An empty secret, or the stored hash passed back unchanged, keeps the
    /// stored hash. Any other secret is treated as new cleartext and hashed.
    /// Marking a client public clears its secret.
    pub async fn update_client(&self, client: Client) -> Result<Client, ClientError> {
        self.validate(&client)?;
        let mut rotated: Option<String> = None;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.get_client(&client.id).await?;
            let mut updated = client.clone();

            if updated.public {
                if !updated.secret.is_empty() && updated.secret != current.secret {
                    return Err(ClientError::InvalidClientMetadata(
                        "public clients must not have a secret".to_string(),
                    ));
                }
                updated.secret.clear();
            } else if updated.secret.is_empty() || updated.secret == current.secret {
                updated.secret = current.secret.clone();
            } else {
                // hash once, even when the write is retried
                if rotated.is_none() {
                    rotated = Some(self.hash_secret(client.secret.clone()).await?);
                }
                updated.secret = rotated.clone().unwrap_or_default();
            }

            match self.storage.update_client(&current, &updated).await {
                Ok(()) => {
                    tracing::info!(client_id = %updated.id, "client updated");
                    return Ok(updated);
                }
                Err(StorageError::Conflict(_)) => {
                    tracing::debug!(client_id = %client.id, attempt, "client changed concurrently, retrying update");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(Self::contended(&client.id))
    }

    pub async fn delete_client(&self, client_id: &str) -> Result<(), ClientError> {
        self.storage.delete_client(client_id).await?;
        tracing::info!(client_id, "client deleted");
        Ok(())
    }

    pub async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<Client>, ClientError> {
        Ok(self.storage.list_clients(filter).await?)
    }

    /// Verify a client's credentials. Public clients authenticate without a
    /// secret; confidential ones are checked against the stored hash only.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        secret: &str,
    ) -> Result<Client, ClientError> {
        let client = self.get_active_client(client_id).await?;
        if client.public {
            return Ok(client);
        }
        if client.secret.is_empty() || secret.is_empty() {
            tracing::warn!(client_id, "client authentication without a secret");
            return Err(ClientError::AuthenticationFailed(client_id.to_string()));
        }

        let hasher = self.hasher.clone();
        let hashed = client.secret.clone();
        let secret = secret.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&hashed, &secret))
            .await
            .map_err(|e| ClientError::SecretHashingFailed(e.to_string()))??;

        if !verified {
            tracing::warn!(client_id, "client secret validation failed");
            return Err(ClientError::AuthenticationFailed(client_id.to_string()));
        }
        Ok(client)
    }

    pub async fn enable_scope_access(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<Client, ClientError> {
        self.modify(client_id, |client| client.enable_scope_access(scopes.iter().cloned()))
            .await
    }

    pub async fn disable_scope_access(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<Client, ClientError> {
        self.modify(client_id, |client| client.disable_scope_access(scopes))
            .await
    }

    pub async fn enable_tenant_access(
        &self,
        client_id: &str,
        tenant_ids: &[String],
    ) -> Result<Client, ClientError> {
        self.modify(client_id, |client| {
            client.enable_tenant_access(tenant_ids.iter().cloned())
        })
        .await
    }

    pub async fn disable_tenant_access(
        &self,
        client_id: &str,
        tenant_ids: &[String],
    ) -> Result<Client, ClientError> {
        self.modify(client_id, |client| client.disable_tenant_access(tenant_ids))
            .await
    }

    pub async fn disable_client(&self, client_id: &str) -> Result<Client, ClientError> {
        self.set_disabled(client_id, true).await
    }

    pub async fn enable_client(&self, client_id: &str) -> Result<Client, ClientError> {
        self.set_disabled(client_id, false).await
    }

    /// Explicitly disable or re-enable a client without removing it.
    pub async fn set_disabled(&self, client_id: &str, disabled: bool) -> Result<Client, ClientError> {
        let client = self
            .modify(client_id, |client| client.disabled = disabled)
            .await?;
        tracing::info!(client_id, disabled, "client access changed");
        Ok(client)
    }

    /// Load, mutate and write back a client. Skips the write when nothing
    /// changed. The write only lands if the record is still the one that was
    /// read; otherwise the mutation is replayed on a fresh read.
    async fn modify<F>(&self, client_id: &str, mutate: F) -> Result<Client, ClientError>
    where
        F: Fn(&mut Client),
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.get_client(client_id).await?;
            let mut updated = current.clone();
            mutate(&mut updated);
            if updated == current {
                return Ok(current);
            }

            match self.storage.update_client(&current, &updated).await {
                Ok(()) => return Ok(updated),
                Err(StorageError::Conflict(_)) => {
                    tracing::debug!(client_id, attempt, "client changed concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(Self::contended(client_id))
    }

    fn contended(client_id: &str) -> ClientError {
        tracing::warn!(client_id, "client update abandoned after repeated concurrent changes");
        StorageError::Conflict(format!(
            "client {} kept changing after {} attempts",
            client_id, MAX_UPDATE_ATTEMPTS
        ))
        .into()
    }

    fn validate(&self, client: &Client) -> Result<(), ClientError> {
        if client.id.trim().is_empty() {
            return Err(ClientError::InvalidClientMetadata(
                "client id must not be empty".to_string(),
            ));
        }

        if client.public
            && client
                .grant_types
                .iter()
                .any(|g| g == CLIENT_CREDENTIALS_GRANT)
        {
            return Err(ClientError::InvalidClientMetadata(
                "public clients cannot use the client_credentials grant".to_string(),
            ));
        }

        for redirect_uri in &client.redirect_uris {
            Url::parse(redirect_uri).map_err(|e| {
                ClientError::InvalidRedirectUri(format!("{}: {}", redirect_uri, e))
            })?;
        }

        Ok(())
    }

    async fn hash_secret(&self, secret: String) -> Result<String, ClientError> {
        if secret.len() < self.secret_min_length {
            return Err(ClientError::InvalidClientMetadata(format!(
                "client secret must be at least {} characters",
                self.secret_min_length
            )));
        }
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| ClientError::SecretHashingFailed(e.to_string()))?
    }
}
