//! In-memory OAuth storage implementation
//!
//! One map per artifact kind plus the client map. Every operation takes a single
//! lock, so create-if-absent and delete-if-present are atomic per namespace.

use crate::errors::StorageError;
use crate::oauth::client::{Client, ClientFilter};
use crate::oauth::types::{ArtifactKind, StoredRequest};
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

type ArtifactMap = HashMap<String, StoredRequest>;

/// In-memory implementation for OAuth storage
#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: Mutex<HashMap<String, Client>>,
    artifacts: [Mutex<ArtifactMap>; 5],
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> Result<MutexGuard<'_, HashMap<String, Client>>> {
        self.clients
            .lock()
            .map_err(|e| StorageError::QueryFailed(format!("Lock error: {}", e)))
    }

    fn artifacts(&self, kind: ArtifactKind) -> Result<MutexGuard<'_, ArtifactMap>> {
        self.artifacts[kind.index()]
            .lock()
            .map_err(|e| StorageError::QueryFailed(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl OAuthClientStore for MemoryOAuthStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients()?;
        match clients.entry(client.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(format!(
                "client {} already exists",
                client.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(())
            }
        }
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(self.clients()?.get(client_id).cloned())
    }

    async fn update_client(&self, current: &Client, updated: &Client) -> Result<()> {
        let mut clients = self.clients()?;
        match clients.get_mut(&updated.id) {
            Some(existing) if existing == current => {
                *existing = updated.clone();
                Ok(())
            }
            Some(_) => Err(StorageError::Conflict(format!(
                "client {} changed concurrently",
                updated.id
            ))),
            None => Err(StorageError::NotFound(format!("client {}", updated.id))),
        }
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        self.clients()?
            .remove(client_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("client {}", client_id)))
    }

    async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<Client>> {
        let clients = self.clients()?;
        Ok(filter.apply(clients.values().cloned()))
    }
}

#[async_trait]
impl ArtifactStore for MemoryOAuthStorage {
    async fn store_artifact(
        &self,
        kind: ArtifactKind,
        signature: &str,
        request: &StoredRequest,
    ) -> Result<()> {
        let mut artifacts = self.artifacts(kind)?;
        match artifacts.entry(signature.to_string()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(format!(
                "{} {} already exists",
                kind, signature
            ))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    async fn get_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<StoredRequest> {
        let stored = self
            .artifacts(kind)?
            .get(signature)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{} {}", kind, signature)))?;
        stored.ensure_live(kind, signature)
    }

    async fn delete_artifact(&self, kind: ArtifactKind, signature: &str) -> Result<()> {
        self.artifacts(kind)?
            .remove(signature)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("{} {}", kind, signature)))
    }

    async fn delete_sessions_by_request_id(
        &self,
        kind: ArtifactKind,
        request_id: &str,
    ) -> Result<usize> {
        let mut artifacts = self.artifacts(kind)?;
        let before = artifacts.len();
        artifacts.retain(|_, stored| stored.request_id != request_id);
        Ok(before - artifacts.len())
    }

    async fn purge_expired_sessions(&self, kind: ArtifactKind) -> Result<usize> {
        let now = Utc::now();
        let mut artifacts = self.artifacts(kind)?;
        let before = artifacts.len();
        artifacts.retain(|_, stored| !stored.is_expired(now));
        Ok(before - artifacts.len())
    }
}

impl OAuthStorage for MemoryOAuthStorage {}
