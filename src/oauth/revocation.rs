//! Cascading revocation by request ID.
//!
//! One grant can leave several artifacts behind (token rotation, codes, PKCE and
//! OIDC records) that all share the grant's request ID. Revoking by request ID
//! deletes every one of them so no live token outlives its revoked sibling.

use crate::errors::{RevocationError, StorageError};
use crate::oauth::types::ArtifactKind;
use crate::storage::traits::OAuthStorage;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Artifacts removed by a revocation, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationReport {
    pub request_id: String,
    pub deleted: BTreeMap<ArtifactKind, usize>,
}

impl RevocationReport {
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Revocation Coordinator
pub struct RevocationCoordinator {
    storage: Arc<dyn OAuthStorage>,
}

impl RevocationCoordinator {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }

    /// Revoke every refresh token issued from `request_id`, then every other
    /// artifact of the same grant, access tokens first.
    pub async fn revoke_refresh_token(
        &self,
        request_id: &str,
    ) -> Result<RevocationReport, RevocationError> {
        self.revoke(
            ArtifactKind::RefreshToken,
            &[
                ArtifactKind::AccessToken,
                ArtifactKind::AuthorizeCode,
                ArtifactKind::Pkce,
                ArtifactKind::OpenIdSession,
            ],
            request_id,
        )
        .await
    }

    /// Revoke every access token issued from `request_id`.
    pub async fn revoke_access_token(
        &self,
        request_id: &str,
    ) -> Result<RevocationReport, RevocationError> {
        self.revoke(ArtifactKind::AccessToken, &[], request_id)
            .await
    }

    /// Remove every artifact of every kind issued from `request_id`.
    /// Used for logout and client-initiated grant teardown.
    pub async fn revoke_request(
        &self,
        request_id: &str,
    ) -> Result<RevocationReport, RevocationError> {
        let cascade: Vec<ArtifactKind> = ArtifactKind::ALL
            .into_iter()
            .filter(|kind| *kind != ArtifactKind::RefreshToken)
            .collect();
        self.revoke(ArtifactKind::RefreshToken, &cascade, request_id)
            .await
    }

    /// Delete `target` first, then each `cascade` kind. Every kind is attempted
    /// even after a failure; any failure is reported, never success.
    async fn revoke(
        &self,
        target: ArtifactKind,
        cascade: &[ArtifactKind],
        request_id: &str,
    ) -> Result<RevocationReport, RevocationError> {
        let mut report = RevocationReport {
            request_id: request_id.to_string(),
            ..Default::default()
        };

        let target_error = match self
            .storage
            .delete_sessions_by_request_id(target, request_id)
            .await
        {
            Ok(count) => {
                report.deleted.insert(target, count);
                None
            }
            Err(err) => Some(err),
        };

        let mut failed: Vec<(ArtifactKind, StorageError)> = Vec::new();
        for &kind in cascade {
            match self
                .storage
                .delete_sessions_by_request_id(kind, request_id)
                .await
            {
                Ok(count) => {
                    report.deleted.insert(kind, count);
                }
                Err(err) => {
                    tracing::error!(
                        request_id,
                        %kind,
                        error = ?err,
                        "cascading revocation failed, artifacts may remain valid"
                    );
                    failed.push((kind, err));
                }
            }
        }

        if let Some(source) = target_error {
            tracing::error!(request_id, kind = %target, error = ?source, "revocation failed");
            return Err(RevocationError::TargetFailed {
                kind: target,
                request_id: request_id.to_string(),
                source,
            });
        }

        if !failed.is_empty() {
            return Err(RevocationError::Incomplete {
                request_id: request_id.to_string(),
                failed,
            });
        }

        tracing::info!(request_id, kind = %target, deleted = report.total(), "request revoked");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::client::{Client, ClientFilter};
    use crate::oauth::session::DefaultSession;
    use crate::oauth::types::{Request, StoredRequest};
    use crate::storage::inmemory::MemoryOAuthStorage;
    use crate::storage::traits::{
        ArtifactStore, OAuthClientStore, Result as StorageResult, SessionStore,
    };
    use async_trait::async_trait;

    fn request(request_id: &str) -> Request<DefaultSession> {
        Request::new(request_id, "c1", DefaultSession::new("user-1"))
    }

    #[tokio::test]
    async fn test_refresh_revocation_cascades_to_every_kind() {
        let storage = Arc::new(MemoryOAuthStorage::new());
        for kind in ArtifactKind::ALL {
            storage
                .create_session(kind, &format!("{}-a", kind), &request("req1"))
                .await
                .unwrap();
            storage
                .create_session(kind, &format!("{}-b", kind), &request("req2"))
                .await
                .unwrap();
        }
        storage
            .create_refresh_token_session("rotated", &request("req1"))
            .await
            .unwrap();

        let coordinator = RevocationCoordinator::new(storage.clone());
        let report = coordinator.revoke_refresh_token("req1").await.unwrap();
        assert_eq!(report.deleted[&ArtifactKind::RefreshToken], 2);
        assert_eq!(report.total(), 6);

        for kind in ArtifactKind::ALL {
            let gone = storage
                .get_session::<DefaultSession>(kind, &format!("{}-a", kind))
                .await;
            assert!(gone.unwrap_err().is_not_found());
            storage
                .get_session::<DefaultSession>(kind, &format!("{}-b", kind))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_access_revocation_leaves_refresh_tokens() {
        let storage = Arc::new(MemoryOAuthStorage::new());
        storage
            .create_access_token_session("at-1", &request("req1"))
            .await
            .unwrap();
        storage
            .create_access_token_session("at-2", &request("req1"))
            .await
            .unwrap();
        storage
            .create_refresh_token_session("rt-1", &request("req1"))
            .await
            .unwrap();

        let coordinator = RevocationCoordinator::new(storage.clone());
        let report = coordinator.revoke_access_token("req1").await.unwrap();
        assert_eq!(report.total(), 2);

        storage
            .get_refresh_token_session::<DefaultSession>("rt-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_revoke_request_clears_all_kinds() {
        let storage = Arc::new(MemoryOAuthStorage::new());
        for kind in ArtifactKind::ALL {
            storage
                .create_session(kind, "sig", &request("req1"))
                .await
                .unwrap();
        }

        let coordinator = RevocationCoordinator::new(storage.clone());
        let report = coordinator.revoke_request("req1").await.unwrap();
        assert_eq!(report.deleted.len(), ArtifactKind::ALL.len());
        assert_eq!(report.total(), ArtifactKind::ALL.len());
        for kind in ArtifactKind::ALL {
            assert_eq!(report.deleted[&kind], 1, "{} not revoked", kind);
            assert!(
                storage
                    .get_session::<DefaultSession>(kind, "sig")
                    .await
                    .unwrap_err()
                    .is_not_found()
            );
        }
    }

    #[tokio::test]
    async fn test_revoke_request_attempts_every_kind_on_failure() {
        for failing in ArtifactKind::ALL {
            let storage = Arc::new(FailingStorage {
                inner: MemoryOAuthStorage::new(),
                failing,
            });
            for kind in ArtifactKind::ALL {
                storage
                    .create_session(kind, "sig", &request("req1"))
                    .await
                    .unwrap();
            }

            let coordinator = RevocationCoordinator::new(storage.clone());
            assert!(coordinator.revoke_request("req1").await.is_err());

            for kind in ArtifactKind::ALL {
                let result = storage.get_session::<DefaultSession>(kind, "sig").await;
                if kind == failing {
                    result.unwrap();
                } else {
                    assert!(result.unwrap_err().is_not_found(), "{} survived", kind);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_an_error() {
        let coordinator = RevocationCoordinator::new(Arc::new(MemoryOAuthStorage::new()));
        let report = coordinator.revoke_refresh_token("nothing").await.unwrap();
        assert_eq!(report.total(), 0);
    }

    /// Wraps the memory store and fails bulk deletes for one kind.
    struct FailingStorage {
        inner: MemoryOAuthStorage,
        failing: ArtifactKind,
    }

    #[async_trait]
    impl OAuthClientStore for FailingStorage {
        async fn store_client(&self, client: &Client) -> StorageResult<()> {
            self.inner.store_client(client).await
        }

        async fn get_client(&self, client_id: &str) -> StorageResult<Option<Client>> {
            self.inner.get_client(client_id).await
        }

        async fn update_client(&self, current: &Client, updated: &Client) -> StorageResult<()> {
            self.inner.update_client(current, updated).await
        }

        async fn delete_client(&self, client_id: &str) -> StorageResult<()> {
            self.inner.delete_client(client_id).await
        }

        async fn list_clients(&self, filter: &ClientFilter) -> StorageResult<Vec<Client>> {
            self.inner.list_clients(filter).await
        }
    }

    #[async_trait]
    impl ArtifactStore for FailingStorage {
        async fn store_artifact(
            &self,
            kind: ArtifactKind,
            signature: &str,
            request: &StoredRequest,
        ) -> StorageResult<()> {
            self.inner.store_artifact(kind, signature, request).await
        }

        async fn get_artifact(
            &self,
            kind: ArtifactKind,
            signature: &str,
        ) -> StorageResult<StoredRequest> {
            self.inner.get_artifact(kind, signature).await
        }

        async fn delete_artifact(&self, kind: ArtifactKind, signature: &str) -> StorageResult<()> {
            self.inner.delete_artifact(kind, signature).await
        }

        async fn delete_sessions_by_request_id(
            &self,
            kind: ArtifactKind,
            request_id: &str,
        ) -> StorageResult<usize> {
            if kind == self.failing {
                return Err(StorageError::Unavailable("connection reset".to_string()));
            }
            self.inner
                .delete_sessions_by_request_id(kind, request_id)
                .await
        }

        async fn purge_expired_sessions(&self, kind: ArtifactKind) -> StorageResult<usize> {
            self.inner.purge_expired_sessions(kind).await
        }
    }

    impl OAuthStorage for FailingStorage {}

    #[tokio::test]
    async fn test_cascade_failure_is_reported() {
        let storage = Arc::new(FailingStorage {
            inner: MemoryOAuthStorage::new(),
            failing: ArtifactKind::AccessToken,
        });
        storage
            .create_refresh_token_session("rt-1", &request("req1"))
            .await
            .unwrap();
        storage
            .create_access_token_session("at-1", &request("req1"))
            .await
            .unwrap();

        let coordinator = RevocationCoordinator::new(storage.clone());
        let result = coordinator.revoke_refresh_token("req1").await;
        match result {
            Err(RevocationError::Incomplete { request_id, failed }) => {
                assert_eq!(request_id, "req1");
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, ArtifactKind::AccessToken);
            }
            other => panic!("expected Incomplete, got {:?}", other),
        }

        // the refresh token itself is gone even though the cascade failed
        assert!(
            storage
                .get_refresh_token_session::<DefaultSession>("rt-1")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_target_failure_still_attempts_cascade() {
        let storage = Arc::new(FailingStorage {
            inner: MemoryOAuthStorage::new(),
            failing: ArtifactKind::RefreshToken,
        });
        storage
            .create_access_token_session("at-1", &request("req1"))
            .await
            .unwrap();

        let coordinator = RevocationCoordinator::new(storage.clone());
        let result = coordinator.revoke_refresh_token("req1").await;
        assert!(matches!(
            result,
            Err(RevocationError::TargetFailed {
                kind: ArtifactKind::RefreshToken,
                ..
            })
        ));
        assert!(
            storage
                .get_access_token_session::<DefaultSession>("at-1")
                .await
                .is_err()
        );
    }
}
