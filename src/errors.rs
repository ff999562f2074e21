//! Standardized error types following the `error-grant-store-<domain>-<number>` format.

use crate::oauth::types::ArtifactKind;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-grant-store-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when version information is not available
    #[error("error-grant-store-config-2 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-grant-store-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a numeric setting cannot be parsed
    #[error("error-grant-store-config-4 Failed to parse number '{0}': {1:?}")]
    NumberParsingFailed(String, std::num::ParseIntError),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-grant-store-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-grant-store-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-grant-store-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when data validation fails
    #[error("error-grant-store-storage-4 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-grant-store-storage-5 Not found: {0}")]
    NotFound(String),

    /// Error when a record with the same key already exists
    #[error("error-grant-store-storage-6 Conflict: {0}")]
    Conflict(String),

    /// Error when an artifact exists but is past its validity
    #[error("error-grant-store-storage-7 Expired: {0}")]
    Expired(String),

    /// Error when a stored session payload cannot be decoded
    #[error("error-grant-store-storage-8 Malformed session payload: {0}")]
    Malformed(String),

    /// Error when the underlying store cannot be reached
    #[error("error-grant-store-storage-9 Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// True for lookups that the protocol layer treats as "no such artifact".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_) | StorageError::Expired(_))
    }

    /// True when the record key is already taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }

    /// OAuth 2.0 error code a token endpoint should answer with for this failure.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) | StorageError::Expired(_) => "invalid_grant",
            StorageError::Unavailable(_) | StorageError::ConnectionFailed(_) => {
                "temporarily_unavailable"
            }
            _ => "server_error",
        }
    }
}

/// Client registry errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid client metadata
    #[error("error-grant-store-client-1 Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Invalid redirect URI
    #[error("error-grant-store-client-2 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Client has been disabled
    #[error("error-grant-store-client-3 Client disabled: {0}")]
    ClientDisabled(String),

    /// Client secret did not verify
    #[error("error-grant-store-client-4 Client authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Secret hashing or verification could not run
    #[error("error-grant-store-client-5 Secret hashing failed: {0}")]
    SecretHashingFailed(String),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Cascading revocation errors
#[derive(Debug, Error)]
pub enum RevocationError {
    /// Artifacts of the revoked kind itself could not be deleted
    #[error("error-grant-store-revocation-1 Revoking {kind} for request {request_id} failed: {source}")]
    TargetFailed {
        kind: ArtifactKind,
        request_id: String,
        #[source]
        source: StorageError,
    },

    /// The target was revoked but dependent artifacts may still be live
    #[error(
        "error-grant-store-revocation-2 Revocation for request {request_id} incomplete, failed kinds: {failed:?}"
    )]
    Incomplete {
        request_id: String,
        failed: Vec<(ArtifactKind, StorageError)>,
    },
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
impl StorageError {
    /// Map a sqlx error, turning unique violations into `Conflict` and
    /// connectivity failures into `Unavailable`.
    pub(crate) fn from_sqlx(err: sqlx::Error, context: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StorageError::Conflict(context.to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => {
                StorageError::Unavailable(format!("{}: {}", context, err))
            }
            _ => StorageError::QueryFailed(format!("{}: {}", context, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_error_mapping() {
        assert_eq!(
            StorageError::NotFound("sig".to_string()).oauth_error(),
            "invalid_grant"
        );
        assert_eq!(
            StorageError::Expired("sig".to_string()).oauth_error(),
            "invalid_grant"
        );
        assert_eq!(
            StorageError::Unavailable("down".to_string()).oauth_error(),
            "temporarily_unavailable"
        );
        assert_eq!(
            StorageError::Malformed("bad".to_string()).oauth_error(),
            "server_error"
        );
        assert!(StorageError::Expired("sig".to_string()).is_not_found());
        assert!(!StorageError::Conflict("sig".to_string()).is_not_found());
    }
}
