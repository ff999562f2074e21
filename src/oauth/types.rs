//! OAuth artifact types and data structures.
//!
//! Defines the artifact kinds, the persisted request record, and token helpers.

use crate::errors::StorageError;
use crate::oauth::session::{self, EncodedSession, Session};
use base64::prelude::*;
use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of artifacts produced by grant flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    AccessToken,
    RefreshToken,
    AuthorizeCode,
    Pkce,
    OpenIdSession,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::AccessToken,
        ArtifactKind::RefreshToken,
        ArtifactKind::AuthorizeCode,
        ArtifactKind::Pkce,
        ArtifactKind::OpenIdSession,
    ];

    /// Position in [`ArtifactKind::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Backing table (SQL) for this kind
    pub fn table_name(self) -> &'static str {
        match self {
            ArtifactKind::AccessToken => "access_tokens",
            ArtifactKind::RefreshToken => "refresh_tokens",
            ArtifactKind::AuthorizeCode => "authorize_codes",
            ArtifactKind::Pkce => "pkce_requests",
            ArtifactKind::OpenIdSession => "openid_sessions",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::AccessToken => "access_token",
            ArtifactKind::RefreshToken => "refresh_token",
            ArtifactKind::AuthorizeCode => "authorize_code",
            ArtifactKind::Pkce => "pkce",
            ArtifactKind::OpenIdSession => "openid_session",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StorageError::InvalidData(format!("Unknown artifact kind: {}", s)))
    }
}

/// Grant request an artifact was issued from, with a typed session.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<S> {
    /// Correlation ID shared by every artifact issued from one grant
    pub request_id: String,
    /// When the authorization request was made
    pub requested_at: DateTime<Utc>,
    /// Client the artifact was issued to
    pub client_id: String,
    pub requested_scopes: Vec<String>,
    pub granted_scopes: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    /// Submitted form values
    pub form: BTreeMap<String, Vec<String>>,
    /// Artifact validity; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub session: S,
}

impl<S: Session> Request<S> {
    pub fn new(request_id: impl Into<String>, client_id: impl Into<String>, session: S) -> Self {
        Self {
            request_id: request_id.into(),
            // SQL backends keep microsecond precision
            requested_at: Utc::now().trunc_subsecs(6),
            client_id: client_id.into(),
            requested_scopes: Vec::new(),
            granted_scopes: Vec::new(),
            requested_audience: Vec::new(),
            granted_audience: Vec::new(),
            form: BTreeMap::new(),
            expires_at: None,
            session,
        }
    }

    pub fn with_granted_scopes<I, T>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.granted_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at.trunc_subsecs(6));
        self
    }

    /// Encode into the persisted record shape.
    pub fn encode(&self) -> Result<StoredRequest, StorageError> {
        Ok(StoredRequest {
            request_id: self.request_id.clone(),
            requested_at: self.requested_at,
            client_id: self.client_id.clone(),
            requested_scopes: self.requested_scopes.clone(),
            granted_scopes: self.granted_scopes.clone(),
            requested_audience: self.requested_audience.clone(),
            granted_audience: self.granted_audience.clone(),
            form: self.form.clone(),
            expires_at: self.expires_at,
            session: session::encode(&self.session)?,
        })
    }
}

/// Artifact record as persisted by the storage backends
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRequest {
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    pub requested_scopes: Vec<String>,
    pub granted_scopes: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    pub form: BTreeMap<String, Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub session: EncodedSession,
}

impl StoredRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Reject expired records on read. Expired rows stay in place for the purge job.
    pub fn ensure_live(self, kind: ArtifactKind, signature: &str) -> Result<Self, StorageError> {
        if self.is_expired(Utc::now()) {
            tracing::debug!(%kind, signature, "artifact expired");
            return Err(StorageError::Expired(format!("{} {}", kind, signature)));
        }
        Ok(self)
    }

    /// Decode the session into `S`.
    pub fn decode<S: Session>(self) -> Result<Request<S>, StorageError> {
        let session = session::decode(&self.session)?;
        Ok(Request {
            request_id: self.request_id,
            requested_at: self.requested_at,
            client_id: self.client_id,
            requested_scopes: self.requested_scopes,
            granted_scopes: self.granted_scopes,
            requested_audience: self.requested_audience,
            granted_audience: self.granted_audience,
            form: self.form,
            expires_at: self.expires_at,
            session,
        })
    }
}

/// Storage key for a raw token or code: SHA-256, base64url without padding.
pub fn token_signature(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a secure random client secret
pub fn generate_client_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a client ID
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}
