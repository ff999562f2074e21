//! OAuth 2.0 / OpenID Connect domain model: clients, grant artifacts, sessions and revocation.

pub mod client;
pub mod clients;
pub mod ordered_set;
pub mod revocation;
pub mod session;
pub mod types;

// Re-export frequently used items from each module
pub use crate::storage::{
    inmemory::MemoryOAuthStorage,
    traits::{ArtifactStore, OAuthClientStore, OAuthStorage, SessionStore},
};
pub use client::{Client, ClientFilter, OAuth2Client};
pub use clients::{Argon2SecretHasher, ClientRegistry, SecretHasher};
pub use ordered_set::OrderedSet;
pub use revocation::{RevocationCoordinator, RevocationReport};
pub use session::{DefaultSession, EncodedSession, Session};
pub use types::{
    ArtifactKind, Request, StoredRequest, generate_client_id, generate_client_secret,
    token_signature,
};
