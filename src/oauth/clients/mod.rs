//! OAuth client management.
//!
//! Client registry service and one-way secret hashing.

pub mod registry;
pub mod secret;

// Re-export main types and services
pub use registry::ClientRegistry;
pub use secret::{Argon2SecretHasher, SecretHasher};
