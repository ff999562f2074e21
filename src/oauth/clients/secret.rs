//! One-way client secret hashing.

use crate::errors::ClientError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hashes client secrets and verifies cleartext against a stored hash.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, ClientError>;

    /// Returns `Ok(false)` on mismatch and `Err` only when the stored hash is unusable.
    fn verify(&self, hashed: &str, secret: &str) -> Result<bool, ClientError>;
}

/// Argon2id with a random salt, stored as a PHC string
#[derive(Default)]
pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl Argon2SecretHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> Result<String, ClientError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| ClientError::SecretHashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, hashed: &str, secret: &str) -> Result<bool, ClientError> {
        let parsed = PasswordHash::new(hashed).map_err(|e| {
            tracing::error!(error = %e, "failed to parse stored secret hash");
            ClientError::SecretHashingFailed(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2SecretHasher::new();
        let hashed = hasher.hash("s3cr3t").unwrap();

        assert_ne!(hashed, "s3cr3t");
        assert!(hashed.starts_with("$argon2id$"));
        assert!(hasher.verify(&hashed, "s3cr3t").unwrap());
        assert!(!hasher.verify(&hashed, "wrong").unwrap());
    }

    #[test]
    fn test_salted() {
        let hasher = Argon2SecretHasher::new();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_unusable_hash() {
        let hasher = Argon2SecretHasher::new();
        assert!(matches!(
            hasher.verify("plaintext-not-a-hash", "x"),
            Err(ClientError::SecretHashingFailed(_))
        ));
    }
}
