//! Argon2id password hashing.
//!
//! Hashes are stored in PHC string format, so each record carries its own salt
//! and cost parameters. Both hashing and verification are CPU-bound and run on
//! the blocking pool.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::error::StoreError;

const SALT_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Hash `password` with a fresh random salt.
    pub async fn hash(&self, password: &str) -> Result<String, StoreError> {
        let params = self.params.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let mut salt = [0u8; SALT_BYTES];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            let salt = SaltString::encode_b64(&salt).map_err(|e| StoreError::Hash(e.to_string()))?;

            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| StoreError::Hash(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))?
    }

    /// Check `password` against a stored PHC hash string.
    ///
    /// A stored value that does not parse as a hash never verifies.
    pub async fn verify(&self, password: &str, stored: &str) -> Result<bool, StoreError> {
        let password = password.to_owned();
        let stored = stored.to_owned();

        tokio::task::spawn_blocking(move || match PasswordHash::new(&stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
        })
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(Params::new(8, 1, 1, None).unwrap())
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("hunter2").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("hunter2"));
        assert!(hasher.verify("hunter2", &hash).await.unwrap());
        assert!(!hasher.verify("hunter3", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let hasher = hasher();
        let a = hasher.hash("same").await.unwrap();
        let b = hasher.hash("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("", "").await.unwrap());
        assert!(!hasher.verify("pw", "not a hash").await.unwrap());
    }
}
