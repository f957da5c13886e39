//! Credential store: one password hash per user under `authDir/users/`.

use crate::auth::password::PasswordHasher;
use crate::error::{AuthError, StoreError};

use super::{is_valid_key, RecordDir};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    records: RecordDir,
    hasher: PasswordHasher,
}

impl CredentialStore {
    pub fn new(records: RecordDir, hasher: PasswordHasher) -> Self {
        Self { records, hasher }
    }

    /// Register `user` with `password`.
    ///
    /// The existence probe only skips hashing for users that are clearly taken;
    /// the atomic create decides the outcome when signups race.
    pub async fn create(&self, user: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_key(user) {
            return Err(AuthError::InvalidUser);
        }
        if self.records.exists(user).await? {
            return Err(AuthError::UserExists);
        }

        let hash = self.hasher.hash(password).await?;
        if self.records.create(user, hash.as_bytes()).await? {
            Ok(())
        } else {
            Err(AuthError::UserExists)
        }
    }

    /// Check `password` for `user`.
    pub async fn verify(&self, user: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_key(user) {
            return Err(AuthError::NoSuchUser);
        }

        let stored = self.records.read(user).await?.ok_or(AuthError::NoSuchUser)?;
        let stored = String::from_utf8(stored).map_err(|_| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "password record is not UTF-8",
            ))
        })?;

        if self.hasher.verify(password, stored.trim_end()).await? {
            Ok(())
        } else {
            Err(AuthError::BadPassword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::Params;

    async fn store(dir: &std::path::Path) -> CredentialStore {
        let records = RecordDir::open(dir.join("users")).await.unwrap();
        CredentialStore::new(records, PasswordHasher::new(Params::new(8, 1, 1, None).unwrap()))
    }

    #[tokio::test]
    async fn test_create_then_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;

        store.create("alice", "wonderland").await.unwrap();
        store.verify("alice", "wonderland").await.unwrap();
        assert!(matches!(
            store.verify("alice", "looking-glass").await,
            Err(AuthError::BadPassword)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_signup_regardless_of_password() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;

        store.create("bob", "pw").await.unwrap();
        assert!(matches!(store.create("bob", "pw").await, Err(AuthError::UserExists)));
        assert!(matches!(store.create("bob", "other").await, Err(AuthError::UserExists)));
        store.verify("bob", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;
        assert!(matches!(store.verify("nobody", "pw").await, Err(AuthError::NoSuchUser)));
        assert!(matches!(store.verify("../x", "pw").await, Err(AuthError::NoSuchUser)));
    }

    #[tokio::test]
    async fn test_invalid_user_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;
        for name in ["", "..", "../sessions/abc", "a/b", ".hidden"] {
            assert!(matches!(store.create(name, "pw").await, Err(AuthError::InvalidUser)));
        }
    }

    #[tokio::test]
    async fn test_plaintext_not_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;
        store.create("carol", "s3cret-passphrase").await.unwrap();

        let stored = std::fs::read_to_string(tmp.path().join("users").join("carol")).unwrap();
        assert!(!stored.contains("s3cret-passphrase"));
    }

    #[tokio::test]
    async fn test_concurrent_signups_one_winner() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).await;

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.create("dave", "first").await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.create("dave", "second").await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let (winner, loser) = match (&a, &b) {
            (Ok(()), Err(AuthError::UserExists)) => ("first", "second"),
            (Err(AuthError::UserExists), Ok(())) => ("second", "first"),
            other => panic!("expected exactly one winner, got {:?}", other),
        };
        store.verify("dave", winner).await.unwrap();
        assert!(matches!(store.verify("dave", loser).await, Err(AuthError::BadPassword)));
    }
}
