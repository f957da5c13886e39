//! Username/password authentication backed by the record stores.
//!
//! Session lifecycle: a caller starts anonymous, becomes authenticated when
//! `login` issues a token, and returns to anonymous on `logout` or when the
//! token no longer resolves.

mod identity;
pub mod password;

pub use identity::Identity;

use crate::config::AppConfig;
use crate::error::{AuthError, StoreError};
use crate::store::{CredentialStore, RecordDir, SessionStore};

use password::PasswordHasher;

#[derive(Debug, Clone)]
pub struct AuthService {
    credentials: CredentialStore,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(credentials: CredentialStore, sessions: SessionStore) -> Self {
        Self {
            credentials,
            sessions,
        }
    }

    /// Open both stores under the configured auth directory.
    pub async fn open(config: &AppConfig) -> Result<Self, StoreError> {
        let users = RecordDir::open(config.paths.users_dir()).await?;
        let sessions = RecordDir::open(config.paths.sessions_dir()).await?;

        Ok(Self::new(
            CredentialStore::new(users, PasswordHasher::new(config.password_params.clone())),
            SessionStore::new(sessions),
        ))
    }

    pub async fn signup(&self, user: &str, password: &str) -> Result<(), AuthError> {
        self.credentials.create(user, password).await?;
        tracing::info!(user = %user, "User signed up");
        Ok(())
    }

    /// Verify credentials and issue a session token.
    pub async fn login(&self, user: &str, password: &str) -> Result<String, AuthError> {
        if let Err(e) = self.credentials.verify(user, password).await {
            if matches!(e, AuthError::NoSuchUser | AuthError::BadPassword) {
                tracing::info!(user = %user, reason = %e, "Login rejected");
            }
            return Err(e);
        }

        let token = self.sessions.create(user).await?;
        tracing::info!(user = %user, "User logged in");
        Ok(token)
    }

    /// Invalidate the session behind `token`, if any.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = token {
            self.sessions.destroy(token).await?;
        }
        Ok(())
    }

    /// Resolve a cookie value to an identity. Never fails.
    pub async fn identify(&self, token: Option<&str>) -> Identity {
        match token {
            Some(token) => match self.sessions.resolve(token).await {
                Some(user) => Identity::User(user),
                None => Identity::Anonymous,
            },
            None => Identity::Anonymous,
        }
    }
}
