//! Session store: one user identifier per token under `authDir/sessions/`.

use rand::RngCore;

use crate::error::StoreError;

use super::{is_valid_key, RecordDir};

/// Random bytes per session token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Draw a fresh token from the operating system CSPRNG, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether `token` has the shape of an issued token.
pub fn is_session_token(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    records: RecordDir,
}

impl SessionStore {
    pub fn new(records: RecordDir) -> Self {
        Self { records }
    }

    /// Issue a new token bound to `user`.
    pub async fn create(&self, user: &str) -> Result<String, StoreError> {
        let token = generate_token();
        if self.records.create(&token, user.as_bytes()).await? {
            Ok(token)
        } else {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "session token collision",
            )))
        }
    }

    /// Look up the user behind `token`.
    ///
    /// Malformed tokens, missing records and unreadable records all yield `None`.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        if !is_session_token(token) {
            return None;
        }

        let contents = match self.records.read(token).await {
            Ok(contents) => contents?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session record");
                return None;
            }
        };

        let user = String::from_utf8(contents).ok()?;
        if is_valid_key(&user) {
            Some(user)
        } else {
            tracing::warn!("Session record holds an invalid user name");
            None
        }
    }

    /// Invalidate `token`. Unknown or malformed tokens are ignored.
    pub async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        if !is_session_token(token) {
            return Ok(());
        }
        self.records.remove(token).await?;
        Ok(())
    }
}
