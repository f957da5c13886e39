//! File-backed record stores.
//!
//! Each store is a directory holding one file per record: the file name is the
//! key and the contents are the value. Records are written whole: the value goes
//! to a temporary sibling first and is then hard-linked into place, which both
//! publishes it atomically and fails if the key already exists.

mod credentials;
mod sessions;

pub use credentials::CredentialStore;
pub use sessions::{generate_token, is_session_token, SessionStore, TOKEN_BYTES};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::error::StoreError;

/// Longest key accepted, matching the usual file name limit.
const MAX_KEY_LEN: usize = 255;

/// Whether `key` can be used verbatim as a single file name.
///
/// Rejects empty names, anything starting with `.` (which also covers `.`, `..`
/// and the temporary files used during writes), path separators and NUL.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0'])
}

/// A directory of whole-file records.
#[derive(Debug, Clone)]
pub struct RecordDir {
    dir: PathBuf,
}

impl RecordDir {
    /// Open the record directory, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    /// Read a record. `Ok(None)` when absent.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Create a record if none exists under `key`.
    ///
    /// Returns `Ok(false)` when the key is already taken. Concurrent callers racing
    /// on the same key see exactly one `Ok(true)`.
    pub async fn create(&self, key: &str, contents: &[u8]) -> Result<bool, StoreError> {
        let path = self.path(key)?;

        let mut suffix = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut suffix);
        let tmp = self.dir.join(format!(".tmp-{}", hex::encode(suffix)));

        if let Err(e) = tokio::fs::write(&tmp, contents).await {
            // A partial write may still have created the file
            discard_temp(&tmp).await;
            return Err(e.into());
        }
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        discard_temp(&tmp).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a record. Returns whether one was present.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn discard_temp(tmp: &Path) {
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove temporary record")
        }
    }
}
