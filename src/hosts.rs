//! Host policy gate for certificate issuance.
//!
//! The set of allowed hosts is the set of immediate subdirectories of the public
//! content root. It is listed fresh on every decision, so adding or removing a
//! host directory takes effect on the next TLS handshake without a restart.

use std::io;
use std::path::PathBuf;

/// Why a hostname was refused a certificate.
#[derive(Debug, thiserror::Error)]
pub enum HostPolicyError {
    #[error("host {0:?} not allowed")]
    HostNotAllowed(String),

    #[error("failed to list hosts: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct HostPolicy {
    public_root: PathBuf,
}

impl HostPolicy {
    pub fn new(public_root: impl Into<PathBuf>) -> Self {
        Self {
            public_root: public_root.into(),
        }
    }

    /// Names of the host directories currently present, sorted.
    pub async fn list_hosts(&self) -> io::Result<Vec<String>> {
        let mut hosts = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.public_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                hosts.push(name);
            }
        }
        hosts.sort();
        Ok(hosts)
    }

    /// Allow `host` iff a directory with exactly that name exists right now.
    pub async fn check(&self, host: &str) -> Result<(), HostPolicyError> {
        let hosts = self.list_hosts().await?;
        if hosts.iter().any(|h| h == host) {
            Ok(())
        } else {
            Err(HostPolicyError::HostNotAllowed(host.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_only_existing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("example.com")).unwrap();
        std::fs::write(tmp.path().join("file.example"), b"not a dir").unwrap();

        let policy = HostPolicy::new(tmp.path());
        policy.check("example.com").await.unwrap();
        assert!(matches!(
            policy.check("file.example").await,
            Err(HostPolicyError::HostNotAllowed(_))
        ));
        assert!(matches!(
            policy.check("other.org").await,
            Err(HostPolicyError::HostNotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_exact_match_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("example.com")).unwrap();

        let policy = HostPolicy::new(tmp.path());
        assert!(policy.check("EXAMPLE.COM").await.is_err());
        assert!(policy.check("www.example.com").await.is_err());
        assert!(policy.check("example.co").await.is_err());
        assert!(policy.check("").await.is_err());
    }

    #[tokio::test]
    async fn test_follows_filesystem_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = HostPolicy::new(tmp.path());

        assert!(policy.check("a.example").await.is_err());

        std::fs::create_dir(tmp.path().join("a.example")).unwrap();
        policy.check("a.example").await.unwrap();

        std::fs::rename(tmp.path().join("a.example"), tmp.path().join("b.example")).unwrap();
        assert!(policy.check("a.example").await.is_err());
        policy.check("b.example").await.unwrap();

        std::fs::remove_dir(tmp.path().join("b.example")).unwrap();
        assert!(policy.check("b.example").await.is_err());
        assert!(policy.list_hosts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_refuses() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = HostPolicy::new(tmp.path().join("missing"));
        assert!(matches!(
            policy.check("example.com").await,
            Err(HostPolicyError::Io(_))
        ));
    }
}
