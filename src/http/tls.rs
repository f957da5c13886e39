//! Host-gated TLS acceptor with on-demand ACME certificates.
//!
//! Every handshake is paused after the ClientHello. The SNI name is checked
//! against the host policy; refused names, missing SNI and policy errors abort
//! the connection before any certificate is selected. Allowed names are served
//! from a per-host `rustls-acme` state, created on first use, which orders the
//! certificate, caches it in the certificate directory and renews it.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum_server::accept::Accept;
use futures::future::BoxFuture;
use futures::StreamExt;
use rustls::server::Acceptor;
use rustls::ServerConfig;
use rustls_acme::caches::DirCache;
use rustls_acme::AcmeConfig;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;

use crate::hosts::HostPolicy;

/// ALPN protocol used by TLS-ALPN-01 validation connections
const ACME_TLS_ALPN: &[u8] = b"acme-tls/1";

/// ALPN protocol offered to ordinary clients
const HTTP_1_1_ALPN: &[u8] = b"http/1.1";

/// Issues and caches certificates, one ACME state per allowed host.
pub struct AcmeIssuer {
    email: String,
    cache_dir: PathBuf,
    production: bool,
    configs: RwLock<HashMap<String, Arc<ServerConfig>>>,
}

impl AcmeIssuer {
    pub fn new(email: String, cache_dir: PathBuf, production: bool) -> Self {
        Self {
            email,
            cache_dir,
            production,
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// TLS configuration for `host`, starting certificate management on first use.
    pub async fn server_config(&self, host: &str) -> Arc<ServerConfig> {
        if let Some(config) = self.configs.read().await.get(host) {
            return config.clone();
        }

        let mut configs = self.configs.write().await;
        if let Some(config) = configs.get(host) {
            return config.clone();
        }

        let config = self.start(host);
        configs.insert(host.to_string(), config.clone());
        config
    }

    fn start(&self, host: &str) -> Arc<ServerConfig> {
        tracing::info!(
            host = %host,
            production = self.production,
            cache = %self.cache_dir.display(),
            "Starting certificate management"
        );

        let mut state = AcmeConfig::new([host.to_string()])
            .contact_push(format!("mailto:{}", self.email))
            .cache(DirCache::new(self.cache_dir.clone()))
            .directory_lets_encrypt(self.production)
            .state();

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_cert_resolver(state.resolver());
        config.alpn_protocols = vec![HTTP_1_1_ALPN.to_vec(), ACME_TLS_ALPN.to_vec()];

        let host = host.to_string();
        tokio::spawn(async move {
            loop {
                match state.next().await {
                    Some(Ok(event)) => {
                        tracing::info!(host = %host, event = ?event, "ACME event");
                    }
                    Some(Err(err)) => {
                        tracing::error!(host = %host, error = %err, "ACME error");
                    }
                    None => {
                        tracing::debug!(host = %host, "ACME state stream ended");
                        break;
                    }
                }
            }
        });

        Arc::new(config)
    }
}

/// Acceptor for `axum_server` that consults the host policy on every handshake.
#[derive(Clone)]
pub struct HostGatedAcceptor {
    policy: Arc<HostPolicy>,
    issuer: Arc<AcmeIssuer>,
}

impl HostGatedAcceptor {
    pub fn new(policy: HostPolicy, issuer: AcmeIssuer) -> Self {
        Self {
            policy: Arc::new(policy),
            issuer: Arc::new(issuer),
        }
    }

    async fn handshake<I>(&self, stream: I) -> io::Result<TlsStream<I>>
    where
        I: AsyncRead + AsyncWrite + Unpin,
    {
        let start = LazyConfigAcceptor::new(Acceptor::default(), stream).await?;

        let host = start
            .client_hello()
            .server_name()
            .map(str::to_string)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing SNI"))?;

        if let Err(e) = self.policy.check(&host).await {
            tracing::warn!(host = %host, error = %e, "Refusing TLS handshake");
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, e));
        }

        let config = self.issuer.server_config(&host).await;
        let mut tls = start.into_stream(config).await?;

        if tls.get_ref().1.alpn_protocol() == Some(ACME_TLS_ALPN) {
            tracing::debug!(host = %host, "Completed TLS-ALPN-01 challenge handshake");
            tls.shutdown().await?;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "ACME validation connection",
            ));
        }

        Ok(tls)
    }
}

impl<I, S> Accept<I, S> for HostGatedAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = S;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.clone();
        Box::pin(async move {
            let tls = acceptor.handshake(stream).await?;
            Ok((tls, service))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    fn acceptor(public_root: &std::path::Path, cache_dir: &std::path::Path) -> HostGatedAcceptor {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        HostGatedAcceptor::new(
            HostPolicy::new(public_root),
            AcmeIssuer::new("ops@example.com".to_string(), cache_dir.to_path_buf(), false),
        )
    }

    fn connector(send_sni: bool) -> TlsConnector {
        let mut config = ClientConfig::builder()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth();
        config.enable_sni = send_sni;
        TlsConnector::from(Arc::new(config))
    }

    /// Run a client handshake against the acceptor and return the server's result.
    async fn server_handshake(
        acceptor: &HostGatedAcceptor,
        connector: TlsConnector,
        name: &'static str,
    ) -> io::Result<TlsStream<tokio::io::DuplexStream>> {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let name = ServerName::try_from(name).unwrap();

        let (server, _client) = tokio::join!(
            acceptor.handshake(server_io),
            connector.connect(name, client_io)
        );
        server
    }

    #[tokio::test]
    async fn test_refuses_host_without_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let public = tmp.path().join("public");
        std::fs::create_dir_all(public.join("allowed.example")).unwrap();
        let acceptor = acceptor(&public, &tmp.path().join("certs"));

        let err = server_handshake(&acceptor, connector(true), "denied.example")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        // Refused before any certificate state was created
        assert!(acceptor.issuer.configs.read().await.is_empty());
        assert!(!tmp.path().join("certs").exists());
    }

    #[tokio::test]
    async fn test_refuses_missing_sni() {
        let tmp = tempfile::tempdir().unwrap();
        let public = tmp.path().join("public");
        std::fs::create_dir_all(public.join("allowed.example")).unwrap();
        let acceptor = acceptor(&public, &tmp.path().join("certs"));

        let err = server_handshake(&acceptor, connector(false), "allowed.example")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(acceptor.issuer.configs.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_refuses_when_public_root_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let acceptor = acceptor(&tmp.path().join("missing"), &tmp.path().join("certs"));

        let err = server_handshake(&acceptor, connector(true), "allowed.example")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(acceptor.issuer.configs.read().await.is_empty());
    }
}
