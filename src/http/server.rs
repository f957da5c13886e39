//! HTTP/HTTPS server startup logic.
//!
//! Supports two TLS modes:
//! - ACME: certificates issued on demand for hosts allowed by the host policy
//! - None: Plain HTTP

use std::net::SocketAddr;

use axum::Router;
use axum_server::Handle;

use crate::config::{AppConfig, TlsMode};
use crate::hosts::HostPolicy;

use super::redirect;
use super::shutdown;
use super::tls::{AcmeIssuer, HostGatedAcceptor};

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    Address(String),

    #[error("Failed to load TLS configuration: {0}")]
    TlsConfig(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Start the HTTP/HTTPS server based on configuration.
///
/// This function blocks until the server shuts down.
pub async fn start_server(app: Router, config: &AppConfig) -> Result<(), ServerError> {
    let addr = config
        .listen_addr()
        .map_err(|e| ServerError::Address(e.to_string()))?;

    // Setup graceful shutdown
    let handle = Handle::new();
    shutdown::setup_shutdown_handler(handle.clone());

    match config.tls.mode {
        TlsMode::None => {
            tracing::warn!(
                "TLS disabled - server running on plain HTTP (not recommended for production)"
            );
            start_plain_server(app, addr, handle).await
        }
        TlsMode::Acme => start_acme_server(app, addr, config, handle).await,
    }
}

/// Start a plain HTTP server (no TLS).
async fn start_plain_server(
    app: Router,
    addr: SocketAddr,
    handle: Handle,
) -> Result<(), ServerError> {
    tracing::info!(%addr, "Starting HTTP server (no TLS)");

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))
}

/// Start an HTTPS server whose certificates are issued per allowed host.
async fn start_acme_server(
    app: Router,
    addr: SocketAddr,
    config: &AppConfig,
    handle: Handle,
) -> Result<(), ServerError> {
    let email = config
        .acme_email
        .clone()
        .ok_or_else(|| ServerError::TlsConfig("ACME contact email is not set".to_string()))?;
    let cache_dir = config.paths.cert_cache_dir.clone();
    let production = config.tls.acme_production;

    let env_name = if production { "production" } else { "staging" };
    tracing::info!(
        %addr,
        email = %email,
        cache = %cache_dir.display(),
        public_root = %config.paths.public_root.display(),
        environment = %env_name,
        "Starting HTTPS server (ACME)"
    );

    if !production {
        tracing::warn!(
            "Using Let's Encrypt staging environment - certificates will NOT be trusted by browsers. \
             Set acme_production = true for production use."
        );
    }

    // Create cache directory if it doesn't exist
    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        ServerError::TlsConfig(format!(
            "Failed to create certificate cache directory '{}': {}",
            cache_dir.display(),
            e
        ))
    })?;

    // Hosts are re-listed on every handshake; this is only a startup report
    let policy = HostPolicy::new(config.paths.public_root.clone());
    match policy.list_hosts().await {
        Ok(hosts) => tracing::info!(hosts = ?hosts, "Hosts currently eligible for certificates"),
        Err(e) => tracing::warn!(error = %e, "Failed to list host directories"),
    }

    // Gate each handshake on the host policy before certificates are touched
    let acceptor = HostGatedAcceptor::new(policy, AcmeIssuer::new(email, cache_dir, production));

    // Start HTTP->HTTPS redirect if enabled
    if config.tls.redirect_http {
        redirect::spawn_redirect_server(config.tls.redirect_port, addr.port());
    }

    axum_server::bind(addr)
        .handle(handle)
        .acceptor(acceptor)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))
}
