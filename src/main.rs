//! sitegate: static HTTPS file server.
//!
//! This is the application entry point. It parses the positional directory
//! arguments, merges them with the optional settings file, initializes tracing,
//! opens the auth stores and request log, and starts the server.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitegate::config::{AppConfig, ContentPaths, Settings, DEFAULT_LOG_FILTER};
use sitegate::http::start_server;
use sitegate::{create_router, AppState};

/// sitegate: static HTTPS hosting with per-host certificates and private trees
#[derive(Parser, Debug)]
#[command(name = "sitegate", version, about)]
struct Args {
    /// Public content root; one subdirectory per host
    public_root: PathBuf,

    /// Private content root, laid out as <user>/<host>/
    private_root: PathBuf,

    /// Certificate cache directory
    cert_cache_dir: PathBuf,

    /// Directory receiving one JSON file per request
    logs_dir: PathBuf,

    /// Directory holding users/ and sessions/
    auth_dir: PathBuf,

    /// Contact email for certificate issuance (required in ACME mode)
    email: Option<String>,

    /// Path to an optional TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "sitegate=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let paths = ContentPaths {
        public_root: args.public_root,
        private_root: args.private_root,
        cert_cache_dir: args.cert_cache_dir,
        logs_dir: args.logs_dir,
        auth_dir: args.auth_dir,
    };
    let config = AppConfig::new(paths, args.email, settings)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    tracing::info!(
        public_root = %config.paths.public_root.display(),
        private_root = %config.paths.private_root.display(),
        auth_dir = %config.paths.auth_dir.display(),
        logs_dir = %config.paths.logs_dir.display(),
        tls_mode = ?config.tls.mode,
        "Loaded configuration"
    );

    let state = AppState::open(config.clone()).await?;
    let app = create_router(state);

    start_server(app, &config).await?;

    Ok(())
}
