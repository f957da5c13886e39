//! Configuration loading and constants.
//!
//! The content roots, certificate cache, log directory, auth directory and ACME
//! contact come from positional command-line arguments. Listener, TLS, password
//! hashing and logging knobs come from an optional TOML file. Both are merged once
//! at startup into `AppConfig`, which every component receives by reference.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// =============================================================================
// Cookie and Path Constants
// =============================================================================

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "auth";

/// Path prefix of the authentication sub-tree
pub const AUTH_PREFIX: &str = "/auth";

/// Subdirectory of the auth directory holding one record per user
pub const USERS_DIR: &str = "users";

/// Subdirectory of the auth directory holding one record per session token
pub const SESSIONS_DIR: &str = "sessions";

/// Cache-Control value for authentication responses
pub const CACHE_CONTROL_AUTH: &str = "no-store";

// =============================================================================
// Defaults
// =============================================================================

/// Default log filter when neither --log-level nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "sitegate=info,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Largest request body buffered for the request log (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Argon2 memory cost in KiB (argon2 crate default)
pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19 * 1024;

/// Argon2 iteration count (argon2 crate default)
pub const DEFAULT_ARGON2_ITERATIONS: u32 = 2;

/// Argon2 lane count (argon2 crate default)
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;

/// Directories the server reads from and writes to.
#[derive(Debug, Clone)]
pub struct ContentPaths {
    /// Public content root; its immediate subdirectories are the served hosts
    pub public_root: PathBuf,
    /// Private content root, laid out as `<user>/<host>/...`
    pub private_root: PathBuf,
    /// Where issued certificates and ACME account keys are cached
    pub cert_cache_dir: PathBuf,
    /// One JSON file per request lands here
    pub logs_dir: PathBuf,
    /// Holds the `users/` and `sessions/` record directories
    pub auth_dir: PathBuf,
}

impl ContentPaths {
    pub fn users_dir(&self) -> PathBuf {
        self.auth_dir.join(USERS_DIR)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.auth_dir.join(SESSIONS_DIR)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: ContentPaths,
    /// Contact address registered with the ACME directory
    pub acme_email: Option<String>,
    pub http: HttpServerConfig,
    pub tls: TlsConfig,
    pub auth: AuthConfig,
    /// Password hashing cost, validated from `auth`
    pub password_params: argon2::Params,
    pub logging: LoggingConfig,
}

/// Optional TOML settings file. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpServerConfig,
    pub tls: TlsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 443,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Certificates issued on demand for every allowed host
    #[default]
    Acme,
    /// Plain HTTP, for development or behind a terminating proxy
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub mode: TlsMode,
    /// Use the Let's Encrypt production directory instead of staging
    pub acme_production: bool,
    /// Run a plain HTTP listener that redirects to HTTPS
    pub redirect_http: bool,
    pub redirect_port: u16,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            mode: TlsMode::Acme,
            acme_production: true,
            redirect_http: false,
            redirect_port: 80,
        }
    }
}

/// Password hashing cost and cookie attributes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    /// Mark the session cookie `Secure`. Defaults to on when TLS is enabled.
    pub secure_cookie: Option<bool>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: DEFAULT_ARGON2_MEMORY_KIB,
            argon2_iterations: DEFAULT_ARGON2_ITERATIONS,
            argon2_parallelism: DEFAULT_ARGON2_PARALLELISM,
            secure_cookie: None,
        }
    }
}

impl AuthConfig {
    pub fn argon2_params(&self) -> Result<argon2::Params, ConfigError> {
        argon2::Params::new(
            self.argon2_memory_kib,
            self.argon2_iterations,
            self.argon2_parallelism,
            None,
        )
        .map_err(|e| ConfigError::Validation(format!("Invalid argon2 parameters: {}", e)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    pub format: String,
    /// Largest request body accepted and recorded in the request log
    pub max_body_bytes: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

impl AppConfig {
    /// Merge positional paths and settings, validating the result.
    pub fn new(
        paths: ContentPaths,
        acme_email: Option<String>,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        let acme_email = acme_email.filter(|e| !e.trim().is_empty());

        if settings.tls.mode == TlsMode::Acme && acme_email.is_none() {
            return Err(ConfigError::Validation(
                "A contact email is required for ACME certificate issuance".to_string(),
            ));
        }

        if !matches!(settings.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "Unknown log format '{}', expected 'text' or 'json'",
                settings.logging.format
            )));
        }

        let password_params = settings.auth.argon2_params()?;

        let config = Self {
            paths,
            acme_email,
            http: settings.http,
            tls: settings.tls,
            auth: settings.auth,
            password_params,
            logging: settings.logging,
        };
        config.listen_addr()?;

        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.http.host, self.http.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("Invalid http.host or http.port: {}", e)))
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.mode != TlsMode::None
    }

    pub fn secure_cookie(&self) -> bool {
        self.auth.secure_cookie.unwrap_or_else(|| self.tls_enabled())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
