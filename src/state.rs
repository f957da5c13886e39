//! Shared application state for request handlers.

use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::error::StoreError;
use crate::request_log::RequestLog;

/// Shared application state, cloneable across handlers.
///
/// Built once at startup from the merged configuration. The stores and the
/// request log only hold directory paths, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub request_log: RequestLog,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthService, request_log: RequestLog) -> Self {
        Self {
            config: Arc::new(config),
            auth,
            request_log,
        }
    }

    /// Open the auth stores and the request log, creating their directories.
    pub async fn open(config: AppConfig) -> Result<Self, StoreError> {
        let auth = AuthService::open(&config).await?;
        let request_log = RequestLog::open(&config.paths.logs_dir).await?;
        Ok(Self::new(config, auth, request_log))
    }
}
