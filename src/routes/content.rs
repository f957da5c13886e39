//! Static content for every non-auth path.
//!
//! GET and HEAD are served from the host's content root. A signed-in user
//! first gets `privateRoot/<user>/<host>` if the requested path exists there;
//! anyone else, or a path missing from the private tree, gets
//! `publicRoot/<host>`. Other methods are acknowledged without touching disk.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Extension, Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use tower_http::services::ServeDir;

use crate::auth::Identity;
use crate::config::ContentPaths;
use crate::error::AppError;
use crate::middleware::request_host;
use crate::state::AppState;
use crate::store::is_valid_key;

use super::acknowledge;

pub async fn serve(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    request: Request,
) -> Result<Response, AppError> {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return Ok(acknowledge(request.headers()));
    }

    let host = request_host(request.headers(), request.uri()).ok_or(AppError::MissingHost)?;
    if !is_valid_key(&host) {
        return Err(AppError::InvalidHost(host));
    }

    let root = content_root(&state.config.paths, &identity, &host, request.uri().path()).await;
    tracing::debug!(root = %root.display(), "Serving content");

    let response = ServeDir::new(root).try_call(request).await?;
    Ok(response.into_response())
}

/// Pick the directory a request is served from.
///
/// The private tree is only consulted for a signed-in user, and only wins when
/// the requested path exists in it.
pub async fn content_root(
    paths: &ContentPaths,
    identity: &Identity,
    host: &str,
    request_path: &str,
) -> PathBuf {
    if let Some(user) = identity.user() {
        let private = paths.private_root.join(user).join(host);
        if let Some(relative) = relative_path(request_path) {
            if has_content(&private.join(relative)).await {
                return private;
            }
        }
    }
    paths.public_root.join(host)
}

/// A file, or a directory with an index page.
async fn has_content(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => true,
        Ok(meta) if meta.is_dir() => tokio::fs::metadata(path.join("index.html"))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false),
        _ => false,
    }
}

/// Turn a URL path into a relative filesystem path, refusing traversal.
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['\\', '\0']) => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}
