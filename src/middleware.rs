//! Request middleware.
//!
//! Layers, outermost first:
//! - `request_id_layer`: UUID v4 request span with duration and status
//! - `request_log_layer`: buffers the body and records the request on disk
//! - `identity_layer`: resolves the session cookie into an `Identity` once

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use http_body_util::LengthLimitError;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AUTH_PREFIX, SESSION_COOKIE};
use crate::error::AppError;
use crate::request_log::RequestRecord;
use crate::state::AppState;

/// Extension type for accessing request ID in handlers if needed.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// The request's host, taken verbatim from the Host header or, failing that,
/// from the URI authority (HTTP/2).
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
}

/// Whether `path` falls in the authentication sub-tree.
pub fn is_auth_path(path: &str) -> bool {
    path.strip_prefix(AUTH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Middleware that generates a request ID and creates a request span.
///
/// This should be the outermost middleware layer so the span wraps
/// all request processing, including other middleware and handlers.
pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let host = request_host(request.headers(), request.uri()).unwrap_or_default();

    // Root span for the request; user and duration are filled in later
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        host = %host,
        path = %request.uri().path(),
        user = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );

    let start = Instant::now();

    // Make the request ID available to handlers
    request.extensions_mut().insert(RequestId(request_id));

    // Run the rest of the stack inside the span
    async move {
        let response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms,
            "Request completed"
        );

        response
    }
    .instrument(span)
    .await
}

/// Middleware that writes every request to the on-disk request log.
///
/// The body is buffered so it can be both recorded and handed on. Bodies of
/// authentication requests carry passwords and are left out of the record.
/// A body that cannot be read ends the request with an error.
pub async fn request_log_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limit = state.config.logging.max_body_bytes;

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(AppError::BodyTooLarge(limit));
    }

    let from_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    // Buffer the body; chunked uploads are only caught by the limit here
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| body_read_error(e, limit))?;

    let logged_body: &[u8] = if is_auth_path(parts.uri.path()) {
        &[]
    } else {
        &bytes
    };
    let record = RequestRecord::new(
        from_ip,
        &parts.method,
        request_host(&parts.headers, &parts.uri).unwrap_or_default(),
        &parts.uri,
        &parts.headers,
        logged_body,
    );
    state.request_log.spawn_write(record);

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Map a failed body read, telling a tripped size limit apart from I/O errors.
fn body_read_error(err: axum::Error, limit: usize) -> AppError {
    let over_limit = std::iter::successors(Some(&err as &(dyn std::error::Error + 'static)), |e| e.source())
        .any(|e| e.is::<LengthLimitError>());
    if over_limit {
        AppError::BodyTooLarge(limit)
    } else {
        AppError::RequestBody(err.to_string())
    }
}

/// Middleware that resolves the caller's identity from the session cookie.
///
/// A missing cookie or a token that does not resolve yields
/// `Identity::Anonymous`; this layer never rejects a request.
pub async fn identity_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let identity = state.auth.identify(token.as_deref()).await;

    tracing::Span::current().record("user", tracing::field::display(&identity));
    request.extensions_mut().insert(identity);

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_auth_path_prefix_is_a_segment() {
        assert!(is_auth_path("/auth"));
        assert!(is_auth_path("/auth/"));
        assert!(is_auth_path("/auth/login"));
        assert!(is_auth_path("/auth/unknown/deep"));
        // Only whole segments count: a bare string prefix would swallow these
        assert!(!is_auth_path("/authors.html"));
        assert!(!is_auth_path("/authentic/index.html"));
        assert!(!is_auth_path("/"));
        assert!(!is_auth_path("/docs/auth/login"));
    }

    #[test]
    fn test_request_host_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com:8443"));
        let uri: Uri = "https://other.org/x".parse().unwrap();
        assert_eq!(request_host(&headers, &uri).as_deref(), Some("example.com:8443"));

        assert_eq!(request_host(&HeaderMap::new(), &uri).as_deref(), Some("other.org"));
        assert_eq!(request_host(&HeaderMap::new(), &"/x".parse().unwrap()), None);
    }

    #[tokio::test]
    async fn test_body_read_error_detects_limit() {
        let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(vec![0u8; 16]));
        let err = axum::body::to_bytes(Body::from_stream(futures::stream::iter(chunks)), 16)
            .await
            .unwrap_err();
        assert!(matches!(body_read_error(err, 16), AppError::BodyTooLarge(16)));

        let broken = futures::stream::iter(vec![Err::<Vec<u8>, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))]);
        let err = axum::body::to_bytes(Body::from_stream(broken), 16)
            .await
            .unwrap_err();
        assert!(matches!(body_read_error(err, 16), AppError::RequestBody(_)));
    }
}
