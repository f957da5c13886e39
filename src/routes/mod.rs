//! HTTP route handlers.
//!
//! Everything under `/auth` goes to the authentication handlers, with no
//! identity gating and `Cache-Control: no-store`. Every other path falls
//! through to the content handler, which serves files for the request's host.
//!
//! Middleware wraps both: a request-ID span, the on-disk request log, and
//! identity resolution from the session cookie.

pub mod auth;
pub mod content;

use axum::{
    http::{header, HeaderMap},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{AUTH_PREFIX, CACHE_CONTROL_AUTH};
use crate::middleware::{identity_layer, request_id_layer, request_log_layer};
use crate::state::AppState;

/// Plain-text acknowledgement body
pub const SUCCESS_TEXT: &str = "Success!";

/// Whether the client asked for JSON via its Accept header.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Success acknowledgement, negotiated on the Accept header:
/// `{"ok": true}` for JSON clients, `Success!` otherwise.
pub fn acknowledge(headers: &HeaderMap) -> Response {
    if wants_json(headers) {
        Json(serde_json::json!({ "ok": true })).into_response()
    } else {
        SUCCESS_TEXT.into_response()
    }
}

/// Creates the Axum router with auth routes, content fallback and middleware.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .fallback(auth::not_found)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_AUTH),
        ));

    Router::new()
        .nest(AUTH_PREFIX, auth_routes)
        .fallback(content::serve)
        .with_state(state.clone())
        // Identity resolution - innermost, runs after the body is buffered
        .layer(middleware::from_fn_with_state(state.clone(), identity_layer))
        // Request log - records every request, including auth requests
        .layer(middleware::from_fn_with_state(state, request_log_layer))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_json_prefix() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(wants_json(&headers));

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(wants_json(&headers));

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html, application/json"),
        );
        assert!(!wants_json(&headers));
    }
}
