//! Plain HTTP listener that redirects every request to HTTPS.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::any;
use axum::Router;

/// Spawn the redirect listener in the background.
pub fn spawn_redirect_server(http_port: u16, https_port: u16) {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
        tracing::info!(http_port, https_port, "Starting HTTP->HTTPS redirect server");

        let app = Router::new().fallback(any(move |headers: HeaderMap, uri: Uri| async move {
            redirect_response(&headers, &uri, https_port)
        }));

        if let Err(e) = axum_server::bind(addr).serve(app.into_make_service()).await {
            tracing::error!(error = %e, "HTTP redirect server failed");
        }
    });
}

fn redirect_response(headers: &HeaderMap, uri: &Uri, https_port: u16) -> Response {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing host").into_response();
    };
    let target = https_url(host, uri, https_port);
    tracing::debug!(from = %uri, to = %target, "Redirecting HTTP to HTTPS");
    Redirect::permanent(&target).into_response()
}

/// HTTPS URL for the same host (port stripped) and path.
fn https_url(host: &str, uri: &Uri, https_port: u16) -> String {
    let host = host.split(':').next().unwrap_or(host);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    if https_port == 443 {
        format!("https://{}{}", host, path)
    } else {
        format!("https://{}:{}{}", host, https_port, path)
    }
}
