//! sitegate - static HTTPS hosting for many virtual hosts.
//!
//! Each immediate subdirectory of the public root is a host: it is both the
//! content served for that Host header and the allowlist entry that lets the
//! host obtain a certificate. Signed-in users additionally see files from their
//! own private tree, which takes precedence over the public one.

pub mod auth;
pub mod config;
pub mod error;
pub mod hosts;
pub mod http;
pub mod middleware;
pub mod request_log;
pub mod routes;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use routes::create_router;
pub use state::AppState;
