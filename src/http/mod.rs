//! HTTP server module with TLS support.
//!
//! This module provides HTTPS server functionality with two modes:
//! - **ACME (default)**: certificates obtained per host on first handshake, gated
//!   by the host policy
//! - **None**: Plain HTTP (explicit opt-out for development/reverse proxy)
//!
//! The server includes:
//! - HTTP to HTTPS redirect (when TLS enabled)
//! - Graceful shutdown on SIGTERM/SIGINT

mod redirect;
mod server;
mod shutdown;
pub mod tls;

pub use server::{start_server, ServerError};
