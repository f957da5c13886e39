use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::io;

/// Failures of the on-disk record stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcomes of signup and login that are not success.
///
/// `NoSuchUser` and `BadPassword` stay distinct here for logging; both map to
/// the same 401 at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserExists,

    #[error("Invalid user name")]
    InvalidUser,

    #[error("No such user")]
    NoSuchUser,

    #[error("Bad password")]
    BadPassword,

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::UserExists | AuthError::InvalidUser => StatusCode::BAD_REQUEST,
            AuthError::NoSuchUser | AuthError::BadPassword => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::UserExists => "user already exists",
            AuthError::InvalidUser => "invalid user name",
            AuthError::NoSuchUser | AuthError::BadPassword => "invalid credentials",
            AuthError::Storage(e) => {
                tracing::error!(error = %e, "Auth storage failure");
                "internal server error"
            }
        };

        (status, message).into_response()
    }
}

/// Errors raised while dispatching non-auth requests.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid host: {0:?}")]
    InvalidHost(String),

    #[error("Missing Host header")]
    MissingHost,

    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidHost(_) | AppError::MissingHost => {
                (StatusCode::BAD_REQUEST, "invalid host")
            }
            AppError::BodyTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
            _ => {
                tracing::error!("Internal error: {:?}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        (status, message).into_response()
    }
}
