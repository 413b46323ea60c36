//! Error handler for the WatchList authentication service.
//!
//! Every internal failure is converted at the endpoint boundary into one of
//! the two wire shapes the UI understands: `["ERROR", message]` or
//! `["ERROR", false]` (uninitialized instance). Internal errors never reach
//! the caller unformatted, and the HTTP status is always 200 because the
//! front-end routes on the array contents.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Config file error: Secret property is missing or not set")]
    Configuration,

    /// The store file does not exist yet, this is a fresh instance.
    #[error("instance is not initialized")]
    Uninitialized,

    /// Zero or ambiguous credential matches collapse to one message so the
    /// response never leaks which usernames exist.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token format")]
    MalformedToken,

    /// Token was valid once, has been revoked server-side.
    #[error("token expired")]
    ExpiredToken,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("addUser(): Access Denied")]
    AccessDenied,

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("system clock before unix epoch")]
    Time(#[from] std::time::SystemTimeError),

    #[error("header value is not valid")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match &self {
            ServerError::Uninitialized | ServerError::Configuration => {
                json!(["ERROR", false])
            },
            ServerError::ExpiredToken | ServerError::NotLoggedIn => {
                json!(["ERROR", ""])
            },
            ServerError::Sql(err) => {
                tracing::error!(error = %err, "store request failed");
                json!(["ERROR", self.to_string()])
            },
            ServerError::Crypto(err) => {
                tracing::error!(error = %err, "cipher operation failed");
                json!(["ERROR", self.to_string()])
            },
            _ => json!(["ERROR", self.to_string()]),
        };

        (StatusCode::OK, Json(body)).into_response()
    }
}
