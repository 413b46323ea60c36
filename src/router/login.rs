//! Login endpoint: credential verification and session issuance.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::user::AuthService;
use crate::{AppState, router, session};

pub const USERNAME_HEADER: &str = "wl_username";
pub const PASSWORD_HEADER: &str = "wl_password";

/// Handler for `PUT /api/Login`.
///
/// Credentials travel in the `wl_username`/`wl_password` request headers.
/// A missing header is indistinguishable from a failed match.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let username = headers
        .get(USERNAME_HEADER)
        .and_then(|value| value.to_str().ok());
    let password = headers
        .get(PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok());

    let (Some(username), Some(password)) = (username, password) else {
        return ServerError::InvalidCredentials.into_response();
    };

    let service =
        AuthService::new(state.db.clone(), Arc::clone(&state.crypto));

    match service.login(username, password).await {
        Ok(payload) => match session::session_cookie(&payload) {
            Ok(cookie) => {
                tracing::debug!(user_id = payload.user_id, "session issued");
                ([(SET_COOKIE, cookie)], router::ok(&payload)).into_response()
            },
            Err(err) => err.into_response(),
        },
        Err(err) => err.into_response(),
    }
}
