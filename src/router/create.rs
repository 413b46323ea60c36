//! User provisioning endpoint (`AddUser`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::ServerError;
use crate::session::{self, CookieStrategy};
use crate::user::{AuthService, TOKEN_SEPARATOR};
use crate::{AppState, router};

fn no_token_separator(value: &str) -> Result<(), ValidationError> {
    // The composite token is split on the separator, a username holding it
    // would corrupt every token it appears in.
    if value.contains(TOKEN_SEPARATOR) {
        return Err(ValidationError::new("token_separator")
            .with_message("User Name must not contain '*****'.".into()));
    }

    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct Params {
    #[validate(
        length(min = 1, max = 80),
        custom(function = "no_token_separator")
    )]
    wl_username: Option<String>,
    #[validate(length(min = 1, max = 80))]
    wl_realname: Option<String>,
    #[validate(length(min = 1, max = 255))]
    wl_password: Option<String>,
    wl_admin: Option<String>,
}

/// Handler for `GET /api/AddUser`.
///
/// On a fresh instance (no store file) this is the first-run setup: the
/// store is provisioned and the first user is forced to admin. Afterwards
/// only a logged-in admin may provision users.
pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let Some(username) = params.wl_username.as_deref() else {
        return router::message("User Name was not provided").into_response();
    };
    let Some(realname) = params.wl_realname.as_deref() else {
        return router::message("Real name was not provided").into_response();
    };
    let Some(password) = params.wl_password.as_deref() else {
        return router::message("Password was not provided").into_response();
    };

    if let Err(errors) = params.validate() {
        return router::error(errors.to_string()).into_response();
    }

    let new_instance = !state.db.exists();
    if new_instance {
        if let Err(err) = state.db.provision().await {
            return ServerError::from(err).into_response();
        }
    } else if !session::is_admin(CookieStrategy::resolve(&headers).as_ref()) {
        return ServerError::AccessDenied.into_response();
    }

    let admin = new_instance || params.wl_admin.as_deref() == Some("true");
    let service =
        AuthService::new(state.db.clone(), Arc::clone(&state.crypto));

    match service.create_user(username, realname, password, admin).await {
        Ok(new_id) => {
            tracing::info!(user_id = new_id, admin, "user provisioned");
            router::ok(new_id).into_response()
        },
        Err(err) => err.into_response(),
    }
}
