//! Session status endpoint (`IsLoggedIn`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::session::{CookieStrategy, TokenStrategy};
use crate::user::AuthService;
use crate::{AppState, router, session};

#[derive(Debug, Deserialize)]
pub struct Params {
    #[serde(rename = "Token")]
    token: Option<String>,
}

/// Reduced identity view returned on a cookie-resolved session.
#[derive(Debug, Serialize)]
struct Status {
    #[serde(rename = "UserID")]
    user_id: i64,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "RealName")]
    real_name: String,
    #[serde(rename = "Admin")]
    admin: i64,
    #[serde(rename = "Options")]
    options: crate::user::Options,
}

/// Handler for `GET /api/IsLoggedIn`.
///
/// Resolution order: settings, store file, cookie, then the optional
/// `Token` query parameter. A fresh install (no store file) must answer
/// `["ERROR", false]` so the UI routes to first-run setup instead of a
/// login error.
pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    if state.config.validate().is_err() {
        return ServerError::Configuration.into_response();
    }

    if !state.db.exists() {
        // Clear a session cookie left over from a previous install.
        // Best-effort, the reply matters more than the cleanup.
        let mut response = ServerError::Uninitialized.into_response();
        response
            .headers_mut()
            .append(SET_COOKIE, session::clear_session_cookie());
        return response;
    }

    let service =
        AuthService::new(state.db.clone(), Arc::clone(&state.crypto));

    if let Some(current) = CookieStrategy::resolve(&headers) {
        // Cookie path: identity is taken from the payload, only the
        // preferences are re-read.
        match service
            .options_for_user(current.user_id, current.admin == 1)
            .await
        {
            Ok(options) => router::ok(Status {
                user_id: current.user_id,
                username: current.username,
                real_name: current.realname,
                admin: current.admin,
                options,
            })
            .into_response(),
            Err(err) => err.into_response(),
        }
    } else if let Some(token) = params.token.as_deref() {
        match TokenStrategy::new(&service).resolve(token).await {
            Ok(payload) => match session::session_cookie(&payload) {
                Ok(cookie) => {
                    // Valid token re-establishes the cookie session.
                    ([(SET_COOKIE, cookie)], router::ok(&payload))
                        .into_response()
                },
                Err(err) => err.into_response(),
            },
            Err(err) => err.into_response(),
        }
    } else {
        ServerError::NotLoggedIn.into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::user::{SESSION_TIMEOUT_MS, TOKEN_SEPARATOR};
    use crate::*;

    async fn body_of(
        response: axum::http::Response<axum::body::Body>,
    ) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_install_reports_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let response =
            make_request(app(state), Method::GET, "/api/IsLoggedIn", &[])
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Stale cookie gets deleted on the way out.
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(cookie.contains("Max-Age=0"));

        assert_eq!(body_of(response).await, json!(["ERROR", false]));
    }

    #[tokio::test]
    async fn test_missing_secret_reports_uninitialized_shape() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_without_secret(dir.path());

        let response =
            make_request(app(state), Method::GET, "/api/IsLoggedIn", &[])
                .await;
        assert_eq!(body_of(response).await, json!(["ERROR", false]));
    }

    #[tokio::test]
    async fn test_cookie_session_resolves_without_reverification() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.db.provision().await.unwrap();
        test_service(&state)
            .create_user("alice", "Alice", "secret123", true)
            .await
            .unwrap();

        let login = make_request(
            app(state.clone()),
            Method::PUT,
            "/api/Login",
            &[("wl_username", "alice"), ("wl_password", "secret123")],
        )
        .await;
        let cookie = login
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        // Wipe the server-side token: the cookie must still resolve, since
        // the cookie path never re-verifies credentials.
        test_service(&state).repo.clear_token(1).await.unwrap();

        let response = make_request(
            app(state),
            Method::GET,
            "/api/IsLoggedIn",
            &[("cookie", &cookie)],
        )
        .await;
        let body = body_of(response).await;
        assert_eq!(body[0], "OK");
        assert_eq!(body[1]["UserID"], 1);
        assert_eq!(body[1]["RealName"], "Alice");
    }

    #[tokio::test]
    async fn test_no_session_at_all() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.db.provision().await.unwrap();

        let response =
            make_request(app(state), Method::GET, "/api/IsLoggedIn", &[])
                .await;
        assert_eq!(body_of(response).await, json!(["ERROR", ""]));
    }

    #[tokio::test]
    async fn test_token_path_reestablishes_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.db.provision().await.unwrap();
        test_service(&state)
            .create_user("alice", "Alice", "secret123", false)
            .await
            .unwrap();

        let payload = test_service(&state)
            .login("alice", "secret123")
            .await
            .unwrap();

        // Composite token is username + hex, safe to embed raw.
        let path = format!("/api/IsLoggedIn?Token={}", payload.token);
        let response =
            make_request(app(state), Method::GET, &path, &[]).await;
        assert!(response.headers().get(header::SET_COOKIE).is_some());

        let body = body_of(response).await;
        assert_eq!(body[0], "OK");
        assert_eq!(body[1]["Token"], json!(payload.token));
        assert_eq!(body[1]["Timeout"], json!(SESSION_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn test_expired_token_revokes_and_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.db.provision().await.unwrap();
        let service = test_service(&state);
        service
            .create_user("alice", "Alice", "secret123", false)
            .await
            .unwrap();

        let payload = service.login("alice", "secret123").await.unwrap();
        let raw_token =
            payload.token.split(TOKEN_SEPARATOR).nth(1).unwrap().to_owned();
        service.repo.set_token(1, &raw_token, 1).await.unwrap();

        // Composite token is username + hex, safe to embed raw.
        let path = format!("/api/IsLoggedIn?Token={}", payload.token);
        let response =
            make_request(app(state.clone()), Method::GET, &path, &[]).await;
        assert_eq!(body_of(response).await, json!(["ERROR", ""]));

        let (token, expiration) =
            test_service(&state).repo.token_state(1).await.unwrap();
        assert_eq!(token, None);
        assert_eq!(expiration, None);

        // Replay of the now-cleared token.
        let response =
            make_request(app(state), Method::GET, &path, &[]).await;
        assert_eq!(
            body_of(response).await,
            json!(["ERROR", "Invalid username or password"])
        );
    }
}
