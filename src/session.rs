//! Session resolution.
//!
//! A session reaches the server over one of two channels: the `userData`
//! cookie written at login, or a client-held composite token for the
//! installed variant that has no cookie storage. The cookie is a local
//! identity cache with a short lifetime; the Token column in the store
//! stays the source of truth for token-flow validity.

use axum::http::{HeaderMap, HeaderValue, header};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::user::{AuthService, Options};

/// Cookie carrying the serialized [`SessionPayload`].
pub const SESSION_COOKIE: &str = "userData";

/// Cookie lifetime: one hour, deliberately shorter than the one-week token.
const COOKIE_MAX_AGE_SECS: u64 = 3600;

/// Identity and preferences bundle returned on successful authentication.
/// Serialized into the cookie, never persisted as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(rename = "UserID")]
    pub user_id: i64,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Realname")]
    pub realname: String,
    #[serde(rename = "Admin")]
    pub admin: i64,
    /// Composite token: plaintext username, separator, ciphered token.
    #[serde(rename = "Token")]
    pub token: String,
    #[serde(rename = "Timeout")]
    pub timeout: i64,
    #[serde(rename = "Options")]
    pub options: Options,
}

/// Build the `Set-Cookie` value holding a session payload.
pub fn session_cookie(payload: &SessionPayload) -> Result<HeaderValue> {
    let json = serde_json::to_string(payload)?;
    let value = Base64::encode_string(json.as_bytes());

    Ok(HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={value}; Max-Age={COOKIE_MAX_AGE_SECS}; Path=/; \
         HttpOnly; SameSite=Lax"
    ))?)
}

/// `Set-Cookie` value that deletes the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "userData=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax",
    )
}

/// Resolves identity from the `userData` cookie.
///
/// The payload is trusted as-is without re-verification against the store.
/// That trust boundary is intentional and lives only here: swap this
/// strategy to re-verify.
pub struct CookieStrategy;

impl CookieStrategy {
    pub fn resolve(headers: &HeaderMap) -> Option<SessionPayload> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .map(str::trim)
            .find_map(|pair| {
                pair.strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
            })
            .and_then(|value| Base64::decode_vec(value).ok())
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }
}

/// Resolves identity from a presented composite token, re-establishing a
/// cookie session when the token is still valid.
pub struct TokenStrategy<'a> {
    service: &'a AuthService,
}

impl<'a> TokenStrategy<'a> {
    pub fn new(service: &'a AuthService) -> Self {
        Self { service }
    }

    pub async fn resolve(&self, composite: &str) -> Result<SessionPayload> {
        self.service.validate_token(composite).await
    }
}

/// Authorization decision for privileged mutations.
pub fn is_admin(session: Option<&SessionPayload>) -> bool {
    session.is_some_and(|payload| payload.admin == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SessionPayload {
        SessionPayload {
            user_id: 1,
            username: "alice".into(),
            realname: "Alice".into(),
            admin: 1,
            token: "alice*****abcdef".into(),
            timeout: crate::user::SESSION_TIMEOUT_MS,
            options: Options::default(),
        }
    }

    #[test]
    fn test_cookie_roundtrip() {
        let cookie = session_cookie(&payload()).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("userData="));
        assert!(value.contains("Max-Age=3600"));
        assert!(value.contains("HttpOnly"));

        // Client echoes the pair back, with extra cookies around it.
        let pair = value.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; {pair}; theme=dark"))
                .unwrap(),
        );

        let resolved = CookieStrategy::resolve(&headers).unwrap();
        assert_eq!(resolved, payload());
    }

    #[test]
    fn test_unusable_cookies_resolve_to_none() {
        let headers = HeaderMap::new();
        assert_eq!(CookieStrategy::resolve(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("userData=not-base64-json"),
        );
        assert_eq!(CookieStrategy::resolve(&headers), None);
    }

    #[test]
    fn test_is_admin_needs_truthy_sentinel() {
        assert!(!is_admin(None));

        let mut session = payload();
        assert!(is_admin(Some(&session)));

        session.admin = 0;
        assert!(!is_admin(Some(&session)));

        // Anything other than the sentinel stays non-admin.
        session.admin = 2;
        assert!(!is_admin(Some(&session)));
    }
}
