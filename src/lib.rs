//! Authentication and session core of the WatchList media tracker.
//!
//! Identity fields are ciphered at rest, sessions travel either as a
//! short-lived `userData` cookie or as a client-held composite token, and
//! the whole instance lives in one SQLite file whose absence means
//! "not set up yet".

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod router;
pub mod session;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::{get, put};
pub use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub crypto: Arc<crypto::SymmetricCipher>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new().latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove credentials and cookies from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::COOKIE,
            HeaderName::from_static("wl_username"),
            HeaderName::from_static("wl_password"),
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `PUT /api/Login` goes to `login`.
        .route("/api/Login", put(router::login::handler))
        // `GET /api/IsLoggedIn` goes to `status`.
        .route("/api/IsLoggedIn", get(router::status::handler))
        // `GET /api/AddUser` goes to `create`. Admin or first run only.
        .route("/api/AddUser", get(router::create::handler))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
///
/// Fails fast when the cipher secret is missing: a process without its key
/// cannot verify anything.
pub fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read();
    config.validate()?;

    let secret = config.secret.clone().unwrap_or_default();
    let key = crypto::SymmetricKey::derive_from_secret(&secret, config.salt())?;
    let crypto = Arc::new(crypto::SymmetricCipher::new(key));

    let db = database::Database::new(config.database_file());
    if !db.exists() {
        tracing::warn!(
            path = %db.path().display(),
            "store file absent, instance waits for first-run setup"
        );
    }

    Ok(AppState { config, db, crypto })
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    headers: &[(&str, &str)],
) -> axum::http::Response<axum::body::Body> {
    use tower::util::ServiceExt;

    let mut builder = axum::extract::Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    app.oneshot(builder.body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap()
}

#[cfg(test)]
pub fn test_state(dir: &std::path::Path) -> AppState {
    let yaml = format!(
        "secret: test-secret\ndatabase: {}",
        dir.join("watchlistdb.sqlite").display()
    );
    let config: config::Configuration = serde_yaml::from_str(&yaml).unwrap();
    let config = Arc::new(config);

    let key = crypto::SymmetricKey::derive_from_secret(
        "test-secret",
        config.salt(),
    )
    .unwrap();

    AppState {
        db: database::Database::new(config.database_file()),
        crypto: Arc::new(crypto::SymmetricCipher::new(key)),
        config,
    }
}

#[cfg(test)]
pub fn test_state_without_secret(dir: &std::path::Path) -> AppState {
    let mut state = test_state(dir);
    let yaml = format!(
        "database: {}",
        dir.join("watchlistdb.sqlite").display()
    );
    let config: config::Configuration = serde_yaml::from_str(&yaml).unwrap();
    state.config = Arc::new(config);
    state
}

#[cfg(test)]
pub fn test_service(state: &AppState) -> user::AuthService {
    user::AuthService::new(state.db.clone(), Arc::clone(&state.crypto))
}
