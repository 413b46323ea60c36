//! HTTP API routes.
//!
//! Every contract response is a two-element JSON array: `["OK", value]` on
//! success, `["ERROR", value]` on failure (see `crate::error`). The UI
//! switches on the first element, so handlers reply 200 either way.

pub mod create;
pub mod login;
pub mod status;

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// `["OK", value]` reply.
pub fn ok(value: impl Serialize) -> Json<Value> {
    Json(json!(["OK", value]))
}

/// `["ERROR", value]` reply for failures built inside a handler.
pub fn error(value: impl Serialize) -> Json<Value> {
    Json(json!(["ERROR", value]))
}

/// Bare single-message reply, kept for the provisioning parameter checks.
pub fn message(text: &str) -> Json<Value> {
    Json(json!([text]))
}
