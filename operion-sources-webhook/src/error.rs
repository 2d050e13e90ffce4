//! The webhook ingress error response shape:
//! `{"status":"error","message":<text>,"code":<int>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "status": "error",
        "message": message.into(),
        "code": status.as_u16(),
    });
    (status, Json(body)).into_response()
}
