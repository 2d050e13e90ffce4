//! Webhook dispatch and health handlers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use operion_sources_core::callback::SourceEvent;
use operion_sources_core::model::ProviderId;
use serde_json::json;
use uuid::Uuid;

use crate::error::error_response;
use crate::state::WebhookServerState;

/// `POST /webhook/{externalId}`.
pub async fn handle_webhook(
    State(state): State<Arc<WebhookServerState>>,
    Path(external_id): Path<String>,
    Query(query_params): Query<HashMap<String, String>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if external_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "externalId must not be empty");
    }

    // Invalid and unknown externalIds are indistinguishable 404s, same as
    // an inactive source.
    let Ok(parsed_id) = Uuid::parse_str(&external_id) else {
        return not_found();
    };

    let source = match state.repository.find_by_external_id(parsed_id).await {
        Ok(Some(source)) if source.active => source,
        Ok(_) => return not_found(),
        Err(err) => {
            tracing::error!(%err, "failed to load webhook source");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to load webhook source");
        }
    };

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "request body exceeds maximum size"),
    };

    let decoded_body: serde_json::Value = if bytes.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "request body must be valid JSON"),
        }
    };

    if let Some(schema) = source.schema.as_ref() {
        if let Err(err) = state.validator.validate(&source.id, Some(schema), &decoded_body) {
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    }

    let remote_addr = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let enriched = json!({
        "webhook": {
            "method": method.as_str(),
            "url": "/webhook/".to_string() + &external_id,
            "remote_addr": remote_addr,
            "user_agent": user_agent,
            "content_length": bytes.len(),
            "timestamp": Utc::now().to_rfc3339(),
            "headers": headers_to_map(&headers),
            "query_params": query_params,
        },
        "body": decoded_body,
    });

    let event = SourceEvent {
        provider: ProviderId::Webhook,
        source_id: source.id.clone(),
        external_id: source.external_id,
        event_type: "WebhookReceived",
        occurred_at: Utc::now(),
        payload: enriched,
    };

    if let Err(err) = state.callback.invoke(event).await {
        tracing::error!(source_id = %source.id, %err, "webhook callback failed");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to process webhook");
    }

    (
        StatusCode::OK,
        Json(json!({"status": "success", "message": "Webhook received and processed"})),
    )
        .into_response()
}

/// `GET /health`.
pub async fn health(State(state): State<Arc<WebhookServerState>>) -> impl IntoResponse {
    let registered_sources = state.repository.find_all_active().await.map(|v| v.len()).unwrap_or(0);
    Json(json!({"status": "ok", "registered_sources": registered_sources}))
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "source not found")
}

fn headers_to_map(headers: &HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.to_string(), serde_json::Value::String(joined));
    }
    serde_json::Value::Object(map)
}
