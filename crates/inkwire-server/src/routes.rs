// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API routes: dispatch, status reads, health.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use inkwire_core::Error;
use inkwire_core::model::{DispatchRequest, DocumentSource, SignatoryInput};

use crate::state::AppState;
use crate::webhook;

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/provider", post(webhook::receive))
        .route("/requests/{record_id}/dispatch", post(dispatch))
        .route("/requests/{record_id}/refresh", post(refresh))
        .route("/requests/{record_id}", get(status))
        .with_state(state)
}

/// Dispatch request body. The document is either inline base64 or a URL.
#[derive(Debug, Deserialize)]
struct DispatchBody {
    title: String,
    #[serde(default)]
    message: String,
    signatories: Vec<SignatoryInput>,
    #[serde(default)]
    document_base64: Option<String>,
    #[serde(default)]
    document_file_name: Option<String>,
    #[serde(default)]
    document_url: Option<String>,
    /// Overrides the server-configured callback URL.
    #[serde(default)]
    callback_url: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<DispatchBody>,
) -> Response {
    let source = match document_source(&body) {
        Ok(source) => source,
        Err(err) => return error_response(err),
    };
    let Some(callback_url) = body.callback_url.or_else(|| state.callback_url.clone()) else {
        return error_response(Error::Validation {
            field: "callback_url".to_string(),
            message: "no callback URL supplied and none configured".to_string(),
        });
    };

    let request = DispatchRequest {
        record_id,
        source,
        title: body.title,
        message: body.message,
        signatories: body.signatories,
        callback_url,
    };

    match state.dispatcher.dispatch(request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "record_id": outcome.record_id,
                "provider_request_id": outcome.provider_request_id,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn status(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
) -> Response {
    match state.reconciler.resolve_record(&record_id).await {
        Ok(resolved) => (StatusCode::OK, Json(resolved)).into_response(),
        Err(err) => error_response(err),
    }
}

/// User-triggered refresh; same resolution path as `status`, the route
/// exists so clients can express intent explicitly.
async fn refresh(
    state: State<Arc<AppState>>,
    record_id: Path<String>,
) -> Response {
    status(state, record_id).await
}

fn document_source(body: &DispatchBody) -> Result<DocumentSource, Error> {
    if let Some(url) = &body.document_url {
        return Ok(DocumentSource::RemoteUrl(url.clone()));
    }
    let (Some(content), Some(file_name)) = (&body.document_base64, &body.document_file_name)
    else {
        return Err(Error::Validation {
            field: "document".to_string(),
            message: "either document_url or document_base64 with document_file_name is required"
                .to_string(),
        });
    };
    let data = BASE64.decode(content).map_err(|err| Error::Validation {
        field: "document_base64".to_string(),
        message: format!("invalid base64: {err}"),
    })?;
    Ok(DocumentSource::Bytes {
        data,
        file_name: file_name.clone(),
    })
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::AuthRequired => StatusCode::UNAUTHORIZED,
        Error::RecordNotFound(_) | Error::NotDispatched(_) => StatusCode::NOT_FOUND,
        Error::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}
