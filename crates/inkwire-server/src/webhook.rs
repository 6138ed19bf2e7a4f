// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inbound webhook endpoint for provider lifecycle events.
//!
//! The contract with the provider is deliberately lenient: the event is
//! appended to the log unconditionally (duplicates included), and downstream
//! reconciliation failures still answer 200 so the provider's retry storm is
//! never triggered for work we already captured. The only 500 is a failed
//! log write, the one case where the event is truly lost and a provider
//! retry can recover it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use inkwire_core::model::WebhookEvent;
use inkwire_core::status::EventKind;

use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-inkwire-signature";

type HmacSha256 = Hmac<Sha256>;

/// Inbound provider payload. Field names are the provider's.
#[derive(Debug, Deserialize)]
struct ProviderPayload {
    #[serde(rename = "RequestId")]
    request_id: Option<String>,
    #[serde(rename = "EventId")]
    event_id: Option<i64>,
    #[serde(rename = "EventTime")]
    event_time: Option<DateTime<Utc>>,
    #[serde(rename = "UserName")]
    user_name: Option<String>,
    #[serde(rename = "Email")]
    email: Option<String>,
}

/// `POST /webhooks/provider`.
///
/// 200 accepted (including "stored but reconciliation failed"), 400
/// malformed payload, 401 bad signature, 500 event-log write failure. 405
/// for non-POST comes from the method router.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret
        && !signature_valid(secret, &headers, &body)
    {
        warn!("Webhook rejected: bad or missing signature");
        return status_message(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let raw_payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return status_message(StatusCode::BAD_REQUEST, &format!("malformed JSON: {err}"));
        }
    };
    let payload: ProviderPayload = match serde_json::from_value(raw_payload.clone()) {
        Ok(payload) => payload,
        Err(err) => {
            return status_message(StatusCode::BAD_REQUEST, &format!("malformed payload: {err}"));
        }
    };

    let Some(request_id) = payload.request_id.filter(|id| !id.is_empty()) else {
        return status_message(StatusCode::BAD_REQUEST, "RequestId is required");
    };
    let Some(event_kind) = payload.event_id.and_then(EventKind::from_wire) else {
        return status_message(StatusCode::BAD_REQUEST, "EventId must be 1, 2 or 3");
    };

    let event = WebhookEvent {
        provider_request_id: request_id.clone(),
        event_kind,
        occurred_at: payload.event_time.unwrap_or_else(Utc::now),
        actor_name: payload.user_name.filter(|name| !name.is_empty()),
        actor_email: payload.email.filter(|email| !email.is_empty()),
        raw_payload,
    };

    // The append is the one write that must not be lost; everything after
    // it is recoverable from the log.
    if let Err(err) = state.events.append(&event).await {
        warn!(provider_request_id = %request_id, error = %err, "Event log write failed");
        return status_message(StatusCode::INTERNAL_SERVER_ERROR, "event storage failed");
    }
    info!(
        provider_request_id = %request_id,
        event_kind = ?event_kind,
        "Webhook event stored"
    );

    // Best-effort synchronous reconcile so the business record reflects the
    // event within this request. resolve() itself never errors.
    let resolved = state.reconciler.resolve(&request_id).await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "accepted": true,
            "status": resolved.status,
        })),
    )
        .into_response()
}

fn signature_valid(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(provided) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| hex::decode(value).ok())
    else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

fn status_message(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Compute the hex signature for a body, for clients and tests.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_body_round_trips_through_validation() {
        let secret = "hunter2";
        let body = br#"{"RequestId":"r1","EventId":1}"#;
        let signature = sign_body(secret, body);

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        assert!(signature_valid(secret, &headers, body));
    }

    #[test]
    fn test_tampered_body_fails_validation() {
        let secret = "hunter2";
        let signature = sign_body(secret, b"original");

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        assert!(!signature_valid(secret, &headers, b"tampered"));
    }

    #[test]
    fn test_missing_header_fails_validation() {
        assert!(!signature_valid("hunter2", &HeaderMap::new(), b"body"));
    }
}
