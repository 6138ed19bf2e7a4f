// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway tests against a mocked provider HTTP API.

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inkwire_core::error::ProviderError;
use inkwire_core::model::{DocumentSource, SignatoryInput};
use inkwire_core::provider::{DocumentToken, PollOutcome, SigningProvider, SubmitRequest};
use inkwire_provider::{CredentialStore, HttpProviderGateway, ProviderCredentials};

fn gateway(server: &MockServer, refresh_token: Option<&str>) -> HttpProviderGateway {
    let credentials = Arc::new(CredentialStore::new(
        ProviderCredentials {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            refresh_token: refresh_token.map(str::to_string),
        },
        format!("{}/oauth/token", server.uri()),
    ));
    HttpProviderGateway::new(server.uri(), credentials)
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

fn submit_request() -> SubmitRequest {
    SubmitRequest {
        document_token: DocumentToken("tok-1".to_string()),
        title: "Lease".to_string(),
        message: "Please sign.".to_string(),
        signatories: vec![SignatoryInput {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            anchor: "sig-1".to_string(),
        }],
        callback_url: "https://example.com/webhooks/provider".to_string(),
        attach_documents_on_complete: true,
    }
}

#[tokio::test]
async fn test_access_token_refreshes_once_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    assert_eq!(gateway.access_token().await.unwrap(), "fresh-token");
    // Second call must come from the cache.
    assert_eq!(gateway.access_token().await.unwrap(), "fresh-token");
}

#[tokio::test]
async fn test_rejected_refresh_token_is_auth_required() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("revoked"));
    assert!(matches!(
        gateway.access_token().await.unwrap_err(),
        ProviderError::AuthRequired
    ));
}

#[tokio::test]
async fn test_upload_sends_base64_content() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/documents"))
        .and(body_string_contains("contract.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "DocumentToken": "doc-token-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    let token = gateway
        .upload(DocumentSource::Bytes {
            data: b"%PDF-1.7 test".to_vec(),
            file_name: "contract.pdf".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(token.0, "doc-token-1");
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension_before_any_call() {
    let server = MockServer::start().await;
    let gateway = gateway(&server, Some("refresh-1"));

    let err = gateway
        .upload(DocumentSource::Bytes {
            data: b"GIF89a".to_vec(),
            file_name: "contract.gif".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Upload { ref reason } if reason.contains(".gif")));
    // No token refresh, no upload: the type check happens first.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_fetches_remote_url_source() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/files/lease.docx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK docx bytes".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/documents"))
        .and(body_string_contains("wordprocessingml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "DocumentToken": "doc-token-2",
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    let token = gateway
        .upload(DocumentSource::RemoteUrl(format!(
            "{}/files/lease.docx",
            server.uri()
        )))
        .await
        .unwrap();
    assert_eq!(token.0, "doc-token-2");
}

#[tokio::test]
async fn test_submit_returns_provider_request_id() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/signature-requests"))
        .and(body_string_contains("\"Signatories\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "RequestId": "req-123",
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    assert_eq!(gateway.submit(submit_request()).await.unwrap(), "req-123");
}

#[tokio::test]
async fn test_submit_failure_carries_status_and_body() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/signature-requests"))
        .respond_with(ResponseTemplate::new(422).set_body_string("signatory order conflict"))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    match gateway.submit(submit_request()).await.unwrap_err() {
        ProviderError::Submission { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("order conflict"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_falls_back_to_legacy_endpoint_on_404() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/signature-requests/req-1/status"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/drafts/req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Status": "in_progress",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    match gateway.poll_status("req-1").await.unwrap() {
        PollOutcome::Found(raw) => {
            assert_eq!(raw.status, "in_progress");
            assert_eq!(raw.endpoint, "legacy-draft");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_not_found_when_every_variant_404s() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    assert_eq!(
        gateway.poll_status("purged").await.unwrap(),
        PollOutcome::NotFound
    );
}

#[tokio::test]
async fn test_download_prefers_current_endpoint() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/signature-requests/req-1/document"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7 signed".to_vec()),
        )
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    let artifact = gateway.download_artifact("req-1").await.unwrap();
    assert_eq!(artifact.content_type, "application/pdf");
    assert!(!artifact.bytes.is_empty());
}

#[tokio::test]
async fn test_empty_download_body_is_an_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/signature-requests/req-1/document"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::new()))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    let err = gateway.download_artifact("req-1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Download { ref reason } if reason.contains("empty")));
}

#[tokio::test]
async fn test_provider_401_clears_cache_and_reports_auth_required() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/signature-requests/req-1/status"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let gateway = gateway(&server, Some("refresh-1"));
    assert!(matches!(
        gateway.poll_status("req-1").await.unwrap_err(),
        ProviderError::AuthRequired
    ));
}
