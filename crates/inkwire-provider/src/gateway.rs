// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP implementation of the signing provider seam.
//!
//! All provider I/O funnels through [`HttpProviderGateway`]: OAuth bearer
//! auth from the [`CredentialStore`], base64 document upload, submission
//! payload construction, and the ordered endpoint fallback for status polls
//! and artifact downloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use async_trait::async_trait;
use inkwire_core::error::ProviderError;
use inkwire_core::model::DocumentSource;
use inkwire_core::provider::{
    DocumentToken, PollOutcome, RawStatus, SignedArtifact, SigningProvider, SubmitRequest,
};

use crate::credentials::CredentialStore;
use crate::endpoints::{ARTIFACT_VARIANTS, STATUS_VARIANTS, SUBMIT_PATH, UPLOAD_PATH};
use crate::payload::SubmissionPayload;

/// Provider calls are interactive; fail fast rather than hanging a webhook
/// handler on a stuck download.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Document formats the provider accepts.
const SUPPORTED_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "DocumentToken")]
    document_token: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "RequestId")]
    request_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(rename = "Status")]
    status: String,
}

/// `SigningProvider` over the provider's HTTP API.
pub struct HttpProviderGateway {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl HttpProviderGateway {
    /// Create a gateway for the given API base URL and credential store.
    pub fn new(base_url: String, credentials: Arc<CredentialStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        self.credentials.access_token(&self.http).await
    }

    /// Issue an authenticated GET; on 401 the cached token is dropped so the
    /// next call refreshes.
    async fn get_authed(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                reason: format!("GET {path} failed: {err}"),
            })?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.credentials.clear().await;
            return Err(ProviderError::AuthRequired);
        }
        Ok(response)
    }

    /// Resolve the upload file name and MIME type, fetching remote sources.
    async fn resolve_source(
        &self,
        source: DocumentSource,
    ) -> Result<(Vec<u8>, String, &'static str), ProviderError> {
        let (data, file_name) = match source {
            DocumentSource::Bytes { data, file_name } => (data, file_name),
            DocumentSource::RemoteUrl(url) => {
                let response =
                    self.http
                        .get(&url)
                        .send()
                        .await
                        .map_err(|err| ProviderError::Upload {
                            reason: format!("fetching document from '{url}' failed: {err}"),
                        })?;
                if !response.status().is_success() {
                    return Err(ProviderError::Upload {
                        reason: format!(
                            "document source '{url}' answered {}",
                            response.status()
                        ),
                    });
                }
                let file_name = url
                    .rsplit('/')
                    .next()
                    .filter(|name| !name.is_empty())
                    .unwrap_or("document.pdf")
                    .to_string();
                let bytes = response.bytes().await.map_err(|err| ProviderError::Upload {
                    reason: format!("reading document body failed: {err}"),
                })?;
                (bytes.to_vec(), file_name)
            }
        };

        if data.is_empty() {
            return Err(ProviderError::Upload {
                reason: "document source is empty".to_string(),
            });
        }

        let extension = file_name
            .rsplit('.')
            .next()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let content_type = SUPPORTED_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| *mime)
            .ok_or_else(|| ProviderError::Upload {
                reason: format!("unsupported document type '.{extension}' (PDF or DOCX only)"),
            })?;

        Ok((data, file_name, content_type))
    }
}

#[async_trait]
impl SigningProvider for HttpProviderGateway {
    async fn upload(&self, source: DocumentSource) -> Result<DocumentToken, ProviderError> {
        let (data, file_name, content_type) = self.resolve_source(source).await?;
        let token = self.bearer().await?;

        let body = serde_json::json!({
            "FileName": file_name,
            "ContentType": content_type,
            "Content": BASE64.encode(&data),
        });
        let response = self
            .http
            .post(self.url(UPLOAD_PATH))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Upload {
                reason: format!("upload request failed: {err}"),
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.credentials.clear().await;
            return Err(ProviderError::AuthRequired);
        }
        if !response.status().is_success() {
            return Err(ProviderError::Upload {
                reason: format!("provider answered {}", response.status()),
            });
        }

        let upload: UploadResponse =
            response.json().await.map_err(|err| ProviderError::Upload {
                reason: format!("malformed upload response: {err}"),
            })?;
        debug!(file_name, content_type, "Document uploaded");
        Ok(DocumentToken(upload.document_token))
    }

    async fn submit(&self, request: SubmitRequest) -> Result<String, ProviderError> {
        let token = self.bearer().await?;
        let payload = SubmissionPayload::from_request(&request);

        let response = self
            .http
            .post(self.url(SUBMIT_PATH))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                reason: format!("submit request failed: {err}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.credentials.clear().await;
            return Err(ProviderError::AuthRequired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let submit: SubmitResponse =
            response
                .json()
                .await
                .map_err(|err| ProviderError::Submission {
                    status: status.as_u16(),
                    body: format!("malformed submit response: {err}"),
                })?;
        Ok(submit.request_id)
    }

    async fn poll_status(
        &self,
        provider_request_id: &str,
    ) -> Result<PollOutcome, ProviderError> {
        for variant in STATUS_VARIANTS {
            let path = variant.path_for(provider_request_id);
            let response = self.get_authed(&path).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                debug!(
                    provider_request_id,
                    endpoint = variant.name,
                    "Status endpoint 404; trying next variant"
                );
                continue;
            }
            if !status.is_success() {
                return Err(ProviderError::Transport {
                    reason: format!("status endpoint '{}' answered {status}", variant.name),
                });
            }

            let parsed: StatusResponse =
                response
                    .json()
                    .await
                    .map_err(|err| ProviderError::Transport {
                        reason: format!("malformed status response: {err}"),
                    })?;
            return Ok(PollOutcome::Found(RawStatus {
                status: parsed.status,
                endpoint: variant.name,
            }));
        }

        // Every variant 404ed: the request is gone from the provider.
        Ok(PollOutcome::NotFound)
    }

    async fn download_artifact(
        &self,
        provider_request_id: &str,
    ) -> Result<SignedArtifact, ProviderError> {
        for variant in ARTIFACT_VARIANTS {
            let path = variant.path_for(provider_request_id);
            let response = self.get_authed(&path).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                debug!(
                    provider_request_id,
                    endpoint = variant.name,
                    "Artifact endpoint 404; trying next variant"
                );
                continue;
            }
            if !status.is_success() {
                return Err(ProviderError::Download {
                    reason: format!("artifact endpoint '{}' answered {status}", variant.name),
                });
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("application/pdf")
                .to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| ProviderError::Download {
                    reason: format!("reading artifact body failed: {err}"),
                })?;
            if bytes.is_empty() {
                return Err(ProviderError::Download {
                    reason: format!("artifact endpoint '{}' returned an empty body", variant.name),
                });
            }
            return Ok(SignedArtifact {
                bytes: bytes.to_vec(),
                content_type,
            });
        }

        warn!(provider_request_id, "No artifact endpoint variant had the document");
        Err(ProviderError::Download {
            reason: "artifact not found at any endpoint".to_string(),
        })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        self.bearer().await
    }
}
