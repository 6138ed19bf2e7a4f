// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock signing provider for testing.
//!
//! Scripted responses plus call counters, so tests can assert both outcomes
//! and the number of network round trips that would have happened.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{DocumentToken, PollOutcome, RawStatus, SignedArtifact, SigningProvider, SubmitRequest};
use crate::error::ProviderError;
use crate::model::DocumentSource;

/// Scripted signing provider.
pub struct MockProvider {
    /// Answer for `poll_status`. Defaults to `NotFound`.
    poll_outcome: Mutex<PollOutcome>,
    /// Answer for `download_artifact`. `None` scripts a download failure.
    artifact: Mutex<Option<SignedArtifact>>,
    /// Provider request ID returned by `submit`.
    request_id: String,
    /// When false, every call fails with `AuthRequired`.
    authenticated: bool,
    upload_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// A healthy provider that reports `NotFound` on polls.
    pub fn new() -> Self {
        Self {
            poll_outcome: Mutex::new(PollOutcome::NotFound),
            artifact: Mutex::new(Some(SignedArtifact {
                bytes: b"%PDF-1.7 signed".to_vec(),
                content_type: "application/pdf".to_string(),
            })),
            request_id: "mock-request-1".to_string(),
            authenticated: true,
            upload_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// A provider with no valid credentials.
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            ..Self::new()
        }
    }

    /// Script the status every subsequent poll returns.
    pub async fn set_poll_status(&self, raw_status: &str) {
        *self.poll_outcome.lock().await = PollOutcome::Found(RawStatus {
            status: raw_status.to_string(),
            endpoint: "mock",
        });
    }

    /// Script polls to report the request as purged.
    pub async fn set_poll_not_found(&self) {
        *self.poll_outcome.lock().await = PollOutcome::NotFound;
    }

    /// Script artifact downloads to fail.
    pub async fn fail_downloads(&self) {
        *self.artifact.lock().await = None;
    }

    /// Number of `upload` calls made.
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Number of `submit` calls made.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of `poll_status` calls made.
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Number of `download_artifact` calls made.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn check_auth(&self) -> Result<(), ProviderError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(ProviderError::AuthRequired)
        }
    }
}

#[async_trait]
impl SigningProvider for MockProvider {
    async fn upload(&self, _source: DocumentSource) -> Result<DocumentToken, ProviderError> {
        self.check_auth()?;
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DocumentToken("mock-document-token".to_string()))
    }

    async fn submit(&self, _request: SubmitRequest) -> Result<String, ProviderError> {
        self.check_auth()?;
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.request_id.clone())
    }

    async fn poll_status(
        &self,
        _provider_request_id: &str,
    ) -> Result<PollOutcome, ProviderError> {
        self.check_auth()?;
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.poll_outcome.lock().await.clone())
    }

    async fn download_artifact(
        &self,
        provider_request_id: &str,
    ) -> Result<SignedArtifact, ProviderError> {
        self.check_auth()?;
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.artifact
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Download {
                reason: format!("no artifact for request '{provider_request_id}'"),
            })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        self.check_auth()?;
        Ok("mock-access-token".to_string())
    }
}
