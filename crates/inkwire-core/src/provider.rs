// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Signing provider trait seam.
//!
//! Everything the engine needs from the external signing service goes
//! through [`SigningProvider`]. The HTTP implementation lives in
//! `inkwire-provider`; [`mock::MockProvider`] is a scripted implementation
//! for tests and embedded setups.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{DocumentSource, SignatoryInput};

pub mod mock;

/// Opaque provider token identifying an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentToken(pub String);

/// Submission parameters for a new signature request.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Token from a prior `upload`.
    pub document_token: DocumentToken,
    /// Request title shown to signatories.
    pub title: String,
    /// Message shown to signatories.
    pub message: String,
    /// Signatories in signing order.
    pub signatories: Vec<SignatoryInput>,
    /// Webhook callback URL.
    pub callback_url: String,
    /// Whether the provider should attach signed documents to the
    /// completion webhook.
    pub attach_documents_on_complete: bool,
}

/// Raw status answer from a provider poll, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatus {
    /// Provider-native status string.
    pub status: String,
    /// Which endpoint variant answered (for logging).
    pub endpoint: &'static str,
}

/// Outcome of a provider status poll.
///
/// `NotFound` means every endpoint variant returned 404. That is a signal,
/// not a failure: the provider purges completed requests, so callers fall
/// back to last-known state instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A status endpoint answered.
    Found(RawStatus),
    /// Every endpoint variant returned 404.
    NotFound,
}

/// The final signed artifact.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    /// Artifact bytes.
    pub bytes: Vec<u8>,
    /// Content type reported by the provider.
    pub content_type: String,
}

/// Gateway to the external signing provider.
///
/// Implementations are stateless aside from cached short-lived credentials;
/// all methods are safe to call concurrently for different request IDs.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Upload a document, normalizing MIME type and extension first.
    async fn upload(&self, source: DocumentSource) -> Result<DocumentToken, ProviderError>;

    /// Submit a signature request; returns the provider request ID.
    async fn submit(&self, request: SubmitRequest) -> Result<String, ProviderError>;

    /// Poll the provider for current status, walking the endpoint variants
    /// in fixed priority order.
    async fn poll_status(&self, provider_request_id: &str)
    -> Result<PollOutcome, ProviderError>;

    /// Download the final signed artifact.
    async fn download_artifact(
        &self,
        provider_request_id: &str,
    ) -> Result<SignedArtifact, ProviderError>;

    /// Return a valid access token, refreshing transparently if needed.
    async fn access_token(&self) -> Result<String, ProviderError>;
}
