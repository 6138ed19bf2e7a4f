// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain types for the signature request lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{CanonicalStatus, EventKind, SignatoryStatus};

/// Signature-request facet of a business record.
///
/// Owned exclusively by the business record it annotates. The Dispatcher sets
/// `provider_request_id`; the Reconciler and Completion Handler set `status`,
/// `signatories`, and `archived_document_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRecord {
    /// Owning business entity's key.
    pub record_id: String,
    /// Provider-assigned correlation key. None until dispatched.
    pub provider_request_id: Option<String>,
    /// Canonical lifecycle status. Never `Unknown` when persisted.
    pub status: CanonicalStatus,
    /// Per-signatory progress, upserted by email. Never shrinks.
    pub signatories: Vec<SignatoryProgress>,
    /// Public reference to the archived signed artifact.
    pub archived_document_ref: Option<String>,
    /// When completion was claimed. Used as the cross-process
    /// single-flight marker for finalize.
    pub finalized_at: Option<DateTime<Utc>>,
}

impl BusinessRecord {
    /// A fresh, never-dispatched record facet.
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            provider_request_id: None,
            status: CanonicalStatus::None,
            signatories: Vec::new(),
            archived_document_ref: None,
            finalized_at: None,
        }
    }
}

/// Signing progress for one signatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatoryProgress {
    /// Display name.
    pub name: String,
    /// Email address; the upsert key within a record.
    pub email: String,
    /// Provider role/placement identifier.
    pub role_id: String,
    /// Current signing state.
    pub status: SignatoryStatus,
    /// When the signatory signed, if they have.
    pub signed_at: Option<DateTime<Utc>>,
}

/// One inbound webhook notification, as stored in the Event Log.
///
/// Rows are immutable once written and are never deduplicated at write time;
/// the log records occurrences, and dedup is a read-time concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Provider correlation key.
    pub provider_request_id: String,
    /// What the provider reported.
    pub event_kind: EventKind,
    /// Provider-reported event time (receipt time when absent).
    pub occurred_at: DateTime<Utc>,
    /// Acting signatory's name, when the event carries one.
    pub actor_name: Option<String>,
    /// Acting signatory's email, when the event carries one.
    pub actor_email: Option<String>,
    /// Full inbound payload, kept for audit and replay.
    pub raw_payload: serde_json::Value,
}

/// Source document for a dispatch.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Raw document bytes with the original file name.
    Bytes {
        /// Document content.
        data: Vec<u8>,
        /// Original file name; drives MIME normalization.
        file_name: String,
    },
    /// A fetchable URL the gateway downloads before uploading.
    RemoteUrl(String),
}

/// One signatory in a dispatch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatoryInput {
    /// Display name. Required.
    pub name: String,
    /// Email address. Required.
    pub email: String,
    /// Text-anchor identifier for auto-stamp placement. Required.
    pub anchor: String,
}

/// Input to `Dispatcher::dispatch`.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Business record to attach the signature request to.
    pub record_id: String,
    /// Document to send for signing.
    pub source: DocumentSource,
    /// Request title shown to signatories.
    pub title: String,
    /// Message shown to signatories.
    pub message: String,
    /// Signatories in signing order.
    pub signatories: Vec<SignatoryInput>,
    /// Webhook callback URL registered with the provider.
    pub callback_url: String,
}

/// Where a resolved status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// Derived from stored webhook events.
    EventLog,
    /// Derived from a live provider poll.
    ProviderPoll,
    /// Last-known persisted business status; low confidence.
    LastKnown,
    /// No source produced an answer.
    Unknown,
}

/// Answer from `StatusReconciler::resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedStatus {
    /// Canonical lifecycle status.
    pub status: CanonicalStatus,
    /// Structured signatory progress, when a business record is known.
    pub signatories: Vec<SignatoryProgress>,
    /// Which source produced the answer.
    pub source: StatusSource,
    /// Archive reference, when completion has run.
    pub archived_document_ref: Option<String>,
}

impl ResolvedStatus {
    /// The answer of last resort; `resolve` never errors.
    pub fn unknown() -> Self {
        Self {
            status: CanonicalStatus::Unknown,
            signatories: Vec::new(),
            source: StatusSource::Unknown,
            archived_document_ref: None,
        }
    }
}

/// Outcome of `CompletionHandler::finalize`.
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    /// Business record that was finalized.
    pub record_id: String,
    /// Public reference to the archived artifact, when archival succeeded.
    pub archived_document_ref: Option<String>,
    /// True when a previous finalize already ran and this caller merely
    /// observed its result.
    pub already_finalized: bool,
    /// Download failure detail, when signing finished but the artifact could
    /// not be fetched. The record is still Completed; the archive needs a
    /// manual retry.
    pub download_error: Option<String>,
}
