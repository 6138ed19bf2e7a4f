// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for inkwire-core.
//!
//! Defines the narrow contracts the engine consumes (event log, business
//! record facet, archival blob store) plus the backend implementations.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::{PostgresStore, health_check};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{BusinessRecord, SignatoryProgress, WebhookEvent};
use crate::status::CanonicalStatus;

/// Append-only log of inbound webhook notifications.
///
/// The log records occurrences, not a deduplicated set: duplicate deliveries
/// are appended like any other row, and rows are never updated or deleted.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append one event. The only failure mode here is a storage failure,
    /// which the webhook endpoint must report as a failed delivery.
    async fn append(&self, event: &WebhookEvent) -> Result<()>;

    /// All stored events for a provider request, oldest first.
    async fn events_for_request(&self, provider_request_id: &str) -> Result<Vec<WebhookEvent>>;
}

/// Signature facet of the relational business-record store.
#[async_trait]
pub trait BusinessRecords: Send + Sync {
    /// Create a blank record facet.
    async fn create(&self, record_id: &str) -> Result<()>;

    /// Fetch a record by its business key.
    async fn get(&self, record_id: &str) -> Result<Option<BusinessRecord>>;

    /// Fetch a record by the provider correlation key.
    async fn find_by_provider_request(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<BusinessRecord>>;

    /// Record a successful dispatch: store the correlation ID and move the
    /// status to Pending.
    async fn set_dispatched(&self, record_id: &str, provider_request_id: &str) -> Result<()>;

    /// Update the canonical status. Implementations must refuse downgrades:
    /// a status with a lower terminality rank than the stored one is a no-op.
    async fn update_status(&self, record_id: &str, status: CanonicalStatus) -> Result<()>;

    /// Insert or update one signatory's progress, keyed by email.
    async fn upsert_signatory(&self, record_id: &str, progress: &SignatoryProgress)
    -> Result<()>;

    /// Atomically claim the completion step for a record.
    ///
    /// The first caller wins: the claim sets `finalized_at` and advances the
    /// status to Completed in one conditional write. Returns false when the
    /// record was already claimed, in which case the caller observes the
    /// existing result instead of re-running completion.
    async fn claim_finalize(&self, record_id: &str) -> Result<bool>;

    /// Store the archive reference produced by completion.
    async fn set_archived(&self, record_id: &str, archived_ref: &str) -> Result<()>;
}

/// Durable blob store for archived signed artifacts.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store an artifact; returns a stable public reference.
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}
