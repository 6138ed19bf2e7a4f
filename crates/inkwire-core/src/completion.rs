// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Completion handling: retrieve and archive the signed artifact exactly
//! once per provider request.
//!
//! Two callers race here routinely — a webhook-driven reconcile and a
//! user-triggered refresh. Serialization is two-layered: a per-request-ID
//! mutex table serializes callers inside this process, and the
//! `claim_finalize` conditional write protects against a second process.
//! Later callers observe the first caller's result instead of re-downloading.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, ProviderError, Result};
use crate::model::ArchiveResult;
use crate::persistence::{ArchiveStore, BusinessRecords};
use crate::provider::SigningProvider;

/// Finalizes completed signature requests.
pub struct CompletionHandler {
    provider: Arc<dyn SigningProvider>,
    records: Arc<dyn BusinessRecords>,
    archive: Arc<dyn ArchiveStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CompletionHandler {
    /// Create a completion handler over the given collaborators.
    pub fn new(
        provider: Arc<dyn SigningProvider>,
        records: Arc<dyn BusinessRecords>,
        archive: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            provider,
            records,
            archive,
            locks: DashMap::new(),
        }
    }

    /// Download and archive the signed artifact for a completed request.
    ///
    /// Idempotent: at most one download/archive ever runs per
    /// `provider_request_id`; concurrent and subsequent callers get the
    /// first run's result with `already_finalized` set.
    ///
    /// A `DownloadError` still advances the record to Completed — the
    /// signing itself succeeded — with a null archive ref and the failure
    /// reported in the result for manual retry. `AuthRequired` and archive
    /// storage failures propagate; this is a write path.
    pub async fn finalize(
        &self,
        provider_request_id: &str,
        record_id: &str,
    ) -> Result<ArchiveResult> {
        let lock = self
            .locks
            .entry(provider_request_id.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let record = self
            .records
            .get(record_id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;

        if record.finalized_at.is_some() {
            return Ok(ArchiveResult {
                record_id: record_id.to_string(),
                archived_document_ref: record.archived_document_ref,
                already_finalized: true,
                download_error: None,
            });
        }

        // Surface credential problems before claiming; the claim should only
        // be spent on an attempt that can actually reach the provider.
        self.provider.access_token().await?;

        if !self.records.claim_finalize(record_id).await? {
            // Another process claimed between our read and the write;
            // observe its result.
            let record = self
                .records
                .get(record_id)
                .await?
                .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
            return Ok(ArchiveResult {
                record_id: record_id.to_string(),
                archived_document_ref: record.archived_document_ref,
                already_finalized: true,
                download_error: None,
            });
        }

        match self.provider.download_artifact(provider_request_id).await {
            Ok(artifact) => {
                let archived_ref = self
                    .archive
                    .put(&artifact.bytes, &artifact.content_type)
                    .await?;
                self.records.set_archived(record_id, &archived_ref).await?;

                info!(
                    provider_request_id,
                    record_id,
                    archived_ref,
                    size = artifact.bytes.len(),
                    "Archived signed artifact"
                );

                Ok(ArchiveResult {
                    record_id: record_id.to_string(),
                    archived_document_ref: Some(archived_ref),
                    already_finalized: false,
                    download_error: None,
                })
            }
            Err(ProviderError::AuthRequired) => Err(Error::AuthRequired),
            Err(err) => {
                // Signing finished; the record must reflect that even when
                // the artifact cannot be fetched right now.
                warn!(
                    provider_request_id,
                    record_id,
                    error = %err,
                    "Artifact download failed; record completed without archive"
                );
                Ok(ArchiveResult {
                    record_id: record_id.to_string(),
                    archived_document_ref: None,
                    already_finalized: false,
                    download_error: Some(err.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BusinessRecord;
    use crate::persistence::MemoryStore;
    use crate::provider::mock::MockProvider;
    use crate::status::CanonicalStatus;

    fn dispatched_record(record_id: &str, provider_request_id: &str) -> BusinessRecord {
        BusinessRecord {
            provider_request_id: Some(provider_request_id.to_string()),
            status: CanonicalStatus::PartiallySigned,
            ..BusinessRecord::new(record_id)
        }
    }

    async fn handler_with(
        provider: Arc<MockProvider>,
    ) -> (CompletionHandler, Arc<MemoryStore>) {
        let store =
            Arc::new(MemoryStore::with_records(vec![dispatched_record("a1", "r1")]).await);
        let handler = CompletionHandler::new(
            provider,
            store.clone() as Arc<dyn BusinessRecords>,
            store.clone() as Arc<dyn ArchiveStore>,
        );
        (handler, store)
    }

    #[tokio::test]
    async fn test_finalize_downloads_and_archives_once() {
        let provider = Arc::new(MockProvider::new());
        let (handler, store) = handler_with(provider.clone()).await;

        let result = handler.finalize("r1", "a1").await.unwrap();
        assert!(!result.already_finalized);
        let archived_ref = result.archived_document_ref.unwrap();
        assert!(store.archived(&archived_ref).await.is_some());

        let record = store.get("a1").await.unwrap().unwrap();
        assert_eq!(record.status, CanonicalStatus::Completed);
        assert_eq!(record.archived_document_ref.as_deref(), Some(archived_ref.as_str()));
        assert_eq!(provider.download_calls(), 1);
        assert_eq!(store.archive_puts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_is_single_flight() {
        let provider = Arc::new(MockProvider::new());
        let (handler, store) = handler_with(provider.clone()).await;
        let handler = Arc::new(handler);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                handler.finalize("r1", "a1").await.unwrap()
            }));
        }

        let mut refs = Vec::new();
        for task in tasks {
            let result = task.await.unwrap();
            refs.push(result.archived_document_ref.expect("every caller sees the ref"));
        }

        // Exactly one download and one archive write; every caller observed
        // the same reference.
        assert_eq!(provider.download_calls(), 1);
        assert_eq!(store.archive_puts(), 1);
        refs.dedup();
        assert_eq!(refs.len(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_still_completes_record() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_downloads().await;
        let (handler, store) = handler_with(provider.clone()).await;

        let result = handler.finalize("r1", "a1").await.unwrap();
        assert!(result.archived_document_ref.is_none());
        assert!(result.download_error.is_some());

        let record = store.get("a1").await.unwrap().unwrap();
        assert_eq!(record.status, CanonicalStatus::Completed);
        assert!(record.archived_document_ref.is_none());
        assert_eq!(store.archive_puts(), 0);
    }

    #[tokio::test]
    async fn test_second_finalize_observes_first_result() {
        let provider = Arc::new(MockProvider::new());
        let (handler, _store) = handler_with(provider.clone()).await;

        let first = handler.finalize("r1", "a1").await.unwrap();
        let second = handler.finalize("r1", "a1").await.unwrap();

        assert!(!first.already_finalized);
        assert!(second.already_finalized);
        assert_eq!(first.archived_document_ref, second.archived_document_ref);
        assert_eq!(provider.download_calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let provider = Arc::new(MockProvider::unauthenticated());
        let store =
            Arc::new(MemoryStore::with_records(vec![dispatched_record("a1", "r1")]).await);
        let handler = CompletionHandler::new(
            provider,
            store.clone() as Arc<dyn BusinessRecords>,
            store as Arc<dyn ArchiveStore>,
        );

        let err = handler.finalize("r1", "a1").await.unwrap_err();
        assert!(matches!(err, Error::AuthRequired));
    }

    #[tokio::test]
    async fn test_missing_record_errors() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(MemoryStore::new());
        let handler = CompletionHandler::new(
            provider,
            store.clone() as Arc<dyn BusinessRecords>,
            store as Arc<dyn ArchiveStore>,
        );

        let err = handler.finalize("r1", "nope").await.unwrap_err();
        assert!(matches!(err, Error::RecordNotFound(_)));
    }
}
