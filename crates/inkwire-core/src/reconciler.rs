// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status reconciliation: merge the event log, live provider polls, and
//! last-known persisted state into one canonical answer.
//!
//! `resolve` is a read path and never errors. Sources are consulted in a
//! strict fallback order, stopping at the first one that yields a usable
//! answer; each degradation is logged, never propagated. Out-of-order
//! webhook delivery cannot downgrade a status: the highest-precedence event
//! wins, not the most recent one.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::completion::CompletionHandler;
use crate::error::Result;
use crate::model::{BusinessRecord, ResolvedStatus, SignatoryProgress, StatusSource, WebhookEvent};
use crate::persistence::{BusinessRecords, EventLog};
use crate::provider::{PollOutcome, SigningProvider};
use crate::status::{CanonicalStatus, EventKind, SignatoryStatus};

/// Computes the canonical status for a provider request.
pub struct StatusReconciler {
    events: Arc<dyn EventLog>,
    records: Arc<dyn BusinessRecords>,
    provider: Arc<dyn SigningProvider>,
    completion: Arc<CompletionHandler>,
}

impl StatusReconciler {
    /// Create a reconciler over the given collaborators.
    pub fn new(
        events: Arc<dyn EventLog>,
        records: Arc<dyn BusinessRecords>,
        provider: Arc<dyn SigningProvider>,
        completion: Arc<CompletionHandler>,
    ) -> Self {
        Self {
            events,
            records,
            provider,
            completion,
        }
    }

    /// Resolve the canonical status for a provider request ID.
    ///
    /// Fallback order: event log, live provider poll, last-known business
    /// status, `Unknown`. A provider 404 is a signal (completed requests get
    /// purged), not an error. This method never fails; a best-effort status
    /// display must not crash its caller.
    pub async fn resolve(&self, provider_request_id: &str) -> ResolvedStatus {
        let record = match self.records.find_by_provider_request(provider_request_id).await {
            Ok(record) => record,
            Err(err) => {
                warn!(provider_request_id, error = %err, "Business record lookup failed");
                None
            }
        };

        // 1. Stored webhook events.
        match self.events.events_for_request(provider_request_id).await {
            Ok(events) if !events.is_empty() => {
                let status = highest_precedence(&events).canonical_status();
                if let Some(record) = &record {
                    self.merge_signatory_completions(record, &events).await;
                    self.persist(record, status, provider_request_id).await;
                }
                return self
                    .resolved(provider_request_id, status, StatusSource::EventLog, record)
                    .await;
            }
            Ok(_) => debug!(provider_request_id, "No stored events; polling provider"),
            Err(err) => {
                warn!(provider_request_id, error = %err, "Event log read failed; polling provider");
            }
        }

        // 2. Live provider poll.
        match self.provider.poll_status(provider_request_id).await {
            Ok(PollOutcome::Found(raw)) => {
                let status = CanonicalStatus::from_provider(&raw.status);
                if status == CanonicalStatus::Unknown {
                    warn!(
                        provider_request_id,
                        raw_status = %raw.status,
                        endpoint = raw.endpoint,
                        "Unrecognized provider status; falling back"
                    );
                } else {
                    if let Some(record) = &record {
                        self.persist(record, status, provider_request_id).await;
                    }
                    return self
                        .resolved(provider_request_id, status, StatusSource::ProviderPoll, record)
                        .await;
                }
            }
            Ok(PollOutcome::NotFound) => {
                // The provider purges completed requests; 404 everywhere
                // most often means "done and gone".
                debug!(provider_request_id, "Request not found at provider; using last-known state");
            }
            Err(err) => {
                warn!(provider_request_id, error = %err, "Provider poll failed; using last-known state");
            }
        }

        // 3. Last-known business status, low confidence.
        if let Some(record) = record
            && record.status != CanonicalStatus::None
        {
            return ResolvedStatus {
                status: record.status,
                signatories: record.signatories,
                source: StatusSource::LastKnown,
                archived_document_ref: record.archived_document_ref,
            };
        }

        // 4. Nothing knows this request.
        ResolvedStatus::unknown()
    }

    /// Resolve by business record ID, for user-triggered refreshes.
    ///
    /// Errors only when the record itself is missing; an undispatched record
    /// answers with its persisted (blank) state.
    pub async fn resolve_record(&self, record_id: &str) -> Result<ResolvedStatus> {
        let record = self
            .records
            .get(record_id)
            .await?
            .ok_or_else(|| crate::error::Error::RecordNotFound(record_id.to_string()))?;

        match &record.provider_request_id {
            Some(provider_request_id) => Ok(self.resolve(provider_request_id).await),
            None => Ok(ResolvedStatus {
                status: record.status,
                signatories: record.signatories,
                source: StatusSource::LastKnown,
                archived_document_ref: record.archived_document_ref,
            }),
        }
    }

    /// Upsert every `SignatoryCompleted` actor into the record's progress.
    ///
    /// Duplicate deliveries collapse here: the upsert is keyed by email, so
    /// N copies of the same completion produce one entry.
    async fn merge_signatory_completions(&self, record: &BusinessRecord, events: &[WebhookEvent]) {
        for event in events
            .iter()
            .filter(|event| event.event_kind == EventKind::SignatoryCompleted)
        {
            let Some(email) = event.actor_email.as_deref() else {
                warn!(
                    provider_request_id = %event.provider_request_id,
                    "SignatoryCompleted event without actor email; skipping merge"
                );
                continue;
            };
            let progress = SignatoryProgress {
                name: event.actor_name.clone().unwrap_or_default(),
                email: email.to_string(),
                role_id: String::new(),
                status: SignatoryStatus::Signed,
                signed_at: Some(event.occurred_at),
            };
            if let Err(err) = self.records.upsert_signatory(&record.record_id, &progress).await {
                warn!(
                    record_id = %record.record_id,
                    email,
                    error = %err,
                    "Signatory merge failed"
                );
            }
        }
    }

    /// Persist a derived status and trigger completion when it just turned
    /// terminal. Both effects are best-effort on this read path.
    async fn persist(
        &self,
        record: &BusinessRecord,
        status: CanonicalStatus,
        provider_request_id: &str,
    ) {
        if status != record.status
            && let Err(err) = self.records.update_status(&record.record_id, status).await
        {
            warn!(
                record_id = %record.record_id,
                status = %status,
                error = %err,
                "Status persist failed"
            );
        }

        if status == CanonicalStatus::Completed && record.status != CanonicalStatus::Completed {
            if let Err(err) = self
                .completion
                .finalize(provider_request_id, &record.record_id)
                .await
            {
                warn!(
                    record_id = %record.record_id,
                    provider_request_id,
                    error = %err,
                    "Completion failed during reconcile"
                );
            }
        }
    }

    /// Build the answer, re-reading the record so signatory merges and
    /// completion effects from this very call are reflected.
    async fn resolved(
        &self,
        provider_request_id: &str,
        status: CanonicalStatus,
        source: StatusSource,
        record: Option<BusinessRecord>,
    ) -> ResolvedStatus {
        let fresh = match self.records.find_by_provider_request(provider_request_id).await {
            Ok(fresh) => fresh.or(record),
            Err(_) => record,
        };
        match fresh {
            Some(record) => ResolvedStatus {
                status,
                signatories: record.signatories,
                source,
                archived_document_ref: record.archived_document_ref,
            },
            None => ResolvedStatus {
                status,
                signatories: Vec::new(),
                source,
                archived_document_ref: None,
            },
        }
    }
}

fn highest_precedence(events: &[WebhookEvent]) -> EventKind {
    events
        .iter()
        .max_by(|a, b| {
            a.event_kind
                .cmp(&b.event_kind)
                .then(a.occurred_at.cmp(&b.occurred_at))
        })
        .map(|event| event.event_kind)
        .expect("caller checked events is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BusinessRecord;
    use crate::persistence::{ArchiveStore, MemoryStore};
    use crate::provider::mock::MockProvider;
    use chrono::Utc;

    fn event(kind: EventKind, email: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            provider_request_id: "r1".to_string(),
            event_kind: kind,
            occurred_at: Utc::now(),
            actor_name: email.map(|_| "Actor".to_string()),
            actor_email: email.map(str::to_string),
            raw_payload: serde_json::json!({}),
        }
    }

    async fn setup(provider: Arc<MockProvider>) -> (StatusReconciler, Arc<MemoryStore>) {
        let record = BusinessRecord {
            provider_request_id: Some("r1".to_string()),
            status: CanonicalStatus::Pending,
            ..BusinessRecord::new("a1")
        };
        let store = Arc::new(MemoryStore::with_records(vec![record]).await);
        let completion = Arc::new(CompletionHandler::new(
            provider.clone(),
            store.clone() as Arc<dyn BusinessRecords>,
            store.clone() as Arc<dyn ArchiveStore>,
        ));
        let reconciler = StatusReconciler::new(
            store.clone() as Arc<dyn EventLog>,
            store.clone() as Arc<dyn BusinessRecords>,
            provider,
            completion,
        );
        (reconciler, store)
    }

    #[tokio::test]
    async fn test_precedence_beats_arrival_order() {
        let provider = Arc::new(MockProvider::new());
        let (reconciler, store) = setup(provider).await;

        // Arrival order 2, 1, 3: the late RequestReceived replay must not
        // downgrade, and the RequestCompleted must win.
        for kind in [
            EventKind::SignatoryCompleted,
            EventKind::RequestReceived,
            EventKind::RequestCompleted,
        ] {
            store
                .append(&event(kind, Some("ada@example.com")))
                .await
                .unwrap();
        }

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);
        assert_eq!(resolved.source, StatusSource::EventLog);
    }

    #[tokio::test]
    async fn test_stale_replay_after_completion_does_not_downgrade() {
        let provider = Arc::new(MockProvider::new());
        let (reconciler, store) = setup(provider).await;

        store.append(&event(EventKind::RequestCompleted, None)).await.unwrap();
        assert_eq!(
            reconciler.resolve("r1").await.status,
            CanonicalStatus::Completed
        );

        // Duplicate RequestReceived delivered after the fact.
        store.append(&event(EventKind::RequestReceived, None)).await.unwrap();
        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);

        let record = store.get("a1").await.unwrap().unwrap();
        assert_eq!(record.status, CanonicalStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_signatory_events_merge_to_one_entry() {
        let provider = Arc::new(MockProvider::new());
        let (reconciler, store) = setup(provider).await;

        store
            .append(&event(EventKind::SignatoryCompleted, Some("ada@example.com")))
            .await
            .unwrap();
        store
            .append(&event(EventKind::SignatoryCompleted, Some("ada@example.com")))
            .await
            .unwrap();

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::PartiallySigned);
        assert_eq!(resolved.signatories.len(), 1);
        assert_eq!(resolved.signatories[0].email, "ada@example.com");
        assert_eq!(resolved.signatories[0].status, SignatoryStatus::Signed);
        assert!(resolved.signatories[0].signed_at.is_some());
    }

    #[tokio::test]
    async fn test_no_events_polls_provider() {
        let provider = Arc::new(MockProvider::new());
        provider.set_poll_status("in_progress").await;
        let (reconciler, _store) = setup(provider.clone()).await;

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::PartiallySigned);
        assert_eq!(resolved.source, StatusSource::ProviderPoll);
        assert_eq!(provider.poll_calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_purge_falls_back_to_last_known() {
        let provider = Arc::new(MockProvider::new());
        let record = BusinessRecord {
            provider_request_id: Some("r2".to_string()),
            status: CanonicalStatus::Completed,
            ..BusinessRecord::new("a2")
        };
        let store = Arc::new(MemoryStore::with_records(vec![record]).await);
        let completion = Arc::new(CompletionHandler::new(
            provider.clone(),
            store.clone() as Arc<dyn BusinessRecords>,
            store.clone() as Arc<dyn ArchiveStore>,
        ));
        let reconciler = StatusReconciler::new(
            store.clone() as Arc<dyn EventLog>,
            store.clone() as Arc<dyn BusinessRecords>,
            provider,
            completion,
        );

        // No events, provider 404s everywhere; the stale record answer wins
        // over an error or Unknown.
        let resolved = reconciler.resolve("r2").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);
        assert_eq!(resolved.source, StatusSource::LastKnown);
    }

    #[tokio::test]
    async fn test_unknown_when_nothing_matches() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(CompletionHandler::new(
            provider.clone(),
            store.clone() as Arc<dyn BusinessRecords>,
            store.clone() as Arc<dyn ArchiveStore>,
        ));
        let reconciler = StatusReconciler::new(
            store.clone() as Arc<dyn EventLog>,
            store.clone() as Arc<dyn BusinessRecords>,
            provider,
            completion,
        );

        let resolved = reconciler.resolve("ghost").await;
        assert_eq!(resolved.status, CanonicalStatus::Unknown);
        assert_eq!(resolved.source, StatusSource::Unknown);
    }

    #[tokio::test]
    async fn test_completed_event_triggers_archival() {
        let provider = Arc::new(MockProvider::new());
        let (reconciler, store) = setup(provider.clone()).await;

        store.append(&event(EventKind::RequestCompleted, None)).await.unwrap();

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);
        assert!(resolved.archived_document_ref.is_some());
        assert_eq!(provider.download_calls(), 1);
        assert_eq!(store.archive_puts(), 1);

        // A second resolve must not re-run completion.
        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);
        assert_eq!(provider.download_calls(), 1);
        assert_eq!(store.archive_puts(), 1);
    }

    #[tokio::test]
    async fn test_poll_completed_triggers_archival() {
        let provider = Arc::new(MockProvider::new());
        provider.set_poll_status("signed").await;
        let (reconciler, store) = setup(provider.clone()).await;

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Completed);
        assert_eq!(resolved.source, StatusSource::ProviderPoll);
        assert_eq!(store.archive_puts(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_poll_vocabulary_falls_back() {
        let provider = Arc::new(MockProvider::new());
        provider.set_poll_status("quantum_flux").await;
        let (reconciler, _store) = setup(provider).await;

        let resolved = reconciler.resolve("r1").await;
        assert_eq!(resolved.status, CanonicalStatus::Pending);
        assert_eq!(resolved.source, StatusSource::LastKnown);
    }

    #[tokio::test]
    async fn test_resolve_record_without_dispatch() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(
            MemoryStore::with_records(vec![BusinessRecord::new("fresh")]).await,
        );
        let completion = Arc::new(CompletionHandler::new(
            provider.clone(),
            store.clone() as Arc<dyn BusinessRecords>,
            store.clone() as Arc<dyn ArchiveStore>,
        ));
        let reconciler = StatusReconciler::new(
            store.clone() as Arc<dyn EventLog>,
            store.clone() as Arc<dyn BusinessRecords>,
            provider.clone(),
            completion,
        );

        let resolved = reconciler.resolve_record("fresh").await.unwrap();
        assert_eq!(resolved.status, CanonicalStatus::None);
        assert_eq!(provider.poll_calls(), 0);

        let err = reconciler.resolve_record("missing").await.unwrap_err();
        assert!(matches!(err, crate::error::Error::RecordNotFound(_)));
    }
}
