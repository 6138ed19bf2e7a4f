// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory persistence backend.
//!
//! Implements every persistence trait over tokio-guarded maps. Used by the
//! test suites and by embedded setups that have no database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{ArchiveStore, BusinessRecords, EventLog};
use crate::error::{Error, Result};
use crate::model::{BusinessRecord, SignatoryProgress, WebhookEvent};
use crate::status::CanonicalStatus;

#[derive(Default)]
struct Inner {
    events: Vec<WebhookEvent>,
    records: HashMap<String, BusinessRecord>,
    archives: HashMap<String, (Vec<u8>, String)>,
}

/// In-memory event log, business records, and archive store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    archive_puts: AtomicUsize,
    /// When true, event appends fail. Lets tests exercise the webhook
    /// endpoint's storage-failure path.
    fail_appends: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with business records.
    pub async fn with_records(records: Vec<BusinessRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().await;
            for record in records {
                inner.records.insert(record.record_id.clone(), record);
            }
        }
        store
    }

    /// Number of archive `put` calls ever made. The idempotent-finalize
    /// property asserts this stays at one under concurrency.
    pub fn archive_puts(&self) -> usize {
        self.archive_puts.load(Ordering::SeqCst)
    }

    /// Total number of stored events, duplicates included.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }

    /// Make subsequent `append` calls fail.
    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    /// Stored archive content for a reference, if any.
    pub async fn archived(&self, archived_ref: &str) -> Option<(Vec<u8>, String)> {
        self.inner.read().await.archives.get(archived_ref).cloned()
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn append(&self, event: &WebhookEvent) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        self.inner.write().await.events.push(event.clone());
        Ok(())
    }

    async fn events_for_request(&self, provider_request_id: &str) -> Result<Vec<WebhookEvent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .filter(|event| event.provider_request_id == provider_request_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BusinessRecords for MemoryStore {
    async fn create(&self, record_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .records
            .entry(record_id.to_string())
            .or_insert_with(|| BusinessRecord::new(record_id));
        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<Option<BusinessRecord>> {
        Ok(self.inner.read().await.records.get(record_id).cloned())
    }

    async fn find_by_provider_request(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<BusinessRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .find(|record| record.provider_request_id.as_deref() == Some(provider_request_id))
            .cloned())
    }

    async fn set_dispatched(&self, record_id: &str, provider_request_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        record.provider_request_id = Some(provider_request_id.to_string());
        record.status = CanonicalStatus::Pending;
        Ok(())
    }

    async fn update_status(&self, record_id: &str, status: CanonicalStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        // Monotonicity: refuse downgrades.
        if status.rank() >= record.status.rank() {
            record.status = status;
        }
        Ok(())
    }

    async fn upsert_signatory(
        &self,
        record_id: &str,
        progress: &SignatoryProgress,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        match record
            .signatories
            .iter_mut()
            .find(|existing| existing.email == progress.email)
        {
            Some(existing) => {
                // Webhook-driven upserts carry no role; keep what dispatch set.
                if !progress.name.is_empty() {
                    existing.name = progress.name.clone();
                }
                if !progress.role_id.is_empty() {
                    existing.role_id = progress.role_id.clone();
                }
                existing.status = progress.status;
                if existing.signed_at.is_none() {
                    existing.signed_at = progress.signed_at;
                }
            }
            None => record.signatories.push(progress.clone()),
        }
        Ok(())
    }

    async fn claim_finalize(&self, record_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        if record.finalized_at.is_some() {
            return Ok(false);
        }
        record.finalized_at = Some(Utc::now());
        record.status = CanonicalStatus::Completed;
        Ok(true)
    }

    async fn set_archived(&self, record_id: &str, archived_ref: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        record.archived_document_ref = Some(archived_ref.to_string());
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        self.archive_puts.fetch_add(1, Ordering::SeqCst);
        let archived_ref = format!("mem://{}", uuid::Uuid::new_v4());
        self.inner
            .write()
            .await
            .archives
            .insert(archived_ref.clone(), (bytes.to_vec(), content_type.to_string()));
        Ok(archived_ref)
    }
}
