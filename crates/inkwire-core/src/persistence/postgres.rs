// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL persistence backend.
//!
//! Schema lives in `migrations/postgresql/` and is applied with
//! `migrations::run_postgres`. Status values are stored as TEXT; downgrade
//! protection happens in SQL so concurrent writers cannot race a
//! read-modify-write cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ArchiveStore, BusinessRecords, EventLog};
use crate::error::Result;
use crate::model::{BusinessRecord, SignatoryProgress, WebhookEvent};
use crate::status::{CanonicalStatus, EventKind, SignatoryStatus};

/// Rank expression matching `CanonicalStatus::rank`, used for downgrade
/// protection inside UPDATE statements.
const STATUS_RANK_SQL: &str = "CASE {col} \
     WHEN 'pending' THEN 1 \
     WHEN 'partially_signed' THEN 2 \
     WHEN 'completed' THEN 3 \
     WHEN 'failed' THEN 3 \
     ELSE 0 END";

fn rank_expr(col: &str) -> String {
    STATUS_RANK_SQL.replace("{col}", col)
}

/// Raw row for the `webhook_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    provider_request_id: String,
    event_kind: i16,
    occurred_at: DateTime<Utc>,
    actor_name: Option<String>,
    actor_email: Option<String>,
    raw_payload: serde_json::Value,
}

/// Raw row for the `signature_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RecordRow {
    record_id: String,
    provider_request_id: Option<String>,
    status: String,
    archived_document_ref: Option<String>,
    finalized_at: Option<DateTime<Utc>>,
}

/// Raw row for the `signatory_progress` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SignatoryRow {
    name: String,
    email: String,
    role_id: String,
    status: String,
    signed_at: Option<DateTime<Utc>>,
}

/// Postgres-backed persistence for the event log and business records.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn signatories_for(&self, record_id: &str) -> Result<Vec<SignatoryProgress>> {
        let rows: Vec<SignatoryRow> = sqlx::query_as(
            r#"
            SELECT name, email, role_id, status, signed_at
            FROM signatory_progress
            WHERE record_id = $1
            ORDER BY email ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SignatoryProgress {
                name: row.name,
                email: row.email,
                role_id: row.role_id,
                status: SignatoryStatus::from_db(&row.status),
                signed_at: row.signed_at,
            })
            .collect())
    }

    async fn hydrate(&self, row: RecordRow) -> Result<BusinessRecord> {
        let signatories = self.signatories_for(&row.record_id).await?;
        Ok(BusinessRecord {
            record_id: row.record_id,
            provider_request_id: row.provider_request_id,
            status: CanonicalStatus::from_db(&row.status),
            signatories,
            archived_document_ref: row.archived_document_ref,
            finalized_at: row.finalized_at,
        })
    }
}

#[async_trait]
impl EventLog for PostgresStore {
    async fn append(&self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events
                (provider_request_id, event_kind, occurred_at, actor_name, actor_email, raw_payload, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(&event.provider_request_id)
        .bind(event.event_kind.as_wire())
        .bind(event.occurred_at)
        .bind(event.actor_name.as_deref())
        .bind(event.actor_email.as_deref())
        .bind(&event.raw_payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn events_for_request(&self, provider_request_id: &str) -> Result<Vec<WebhookEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT provider_request_id, event_kind, occurred_at, actor_name, actor_email, raw_payload
            FROM webhook_events
            WHERE provider_request_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(provider_request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                // Unknown kinds would mean a schema drifted ahead of this
                // binary; skip them rather than failing the whole read.
                let event_kind = EventKind::from_wire(row.event_kind as i64)?;
                Some(WebhookEvent {
                    provider_request_id: row.provider_request_id,
                    event_kind,
                    occurred_at: row.occurred_at,
                    actor_name: row.actor_name,
                    actor_email: row.actor_email,
                    raw_payload: row.raw_payload,
                })
            })
            .collect())
    }
}

#[async_trait]
impl BusinessRecords for PostgresStore {
    async fn create(&self, record_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signature_requests (record_id, status, created_at, updated_at)
            VALUES ($1, 'none', NOW(), NOW())
            ON CONFLICT (record_id) DO NOTHING
            "#,
        )
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<Option<BusinessRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT record_id, provider_request_id, status, archived_document_ref, finalized_at
            FROM signature_requests
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_provider_request(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<BusinessRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT record_id, provider_request_id, status, archived_document_ref, finalized_at
            FROM signature_requests
            WHERE provider_request_id = $1
            "#,
        )
        .bind(provider_request_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn set_dispatched(&self, record_id: &str, provider_request_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE signature_requests
            SET provider_request_id = $2,
                status = 'pending',
                updated_at = NOW()
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .bind(provider_request_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(&self, record_id: &str, status: CanonicalStatus) -> Result<()> {
        // The WHERE clause enforces monotonicity: a lower-ranked status is a
        // no-op even when two reconcilers race.
        let query = format!(
            r#"
            UPDATE signature_requests
            SET status = $2, updated_at = NOW()
            WHERE record_id = $1
              AND {current_rank} <= {new_rank}
            "#,
            current_rank = rank_expr("status"),
            new_rank = rank_expr("$2"),
        );

        sqlx::query(&query)
            .bind(record_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_signatory(
        &self,
        record_id: &str,
        progress: &SignatoryProgress,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signatory_progress (record_id, name, email, role_id, status, signed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (record_id, email) DO UPDATE SET
                name = COALESCE(NULLIF(EXCLUDED.name, ''), signatory_progress.name),
                role_id = COALESCE(NULLIF(EXCLUDED.role_id, ''), signatory_progress.role_id),
                status = EXCLUDED.status,
                signed_at = COALESCE(signatory_progress.signed_at, EXCLUDED.signed_at)
            "#,
        )
        .bind(record_id)
        .bind(&progress.name)
        .bind(&progress.email)
        .bind(&progress.role_id)
        .bind(progress.status.as_str())
        .bind(progress.signed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_finalize(&self, record_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE signature_requests
            SET finalized_at = NOW(),
                status = 'completed',
                updated_at = NOW()
            WHERE record_id = $1 AND finalized_at IS NULL
            "#,
        )
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_archived(&self, record_id: &str, archived_ref: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE signature_requests
            SET archived_document_ref = $2, updated_at = NOW()
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .bind(archived_ref)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for PostgresStore {
    /// Large-object archival belongs in a blob store, not the relational
    /// database; the server wires in its filesystem store instead. This
    /// impl exists so a `PostgresStore` can stand alone in small setups.
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let archive_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO archived_documents (archive_id, content_type, content, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(&archive_id)
        .bind(content_type)
        .bind(bytes)
        .execute(&self.pool)
        .await?;

        Ok(format!("archive://{archive_id}"))
    }
}

/// Health check for database connectivity.
pub async fn health_check(pool: &PgPool) -> Result<bool> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| true)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_expr_substitutes_column() {
        let expr = rank_expr("status");
        assert!(expr.starts_with("CASE status"));
        assert!(expr.contains("WHEN 'completed' THEN 3"));
        assert!(!expr.contains("{col}"));
    }

    #[test]
    fn test_rank_expr_matches_canonical_rank() {
        // The SQL CASE must agree with CanonicalStatus::rank.
        for (value, rank) in [
            ("none", 0u8),
            ("pending", 1),
            ("partially_signed", 2),
            ("completed", 3),
            ("failed", 3),
        ] {
            assert_eq!(CanonicalStatus::from_db(value).rank(), rank);
        }
    }
}
