// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inkwire Core - Signature Request Lifecycle Engine
//!
//! This crate manages the lifecycle of electronic signature requests made
//! against an external signing provider: dispatch, webhook event logging,
//! status reconciliation, and exactly-once archival of signed documents.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       inkwire-server                            │
//! │          (HTTP API + webhook endpoint, axum)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!      │ dispatch            │ webhook POST          │ status GET
//!      ▼                     ▼                       ▼
//! ┌────────────┐      ┌─────────────┐      ┌──────────────────┐
//! │ Dispatcher │      │  Event Log  │◄─────│ StatusReconciler │
//! │            │      │ (append-    │      │  (fallback chain)│
//! └─────┬──────┘      │  only)      │      └────────┬─────────┘
//!       │             └─────────────┘               │ completed
//!       │                                           ▼
//!       │                                  ┌───────────────────┐
//!       │                                  │ CompletionHandler │
//!       │                                  │  (single-flight)  │
//!       │                                  └────────┬──────────┘
//!       ▼                                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              SigningProvider (inkwire-provider)                 │
//! │        upload / submit / poll_status / download_artifact        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Status Resolution
//!
//! [`reconciler::StatusReconciler::resolve`] consults sources in strict
//! fallback order and never errors:
//!
//! | Order | Source | Confidence |
//! |-------|--------|------------|
//! | 1 | Stored webhook events, highest-precedence wins | Authoritative |
//! | 2 | Live provider poll, normalized at the boundary | Authoritative |
//! | 3 | Last persisted business status | Low (stale) |
//! | 4 | `Unknown` | None |
//!
//! A provider 404 on every poll endpoint is treated as "completed and
//! purged", not as an error, which is why step 3 exists.
//!
//! # Canonical Status State Machine
//!
//! ```text
//!   ┌──────┐  dispatch  ┌─────────┐  signatory  ┌─────────────────┐
//!   │ None │───────────►│ Pending │────────────►│ PartiallySigned │
//!   └──────┘            └────┬────┘             └────────┬────────┘
//!                            │                           │
//!                  decline / │ expire          all signed│
//!                            ▼                           ▼
//!                       ┌────────┐               ┌───────────┐
//!                       │ Failed │               │ Completed │
//!                       └────────┘               └───────────┘
//! ```
//!
//! Persisted status is monotonic: [`persistence::BusinessRecords::update_status`]
//! refuses downgrades, so a replayed stale webhook cannot move a record
//! backwards.
//!
//! # Modules
//!
//! - [`status`]: Canonical status vocabulary and webhook event precedence
//! - [`model`]: Business records, webhook events, dispatch inputs
//! - [`error`]: Error taxonomy shared across the workspace
//! - [`persistence`]: Storage traits plus Postgres and in-memory backends
//! - [`provider`]: The [`provider::SigningProvider`] seam and a scripted mock
//! - [`dispatcher`]: Validate-then-send dispatch orchestration
//! - [`reconciler`]: Fallback-ordered status resolution
//! - [`completion`]: Exactly-once download and archival of signed documents
//! - [`migrations`]: Embedded PostgreSQL migrations

#![deny(missing_docs)]

/// Exactly-once completion handling (download, archive, finalize).
pub mod completion;

/// Dispatch orchestration with up-front validation.
pub mod dispatcher;

/// Error types shared across the workspace.
pub mod error;

/// Embedded PostgreSQL migrations.
pub mod migrations;

/// Domain model types.
pub mod model;

/// Storage traits and backends (PostgreSQL, in-memory).
pub mod persistence;

/// Signing provider seam and mock implementation.
pub mod provider;

/// Status reconciliation across event log, live polls, and persisted state.
pub mod reconciler;

/// Canonical status vocabulary and event precedence.
pub mod status;

pub use completion::CompletionHandler;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Error, ProviderError, Result};
pub use model::{
    ArchiveResult, BusinessRecord, DispatchRequest, DocumentSource, ResolvedStatus,
    SignatoryInput, SignatoryProgress, StatusSource, WebhookEvent,
};
pub use reconciler::StatusReconciler;
pub use status::{CanonicalStatus, EventKind, SignatoryStatus};
