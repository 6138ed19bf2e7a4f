// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inkwire Server - HTTP Surface
//!
//! Exposes the signature lifecycle engine over HTTP:
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/webhooks/provider` | POST | Provider lifecycle events (HMAC-verified when configured) |
//! | `/requests/{record_id}/dispatch` | POST | Send a document out for signature |
//! | `/requests/{record_id}` | GET | Resolve current canonical status |
//! | `/requests/{record_id}/refresh` | POST | User-triggered status refresh |
//! | `/health` | GET | Liveness probe |
//!
//! # Configuration
//!
//! Loaded from `INKWIRE_*` environment variables; see [`config::Config`].
//!
//! # Modules
//!
//! - [`config`]: Environment-variable configuration
//! - [`state`]: Shared handler state
//! - [`routes`]: Router and API handlers
//! - [`webhook`]: Inbound webhook endpoint with signature verification
//! - [`archive`]: Filesystem archive store for signed documents

#![deny(missing_docs)]

/// Filesystem-backed archive store.
pub mod archive;

/// Configuration from environment variables.
pub mod config;

/// Router and API handlers.
pub mod routes;

/// Shared handler state.
pub mod state;

/// Inbound webhook endpoint.
pub mod webhook;

pub use archive::FsArchiveStore;
pub use config::{Config, ConfigError};
pub use routes::router;
pub use state::AppState;
