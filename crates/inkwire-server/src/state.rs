// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared handler state.

use std::sync::Arc;

use inkwire_core::persistence::EventLog;
use inkwire_core::{Dispatcher, StatusReconciler};

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct AppState {
    /// Append-only webhook event log.
    pub events: Arc<dyn EventLog>,
    /// Dispatch orchestrator.
    pub dispatcher: Dispatcher,
    /// Status reconciler.
    pub reconciler: StatusReconciler,
    /// Shared secret for webhook signature checks; `None` disables them.
    pub webhook_secret: Option<String>,
    /// Default callback URL registered with the provider at dispatch.
    pub callback_url: Option<String>,
}
