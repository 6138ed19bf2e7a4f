// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Named, ordered endpoint variants for provider APIs with more than one
//! historical shape.
//!
//! The provider moved its status and download APIs across versions without
//! retiring the old paths for existing requests. Each operation tries its
//! variants in order and moves on at 404; the variant name travels with the
//! outcome so logs say which shape actually answered.

/// One API shape attempted for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointVariant {
    /// Stable name used in logs and [`RawStatus`](inkwire_core::provider::RawStatus).
    pub name: &'static str,
    /// Path template with `{id}` standing for the provider request ID.
    pub path: &'static str,
}

impl EndpointVariant {
    /// Render the path for a concrete provider request ID.
    pub fn path_for(&self, provider_request_id: &str) -> String {
        self.path.replace("{id}", provider_request_id)
    }
}

/// Status poll variants, newest first.
pub const STATUS_VARIANTS: &[EndpointVariant] = &[
    EndpointVariant {
        name: "request-status",
        path: "/v1/signature-requests/{id}/status",
    },
    EndpointVariant {
        name: "legacy-draft",
        path: "/v1/drafts/{id}",
    },
];

/// Signed-document download variants, newest first.
pub const ARTIFACT_VARIANTS: &[EndpointVariant] = &[
    EndpointVariant {
        name: "document",
        path: "/v1/signature-requests/{id}/document",
    },
    EndpointVariant {
        name: "legacy-content",
        path: "/v1/drafts/{id}/content",
    },
];

/// Document upload endpoint.
pub const UPLOAD_PATH: &str = "/v1/documents";

/// Signature request submission endpoint.
pub const SUBMIT_PATH: &str = "/v1/signature-requests";

/// OAuth2 token endpoint.
pub const TOKEN_PATH: &str = "/oauth/token";
