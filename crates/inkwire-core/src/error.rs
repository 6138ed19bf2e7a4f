// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for inkwire-core.
//!
//! Write paths (dispatch, finalize) propagate structured errors. The status
//! read path never surfaces these; `StatusReconciler::resolve` degrades to
//! `Unknown` instead.

use thiserror::Error;

/// Errors from the signing provider boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// No valid access token and no working refresh path. Callers surface
    /// this as "re-authenticate"; it is never silently retried.
    #[error("Provider authentication required")]
    AuthRequired,

    /// Document upload failed (unreadable source, unsupported type, or
    /// non-2xx provider response).
    #[error("Upload failed: {reason}")]
    Upload {
        /// What went wrong.
        reason: String,
    },

    /// Request submission was rejected by the provider.
    #[error("Submission rejected (HTTP {status}): {body}")]
    Submission {
        /// Provider HTTP status code.
        status: u16,
        /// Provider response body.
        body: String,
    },

    /// Signed artifact download failed or the artifact was empty.
    #[error("Artifact download failed: {reason}")]
    Download {
        /// What went wrong.
        reason: String,
    },

    /// Network-level failure talking to the provider.
    #[error("Provider transport error: {reason}")]
    Transport {
        /// What went wrong.
        reason: String,
    },
}

/// Core engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Caller input validation failed. Not retried; surfaced immediately.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Provider credentials are missing or expired.
    #[error("Provider authentication required")]
    AuthRequired,

    /// Provider I/O failure. Retried by the caller at the next refresh,
    /// never automatically.
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Business record was not found.
    #[error("Business record not found: {0}")]
    RecordNotFound(String),

    /// Business record has no provider request ID yet.
    #[error("Record '{0}' has not been dispatched")]
    NotDispatched(String),

    /// Archival store write failed.
    #[error("Archive error: {0}")]
    Archive(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            // AuthRequired keeps its identity through the conversion so
            // callers can tell "re-authenticate" apart from retryable I/O.
            ProviderError::AuthRequired => Error::AuthRequired,
            other => Error::Provider(other),
        }
    }
}

/// Result type using core Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_required_keeps_identity() {
        let err: Error = ProviderError::AuthRequired.into();
        assert!(matches!(err, Error::AuthRequired));
    }

    #[test]
    fn test_provider_errors_wrap() {
        let err: Error = ProviderError::Download {
            reason: "empty artifact".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Provider(ProviderError::Download { .. })));
    }

    #[test]
    fn test_display_messages() {
        let err = Error::Validation {
            field: "signatories".to_string(),
            message: "at least one signatory is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Validation error for 'signatories': at least one signatory is required"
        );

        let err = ProviderError::Submission {
            status: 422,
            body: "missing Title".to_string(),
        };
        assert_eq!(err.to_string(), "Submission rejected (HTTP 422): missing Title");
    }
}
