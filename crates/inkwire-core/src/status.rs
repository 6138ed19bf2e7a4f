// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical signature lifecycle status and webhook event kinds.
//!
//! The provider speaks several loosely overlapping status vocabularies
//! depending on which endpoint answered. Everything is normalized onto
//! [`CanonicalStatus`] at the boundary; internal logic never compares raw
//! provider strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical signature-lifecycle status exposed by the engine.
///
/// `Unknown` is a legitimate read-path answer (a status lookup must never
/// fail) but is never persisted on a business record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    /// No signature request has been dispatched for this record.
    None,
    /// Dispatched; waiting for signatories.
    Pending,
    /// At least one signatory has signed, but not all.
    PartiallySigned,
    /// All signatories signed; the request is terminal.
    Completed,
    /// The request failed, was rejected, or expired.
    Failed,
    /// No source could produce an answer.
    Unknown,
}

impl CanonicalStatus {
    /// Terminality rank used for downgrade protection.
    ///
    /// A persisted status must never move to a lower rank, regardless of
    /// webhook arrival order.
    pub fn rank(self) -> u8 {
        match self {
            Self::None | Self::Unknown => 0,
            Self::Pending => 1,
            Self::PartiallySigned => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Whether this status represents a finished request.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Normalize the provider's native status vocabulary.
    ///
    /// Returns `Unknown` for vocabulary this engine does not recognize;
    /// callers treat that as "no usable answer" and keep falling back.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "received" | "pending" | "sent" | "viewed" | "draft" => Self::Pending,
            "in_progress" | "partially_signed" | "partial" => Self::PartiallySigned,
            "signed" | "completed" | "complete" | "finished" => Self::Completed,
            "rejected" | "declined" | "expired" | "failed" | "cancelled" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Database column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::PartiallySigned => "partially_signed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the database column representation. Unrecognized values map to
    /// `None` so a schema migration can never brick status reads.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "partially_signed" => Self::PartiallySigned,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::None,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signatory signing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatoryStatus {
    /// Has not signed yet.
    Pending,
    /// Signed.
    Signed,
    /// Declined to sign.
    Rejected,
}

impl SignatoryStatus {
    /// Database column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the database column representation.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "signed" => Self::Signed,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// Webhook event kind, totally ordered by terminality.
///
/// The wire encoding is the provider's numeric `EventId`. Precedence, not
/// arrival time, decides which event wins when deriving status: an
/// out-of-order `RequestReceived` replay must never downgrade a request the
/// provider already reported as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i16)]
pub enum EventKind {
    /// The provider accepted the request (EventId=1).
    RequestReceived = 1,
    /// One signatory finished signing (EventId=2).
    SignatoryCompleted = 2,
    /// All signatories finished; documents are ready (EventId=3).
    RequestCompleted = 3,
}

impl EventKind {
    /// Decode the provider's numeric event ID.
    pub fn from_wire(event_id: i64) -> Option<Self> {
        match event_id {
            1 => Some(Self::RequestReceived),
            2 => Some(Self::SignatoryCompleted),
            3 => Some(Self::RequestCompleted),
            _ => None,
        }
    }

    /// Numeric wire/database encoding.
    pub fn as_wire(self) -> i16 {
        self as i16
    }

    /// Fixed event-kind → canonical-status map.
    pub fn canonical_status(self) -> CanonicalStatus {
        match self {
            Self::RequestReceived => CanonicalStatus::Pending,
            Self::SignatoryCompleted => CanonicalStatus::PartiallySigned,
            Self::RequestCompleted => CanonicalStatus::Completed,
        }
    }
}
