// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire types for the provider's submission API.
//!
//! The provider speaks PascalCase JSON with one camelCase stray
//! (`signatoryType`), so everything here is explicitly renamed rather than
//! relying on a container attribute.

use serde::Serialize;

use inkwire_core::model::SignatoryInput;
use inkwire_core::provider::SubmitRequest;

/// Stamp placement offsets in pixels relative to the text anchor.
const SIGNATURE_STAMP_OFFSET: (i32, i32) = (0, 0);
const EMAIL_STAMP_OFFSET: (i32, i32) = (0, 40);
const DATE_STAMP_OFFSET: (i32, i32) = (0, 70);

/// Top-level submission body.
#[derive(Debug, Serialize)]
pub struct SubmissionPayload {
    /// Request title shown to signatories.
    #[serde(rename = "Title")]
    pub title: String,
    /// Message body included in the signing invitation.
    #[serde(rename = "Message")]
    pub message: String,
    /// Webhook URL the provider calls with lifecycle events.
    #[serde(rename = "CallbackUrl")]
    pub callback_url: String,
    /// Ask the provider to attach signed documents to the completion event.
    #[serde(rename = "CompletedDocumentsAttached")]
    pub completed_documents_attached: bool,
    /// Upload tokens for the documents under signature.
    #[serde(rename = "Documents")]
    pub documents: Vec<String>,
    /// Signatories in signing order.
    #[serde(rename = "Signatories")]
    pub signatories: Vec<SignatoryPayload>,
}

/// One signatory entry.
#[derive(Debug, Serialize)]
pub struct SignatoryPayload {
    /// Signatory email, doubles as their identity at the provider.
    #[serde(rename = "Email")]
    pub email: String,
    /// Display name.
    #[serde(rename = "Name")]
    pub name: String,
    /// 1-based signing order.
    #[serde(rename = "Order")]
    pub order: u32,
    /// Provider signatory role; this integration only uses "signer".
    #[serde(rename = "signatoryType")]
    pub signatory_type: String,
    /// Stamp placements anchored to text found in the document.
    #[serde(rename = "AutoStamps")]
    pub auto_stamps: Vec<AutoStamp>,
}

/// One auto-placed stamp.
#[derive(Debug, Serialize)]
pub struct AutoStamp {
    /// Stamp content kind: "signature", "email" or "date".
    #[serde(rename = "Type")]
    pub kind: String,
    /// Text anchor the provider searches the document for.
    #[serde(rename = "Anchor")]
    pub anchor: String,
    /// Horizontal offset from the anchor, in pixels.
    #[serde(rename = "OffsetX")]
    pub offset_x: i32,
    /// Vertical offset from the anchor, in pixels.
    #[serde(rename = "OffsetY")]
    pub offset_y: i32,
}

impl SubmissionPayload {
    /// Build the wire payload from a submit request and its upload token.
    pub fn from_request(request: &SubmitRequest) -> Self {
        Self {
            title: request.title.clone(),
            message: request.message.clone(),
            callback_url: request.callback_url.clone(),
            completed_documents_attached: request.attach_documents_on_complete,
            documents: vec![request.document_token.0.clone()],
            signatories: request
                .signatories
                .iter()
                .enumerate()
                .map(|(index, signatory)| signatory_payload(signatory, index as u32 + 1))
                .collect(),
        }
    }
}

fn signatory_payload(signatory: &SignatoryInput, order: u32) -> SignatoryPayload {
    let anchor = signatory.anchor.as_str();
    let auto_stamps = vec![
        stamp("signature", anchor, SIGNATURE_STAMP_OFFSET),
        stamp("email", anchor, EMAIL_STAMP_OFFSET),
        stamp("date", anchor, DATE_STAMP_OFFSET),
    ];

    SignatoryPayload {
        email: signatory.email.clone(),
        name: signatory.name.clone(),
        order,
        signatory_type: "signer".to_string(),
        auto_stamps,
    }
}

fn stamp(kind: &str, anchor: &str, (offset_x, offset_y): (i32, i32)) -> AutoStamp {
    AutoStamp {
        kind: kind.to_string(),
        anchor: anchor.to_string(),
        offset_x,
        offset_y,
    }
}
