// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dispatch orchestration: validate, upload, submit, persist.
//!
//! All input validation happens before the first network call, so a bad
//! request cannot leave a half-created signature request at the provider.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::model::{DispatchRequest, DocumentSource};
use crate::persistence::BusinessRecords;
use crate::provider::{SigningProvider, SubmitRequest};

/// Orchestrates sending a business record out for signature.
pub struct Dispatcher {
    provider: Arc<dyn SigningProvider>,
    records: Arc<dyn BusinessRecords>,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Business record the dispatch was made for.
    pub record_id: String,
    /// Provider-assigned request identifier.
    pub provider_request_id: String,
}

impl Dispatcher {
    /// Create a dispatcher over a provider and record store.
    pub fn new(provider: Arc<dyn SigningProvider>, records: Arc<dyn BusinessRecords>) -> Self {
        Self { provider, records }
    }

    /// Validate and dispatch a signature request.
    ///
    /// Sequence: validate, ensure the business record exists, upload the
    /// document, submit the request, persist the provider request ID with
    /// status `Pending`. Validation failures return before any network call.
    #[instrument(skip(self, request), fields(record_id = %request.record_id))]
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome> {
        validate(&request)?;

        if let Some(record) = self.records.get(&request.record_id).await?
            && let Some(provider_request_id) = record.provider_request_id
        {
            return Err(Error::Validation {
                field: "record_id".to_string(),
                message: format!(
                    "record '{}' is already dispatched as provider request '{provider_request_id}'",
                    request.record_id
                ),
            });
        }
        self.records.create(&request.record_id).await?;

        let document_token = self.provider.upload(request.source).await?;
        let provider_request_id = self
            .provider
            .submit(SubmitRequest {
                document_token,
                title: request.title,
                message: request.message,
                signatories: request.signatories,
                callback_url: request.callback_url,
                attach_documents_on_complete: true,
            })
            .await?;

        self.records
            .set_dispatched(&request.record_id, &provider_request_id)
            .await?;

        info!(provider_request_id, "Signature request dispatched");
        Ok(DispatchOutcome {
            record_id: request.record_id,
            provider_request_id,
        })
    }
}

/// Check a dispatch request before anything leaves the process.
fn validate(request: &DispatchRequest) -> Result<()> {
    let invalid = |field: &str, message: &str| {
        Err(Error::Validation {
            field: field.to_string(),
            message: message.to_string(),
        })
    };

    if request.record_id.trim().is_empty() {
        return invalid("record_id", "record ID must not be empty");
    }
    if request.title.trim().is_empty() {
        return invalid("title", "title must not be empty");
    }
    if request.signatories.is_empty() {
        return invalid("signatories", "at least one signatory is required");
    }
    for (index, signatory) in request.signatories.iter().enumerate() {
        if signatory.email.trim().is_empty() || !signatory.email.contains('@') {
            return Err(Error::Validation {
                field: format!("signatories[{index}].email"),
                message: format!("'{}' is not a valid email address", signatory.email),
            });
        }
        if signatory.name.trim().is_empty() {
            return Err(Error::Validation {
                field: format!("signatories[{index}].name"),
                message: "signatory name must not be empty".to_string(),
            });
        }
        if signatory.anchor.trim().is_empty() {
            return Err(Error::Validation {
                field: format!("signatories[{index}].anchor"),
                message: "signatory placement anchor must not be empty".to_string(),
            });
        }
    }
    match &request.source {
        DocumentSource::Bytes { data, file_name } => {
            if data.is_empty() {
                return invalid("source", "document content must not be empty");
            }
            if file_name.trim().is_empty() {
                return invalid("source", "document file name must not be empty");
            }
        }
        DocumentSource::RemoteUrl(url) => {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return invalid("source", "document URL must be an absolute http(s) URL");
            }
        }
    }
    Ok(())
}
