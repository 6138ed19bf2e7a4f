// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inkwire Provider - HTTP Gateway to the Signing Provider
//!
//! Implements [`inkwire_core::provider::SigningProvider`] over the external
//! provider's HTTP API: OAuth2 refresh-token auth, document upload,
//! multi-signatory submission, status polls, and signed-document download.
//!
//! # Credential Handling
//!
//! Tokens are never process-global. A [`credentials::CredentialStore`] is
//! constructed once with the OAuth client configuration and handed to the
//! gateway; it caches the access token with a skew before expiry and is
//! cleared by the gateway whenever the provider answers 401.
//!
//! # Endpoint Fallback
//!
//! The provider's status and download APIs exist in more than one historical
//! shape. [`endpoints`] models each as a named, ordered variant list; the
//! gateway walks the list, treating 404 as "try the next shape" and only
//! reporting `NotFound` when every variant 404s.
//!
//! # Modules
//!
//! - [`credentials`]: OAuth2 token cache and refresh flow
//! - [`endpoints`]: Named, ordered endpoint variants
//! - [`payload`]: Provider wire types for submission
//! - [`gateway`]: The `SigningProvider` implementation

#![deny(missing_docs)]

/// OAuth2 credential store with cached access tokens.
pub mod credentials;

/// Ordered endpoint variants for multi-shape provider APIs.
pub mod endpoints;

/// HTTP gateway implementing the signing provider seam.
pub mod gateway;

/// Outbound wire payload types.
pub mod payload;

pub use credentials::{CredentialStore, ProviderCredentials};
pub use gateway::HttpProviderGateway;
