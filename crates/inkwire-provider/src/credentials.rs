// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Credential management for the signing provider's OAuth2 flow.
//!
//! Tokens live inside a [`CredentialStore`] handed to the gateway at
//! construction time; nothing here is process-global. The store caches the
//! current access token and refreshes it on demand, slightly before the
//! provider-reported expiry to avoid racing the deadline mid-request.

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use inkwire_core::error::ProviderError;

/// Refresh this many seconds before the provider-reported expiry.
const EXPIRY_SKEW_SECONDS: i64 = 30;

/// Static OAuth2 client configuration for the provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Long-lived refresh token; absent means the integration is not
    /// authorized and every call fails with `AuthRequired`.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Caches the provider access token and refreshes it when stale.
pub struct CredentialStore {
    credentials: ProviderCredentials,
    token_url: String,
    cached: RwLock<Option<CachedToken>>,
}

impl CredentialStore {
    /// Create a store for the given credentials and OAuth token endpoint.
    pub fn new(credentials: ProviderCredentials, token_url: String) -> Self {
        Self {
            credentials,
            token_url,
            cached: RwLock::new(None),
        }
    }

    /// Return a valid access token, refreshing if the cached one is absent
    /// or within the expiry skew.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, ProviderError> {
        if let Some(token) = self.cached.read().await.as_ref()
            && token.expires_at - Duration::seconds(EXPIRY_SKEW_SECONDS) > Utc::now()
        {
            return Ok(token.access_token.clone());
        }
        self.refresh(http).await
    }

    /// Drop the cached token. The next call refreshes from scratch.
    ///
    /// Called by the gateway when the provider answers 401 despite a token
    /// the cache considered valid.
    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }

    async fn refresh(&self, http: &reqwest::Client) -> Result<String, ProviderError> {
        let Some(refresh_token) = self.credentials.refresh_token.as_deref() else {
            return Err(ProviderError::AuthRequired);
        };

        let mut guard = self.cached.write().await;
        // Another task may have refreshed while this one waited on the lock.
        if let Some(token) = guard.as_ref()
            && token.expires_at - Duration::seconds(EXPIRY_SKEW_SECONDS) > Utc::now()
        {
            return Ok(token.access_token.clone());
        }

        debug!("Refreshing provider access token");
        let response = http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
            ])
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                reason: format!("token refresh request failed: {err}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::BAD_REQUEST
        {
            // The refresh token itself is dead; retrying cannot help.
            warn!(%status, "Provider rejected the refresh token");
            return Err(ProviderError::AuthRequired);
        }
        if !status.is_success() {
            return Err(ProviderError::Transport {
                reason: format!("token endpoint answered {status}"),
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|err| ProviderError::Transport {
                    reason: format!("malformed token response: {err}"),
                })?;

        let access_token = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }
}
