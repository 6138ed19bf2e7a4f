// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Inkwire server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Signing provider API base URL
    pub provider_base_url: String,
    /// OAuth2 client ID for the provider
    pub provider_client_id: String,
    /// OAuth2 client secret for the provider
    pub provider_client_secret: String,
    /// OAuth2 refresh token; absent until the integration is authorized
    pub provider_refresh_token: Option<String>,
    /// Shared secret for webhook HMAC verification; absent disables the check
    pub webhook_secret: Option<String>,
    /// Public callback URL handed to the provider at dispatch
    pub callback_url: Option<String>,
    /// Directory for the filesystem archive store
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `INKWIRE_DATABASE_URL`: PostgreSQL connection string
    /// - `INKWIRE_PROVIDER_BASE_URL`: signing provider API base URL
    /// - `INKWIRE_PROVIDER_CLIENT_ID` / `INKWIRE_PROVIDER_CLIENT_SECRET`
    ///
    /// Optional (with defaults):
    /// - `INKWIRE_HTTP_PORT`: HTTP listen port (default: 8080)
    /// - `INKWIRE_PROVIDER_REFRESH_TOKEN`: OAuth2 refresh token
    /// - `INKWIRE_WEBHOOK_SECRET`: shared secret for webhook signatures
    /// - `INKWIRE_CALLBACK_URL`: public webhook URL passed to the provider
    /// - `INKWIRE_DATA_DIR`: archive directory (default: `.data`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("INKWIRE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("INKWIRE_DATABASE_URL"))?;

        let http_port: u16 = std::env::var("INKWIRE_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("INKWIRE_HTTP_PORT", "must be a valid port number")
            })?;

        let provider_base_url = std::env::var("INKWIRE_PROVIDER_BASE_URL")
            .map_err(|_| ConfigError::Missing("INKWIRE_PROVIDER_BASE_URL"))?;
        let provider_client_id = std::env::var("INKWIRE_PROVIDER_CLIENT_ID")
            .map_err(|_| ConfigError::Missing("INKWIRE_PROVIDER_CLIENT_ID"))?;
        let provider_client_secret = std::env::var("INKWIRE_PROVIDER_CLIENT_SECRET")
            .map_err(|_| ConfigError::Missing("INKWIRE_PROVIDER_CLIENT_SECRET"))?;

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            provider_base_url,
            provider_client_id,
            provider_client_secret,
            provider_refresh_token: std::env::var("INKWIRE_PROVIDER_REFRESH_TOKEN").ok(),
            webhook_secret: std::env::var("INKWIRE_WEBHOOK_SECRET").ok(),
            callback_url: std::env::var("INKWIRE_CALLBACK_URL").ok(),
            data_dir: std::env::var("INKWIRE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".data")),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn set_required(guard: &mut EnvGuard) {
        guard.set("INKWIRE_DATABASE_URL", "postgres://localhost/inkwire");
        guard.set("INKWIRE_PROVIDER_BASE_URL", "https://api.provider.test");
        guard.set("INKWIRE_PROVIDER_CLIENT_ID", "client");
        guard.set("INKWIRE_PROVIDER_CLIENT_SECRET", "secret");
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        set_required(&mut guard);
        guard.remove("INKWIRE_HTTP_PORT");
        guard.remove("INKWIRE_WEBHOOK_SECRET");
        guard.remove("INKWIRE_PROVIDER_REFRESH_TOKEN");
        guard.remove("INKWIRE_DATA_DIR");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/inkwire");
        assert_eq!(config.http_addr.port(), 8080);
        assert!(config.webhook_secret.is_none());
        assert!(config.provider_refresh_token.is_none());
        assert_eq!(config.data_dir, PathBuf::from(".data"));
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        set_required(&mut guard);
        guard.set("INKWIRE_HTTP_PORT", "9090");
        guard.set("INKWIRE_WEBHOOK_SECRET", "hunter2");
        guard.set("INKWIRE_PROVIDER_REFRESH_TOKEN", "refresh-1");
        guard.set("INKWIRE_DATA_DIR", "/var/lib/inkwire");

        let config = Config::from_env().unwrap();

        assert_eq!(config.http_addr.port(), 9090);
        assert_eq!(config.webhook_secret.as_deref(), Some("hunter2"));
        assert_eq!(config.provider_refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/inkwire"));
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("INKWIRE_DATABASE_URL");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("INKWIRE_DATABASE_URL")));
    }

    #[test]
    fn test_config_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        set_required(&mut guard);
        guard.set("INKWIRE_HTTP_PORT", "not-a-port");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("INKWIRE_HTTP_PORT", _)));
    }
}
