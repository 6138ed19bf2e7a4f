// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inkwire Server - Signature Request Lifecycle Engine
//!
//! Wires the Postgres-backed engine to the HTTP surface:
//! - Webhook endpoint for provider lifecycle events
//! - Dispatch and status routes for callers
//! - Filesystem archive for signed documents

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use inkwire_core::persistence::{BusinessRecords, EventLog, PostgresStore};
use inkwire_core::{CompletionHandler, Dispatcher, StatusReconciler, migrations};
use inkwire_provider::{CredentialStore, HttpProviderGateway, ProviderCredentials};
use inkwire_server::{AppState, Config, FsArchiveStore, router};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inkwire_server=info".parse().unwrap())
                .add_directive("inkwire_core=info".parse().unwrap()),
        )
        .init();

    info!("Starting Inkwire Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        provider = %config.provider_base_url,
        webhook_verification = config.webhook_secret.is_some(),
        "Configuration loaded"
    );

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    migrations::run_postgres(&pool).await?;
    inkwire_core::persistence::health_check(&pool).await?;
    info!("Database connection established, migrations applied");

    // Provider gateway with explicit credential store
    let credentials = Arc::new(CredentialStore::new(
        ProviderCredentials {
            client_id: config.provider_client_id.clone(),
            client_secret: config.provider_client_secret.clone(),
            refresh_token: config.provider_refresh_token.clone(),
        },
        format!("{}/oauth/token", config.provider_base_url.trim_end_matches('/')),
    ));
    let provider = Arc::new(HttpProviderGateway::new(
        config.provider_base_url.clone(),
        credentials,
    ));

    // Storage and engine wiring
    let store = Arc::new(PostgresStore::new(pool.clone()));
    let archive = Arc::new(FsArchiveStore::new(config.data_dir.clone()).await?);
    let completion = Arc::new(CompletionHandler::new(
        provider.clone(),
        store.clone() as Arc<dyn BusinessRecords>,
        archive,
    ));
    let dispatcher = Dispatcher::new(provider.clone(), store.clone());
    let reconciler = StatusReconciler::new(
        store.clone() as Arc<dyn EventLog>,
        store.clone() as Arc<dyn BusinessRecords>,
        provider,
        completion,
    );

    let state = Arc::new(AppState {
        events: store,
        dispatcher,
        reconciler,
        webhook_secret: config.webhook_secret.clone(),
        callback_url: config.callback_url.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
