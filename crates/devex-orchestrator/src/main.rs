// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Devex Orchestrator - Repl Lifecycle Server
//!
//! An HTTP server responsible for:
//! - Seeding workspaces from template folders
//! - Activating repls (Kubernetes workloads + readiness)
//! - Deactivating repls (workspace flush + teardown)
//! - Health of the cluster and storage dependencies

use std::sync::Arc;

use tracing::{info, warn};

use devex_orchestrator::config::Config;
use devex_orchestrator::controller::LifecycleController;
use devex_orchestrator::platform::{KubePlatform, Platform};
use devex_orchestrator::readiness::ReadinessProber;
use devex_orchestrator::repl::ReplService;
use devex_orchestrator::server;
use devex_orchestrator::storage::{ObjectStore, S3ObjectStore, StorageGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devex_orchestrator=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Arc::new(Config::from_env()?);

    info!(
        bind_addr = %config.bind_addr,
        namespace = %config.cluster.namespace,
        public_host = %config.cluster.public_host,
        sidecar = config.sidecar_enabled,
        routing = ?config.routing,
        "Starting Devex Orchestrator"
    );

    let platform = Arc::new(KubePlatform::connect(&config.cluster).await?);
    info!(platform_type = platform.platform_type(), "Platform initialized");

    let store = Arc::new(S3ObjectStore::new(&config.storage));
    info!(store_type = store.store_type(), bucket = %store.bucket(), "Object store initialized");

    let service = Arc::new(ReplService::new(
        config.clone(),
        LifecycleController::new(config.clone(), platform),
        StorageGateway::new(store),
        ReadinessProber::new()?,
    ));

    let health = service.health().await;
    if !health.is_healthy() {
        warn!(?health, "Dependencies unhealthy at startup");
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Orchestrator server ready");

    axum::serve(listener, server::router(service))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Devex Orchestrator shut down");

    Ok(())
}
