// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! fibq Gateway - HTTP API Server
//!
//! Accepts job submissions over HTTP and serves results from the cache.
//! Workers run in separate `fibq-worker` processes unless
//! `FIBQ_EMBEDDED_WORKERS` asks for some in this process.

use tracing::{info, warn};

use fibq_core::backends::Backends;
use fibq_core::config::Config;
use fibq_core::runtime::Pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fibq_core=info,fibq_gateway=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        max_index = config.max_index,
        embedded_workers = config.embedded_workers,
        "Starting fibq gateway"
    );

    let backends = Backends::connect(&config).await?;

    let mut builder = Pipeline::builder()
        .backends(backends)
        .max_index(config.max_index);
    if config.embedded_workers > 0 {
        builder = builder.workers(config.worker_pool(config.embedded_workers));
    }
    let pipeline = builder.build()?.start().await?;

    let app = fibq_gateway::router(pipeline.gateway().clone());
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;

    info!(addr = %config.http_addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = pipeline.shutdown().await?;
    info!(
        processed = stats.processed,
        failed = stats.failed,
        "fibq gateway shut down"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
