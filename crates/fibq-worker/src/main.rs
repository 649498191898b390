// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! fibq Worker - Dispatch Consumer
//!
//! Subscribes to the dispatch channel, computes each submitted index, and
//! writes the result into the cache. On start it reconciles pending entries
//! left behind by notifications nobody received.

use tracing::{info, warn};

use fibq_core::backends::Backends;
use fibq_core::config::Config;
use fibq_core::worker::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fibq_core=info,fibq_worker=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        workers = config.workers,
        strategy = config.compute_strategy.as_str(),
        channel = %config.dispatch_channel,
        "Starting fibq worker"
    );

    let backends = Backends::connect(&config).await?;

    let pool = WorkerPool::new(
        backends.cache.clone(),
        backends.dispatch.clone(),
        config.worker_pool(config.workers),
    )
    .with_log(backends.log.clone())
    .start()
    .await?;

    if let Some(report) = pool.reconciled() {
        info!(
            scanned = report.scanned,
            recomputed = report.recomputed,
            "Startup reconciliation finished"
        );
    }

    info!(running = pool.running(), "Worker pool ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let stats = pool.shutdown().await;
    backends.close().await;

    info!(
        processed = stats.processed,
        failed = stats.failed,
        "fibq worker shut down"
    );

    Ok(())
}
