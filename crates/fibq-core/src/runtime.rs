// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable pipeline runtime.
//!
//! [`Pipeline`] wires a [`Gateway`] and, optionally, a worker pool onto one
//! set of [`Backends`] so the whole pipeline can run inside an existing
//! tokio application.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibq_core::backends::Backends;
//! use fibq_core::runtime::Pipeline;
//! use fibq_core::worker::WorkerPoolConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::builder()
//!         .backends(Backends::in_process("insert").await?)
//!         .max_index(40)
//!         .workers(WorkerPoolConfig::default())
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     pipeline.gateway().submit(Some("10")).await?;
//!
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::backends::Backends;
use crate::gateway::Gateway;
use crate::job::DEFAULT_MAX_INDEX;
use crate::reconcile::ReconcileReport;
use crate::worker::{WorkerPool, WorkerPoolConfig, WorkerPoolHandle, WorkerStats};

/// Builder for creating a [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder {
    backends: Option<Backends>,
    max_index: u32,
    workers: Option<WorkerPoolConfig>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            backends: None,
            max_index: DEFAULT_MAX_INDEX,
            workers: None,
        }
    }
}

impl PipelineBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backends (required).
    pub fn backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Set the gateway admission bound.
    ///
    /// Default: `40`
    pub fn max_index(mut self, max_index: u32) -> Self {
        self.max_index = max_index;
        self
    }

    /// Run a worker pool in this process. Without it only the gateway runs.
    pub fn workers(mut self, config: WorkerPoolConfig) -> Self {
        self.workers = Some(config);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<PipelineConfig> {
        let backends = self
            .backends
            .ok_or_else(|| anyhow::anyhow!("backends are required"))?;

        if let Some(workers) = &self.workers
            && workers.workers == 0
        {
            anyhow::bail!("worker pool needs at least one worker");
        }

        Ok(PipelineConfig {
            backends,
            max_index: self.max_index,
            workers: self.workers,
        })
    }
}

/// Configuration for a [`Pipeline`].
#[derive(Debug)]
pub struct PipelineConfig {
    backends: Backends,
    max_index: u32,
    workers: Option<WorkerPoolConfig>,
}

impl PipelineConfig {
    /// Create the gateway and start the worker pool, if any.
    pub async fn start(self) -> Result<Pipeline> {
        let gateway = Arc::new(
            Gateway::new(
                self.backends.log.clone(),
                self.backends.cache.clone(),
                self.backends.dispatch.clone(),
            )
            .with_max_index(self.max_index),
        );

        let workers = match self.workers {
            Some(config) => Some(
                WorkerPool::new(
                    self.backends.cache.clone(),
                    self.backends.dispatch.clone(),
                    config,
                )
                .with_log(self.backends.log.clone())
                .start()
                .await?,
            ),
            None => None,
        };

        info!(
            max_index = self.max_index,
            workers = workers.as_ref().map(|w| w.running()).unwrap_or(0),
            "Pipeline started"
        );

        Ok(Pipeline {
            gateway,
            workers,
            backends: self.backends,
        })
    }
}

/// A running pipeline.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct Pipeline {
    gateway: Arc<Gateway>,
    workers: Option<WorkerPoolHandle>,
    backends: Backends,
}

impl Pipeline {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The gateway, shareable across request handlers.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// The backends the pipeline runs on.
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Report of the worker pool's startup reconciliation, if it ran.
    pub fn reconciled(&self) -> Option<ReconcileReport> {
        self.workers.as_ref().and_then(|w| w.reconciled())
    }

    /// Stop the workers, then release backend connections.
    pub async fn shutdown(self) -> Result<WorkerStats> {
        info!("Pipeline shutting down...");

        let stats = match self.workers {
            Some(workers) => workers.shutdown().await,
            None => WorkerStats::default(),
        };
        self.backends.close().await;

        info!("Pipeline shutdown complete");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_backends() {
        let err = Pipeline::builder().build().unwrap_err();
        assert!(err.to_string().contains("backends"));
    }

    #[tokio::test]
    async fn test_build_rejects_empty_pool() {
        let backends = Backends::in_process("insert").await.unwrap();
        let err = Pipeline::builder()
            .backends(backends)
            .workers(WorkerPoolConfig {
                workers: 0,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least one worker"));
    }

    #[tokio::test]
    async fn test_gateway_only_pipeline() {
        let pipeline = Pipeline::builder()
            .backends(Backends::in_process("insert").await.unwrap())
            .max_index(10)
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();

        assert_eq!(pipeline.gateway().max_index(), 10);
        assert_eq!(pipeline.reconciled(), None);

        let receipt = pipeline.gateway().submit(Some("4")).await.unwrap();
        assert_eq!(receipt.delivered, 0);

        let stats = pipeline.shutdown().await.unwrap();
        assert_eq!(stats, WorkerStats::default());
    }
}
