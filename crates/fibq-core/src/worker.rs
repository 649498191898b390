// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker pool: consume dispatch notifications and write results.
//!
//! Every worker holds its own subscription, so with N workers every message
//! is computed N times. That is wasteful but harmless: results are pure and
//! writes are content-identical.
//!
//! A worker handles one message at a time. The computation runs on the
//! blocking pool, so the async reactor stays responsive while a large index
//! is being computed, but the worker itself takes no further messages until
//! it finishes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::ResultCache;
use crate::compute::{ComputeStrategy, compute_blocking};
use crate::dispatch::{DispatchChannel, Subscription};
use crate::error::{CoreError, Result};
use crate::job::{CacheValue, DEFAULT_MAX_INDEX, DispatchMessage};
use crate::persistence::DurableLog;
use crate::reconcile::{ReconcileOptions, ReconcileReport, reconcile};

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers, each with its own subscription.
    pub workers: usize,
    /// How results are computed.
    pub strategy: ComputeStrategy,
    /// Stop waiting for a single computation after this long.
    pub compute_timeout: Option<Duration>,
    /// Run a reconciliation pass after subscribing. Needs a durable log.
    pub reconcile_on_start: bool,
    /// Upper bound for indexes picked up by reconciliation.
    pub max_index: u32,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            strategy: ComputeStrategy::default(),
            compute_timeout: None,
            reconcile_on_start: true,
            max_index: DEFAULT_MAX_INDEX,
        }
    }
}

/// Counters reported by a worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Messages whose result was written.
    pub processed: u64,
    /// Messages whose compute or write failed.
    pub failed: u64,
}

impl std::ops::Add for WorkerStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            processed: self.processed + other.processed,
            failed: self.failed + other.failed,
        }
    }
}

/// A single consumer of the dispatch channel.
#[derive(Clone)]
pub struct Worker {
    id: usize,
    cache: Arc<dyn ResultCache>,
    strategy: ComputeStrategy,
    compute_timeout: Option<Duration>,
}

impl Worker {
    /// Create a worker writing into `cache`.
    pub fn new(id: usize, cache: Arc<dyn ResultCache>, strategy: ComputeStrategy) -> Self {
        Self {
            id,
            cache,
            strategy,
            compute_timeout: None,
        }
    }

    /// Abandon computations that take longer than `timeout`.
    pub fn with_compute_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.compute_timeout = timeout;
        self
    }

    /// Compute the result for one message and store it. Returns the value.
    pub async fn handle(&self, message: &DispatchMessage) -> Result<u64> {
        let index = message.index;
        let value = compute_blocking(self.strategy, index, self.compute_timeout).await?;
        self.cache
            .set(&index.to_string(), &CacheValue::Ready(value).encode())
            .await?;
        Ok(value)
    }

    /// Consume `subscription` until shutdown or until the channel closes.
    ///
    /// A message being handled when shutdown is signalled is finished first.
    pub async fn run(
        self,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(worker = self.id, strategy = self.strategy.as_str(), "Worker started");

        loop {
            let message = tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!(worker = self.id, "Worker received shutdown signal");
                    break;
                }

                message = subscription.next() => match message {
                    Some(message) => message,
                    None => {
                        warn!(worker = self.id, "Dispatch channel closed");
                        break;
                    }
                },
            };

            match self.handle(&message).await {
                Ok(value) => {
                    stats.processed += 1;
                    debug!(worker = self.id, index = message.index, value, "Result stored");
                }
                Err(e @ CoreError::CacheWrite { .. }) => {
                    // Without this write the entry stays pending until the
                    // next reconciliation pass.
                    stats.failed += 1;
                    error!(worker = self.id, index = message.index, error = %e, "Failed to store result");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(worker = self.id, index = message.index, error = %e, "Failed to compute result");
                }
            }
        }

        info!(
            worker = self.id,
            processed = stats.processed,
            failed = stats.failed,
            "Worker stopped"
        );
        stats
    }
}

/// Builder for a set of workers sharing one cache and one channel.
pub struct WorkerPool {
    cache: Arc<dyn ResultCache>,
    dispatch: Arc<dyn DispatchChannel>,
    log: Option<Arc<dyn DurableLog>>,
    config: WorkerPoolConfig,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("channel", &self.dispatch.channel())
            .field("log", &self.log.as_ref().map(|_| "..."))
            .field("config", &self.config)
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool consuming `dispatch` and writing to `cache`.
    pub fn new(
        cache: Arc<dyn ResultCache>,
        dispatch: Arc<dyn DispatchChannel>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            cache,
            dispatch,
            log: None,
            config,
        }
    }

    /// Durable log used by the reconciliation pass.
    pub fn with_log(mut self, log: Arc<dyn DurableLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Subscribe every worker, reconcile if configured, and spawn the workers.
    ///
    /// All subscriptions are live when this returns.
    pub async fn start(self) -> Result<WorkerPoolHandle> {
        let mut subscriptions = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            subscriptions.push(self.dispatch.subscribe().await?);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = subscriptions
            .into_iter()
            .enumerate()
            .map(|(id, subscription)| {
                let worker = Worker::new(id, self.cache.clone(), self.config.strategy)
                    .with_compute_timeout(self.config.compute_timeout);
                tokio::spawn(worker.run(subscription, shutdown_rx.clone()))
            })
            .collect();

        info!(
            workers = self.config.workers,
            channel = %self.dispatch.channel(),
            "Worker pool started"
        );

        let reconciled = match (&self.log, self.config.reconcile_on_start) {
            (Some(log), true) => {
                let options = ReconcileOptions {
                    strategy: self.config.strategy,
                    compute_timeout: self.config.compute_timeout,
                    max_index: self.config.max_index,
                };
                match reconcile(log.as_ref(), self.cache.as_ref(), options).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        warn!(error = %e, "Reconciliation pass failed");
                        None
                    }
                }
            }
            (None, true) => {
                debug!("No durable log configured, skipping reconciliation");
                None
            }
            _ => None,
        };

        Ok(WorkerPoolHandle {
            handles,
            shutdown_tx,
            reconciled,
        })
    }
}

/// Handle to a running worker pool.
pub struct WorkerPoolHandle {
    handles: Vec<JoinHandle<WorkerStats>>,
    shutdown_tx: watch::Sender<bool>,
    reconciled: Option<ReconcileReport>,
}

impl WorkerPoolHandle {
    /// Report of the startup reconciliation pass, if it ran.
    pub fn reconciled(&self) -> Option<ReconcileReport> {
        self.reconciled
    }

    /// Number of workers still running.
    pub fn running(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Signal every worker to stop and wait for them. Returns summed stats.
    pub async fn shutdown(self) -> WorkerStats {
        info!("Worker pool shutting down...");
        let _ = self.shutdown_tx.send(true);

        let mut total = WorkerStats::default();
        for handle in self.handles {
            match handle.await {
                Ok(stats) => total = total + stats,
                Err(e) => error!("Worker task panicked: {}", e),
            }
        }

        info!(
            processed = total.processed,
            failed = total.failed,
            "Worker pool shutdown complete"
        );
        total
    }
}
