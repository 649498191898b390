// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway: admission, submission and read queries.
//!
//! # Submission order
//!
//! ```text
//!   validate ──► seed cache (if absent) ──┬──► publish dispatch
//!                                         └──► append durable log
//! ```
//!
//! The pending seed is written before anything is published, so a worker can
//! never write a final value that a later seed would overwrite. The durable
//! append runs alongside the publish and is awaited before returning, but a
//! failure there is only logged: durability is best-effort.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheSnapshot, ResultCache};
use crate::dispatch::DispatchChannel;
use crate::error::{CoreError, Result};
use crate::job::{CacheValue, DEFAULT_MAX_INDEX, JobRequest};
use crate::persistence::{DurableLog, DurableRecord};

/// Outcome of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// The accepted index.
    pub index: u32,
    /// Always true for a returned receipt; rejected requests return an error.
    pub accepted: bool,
    /// Whether this call created the pending entry (false when one existed).
    pub seeded: bool,
    /// Whether the durable append succeeded.
    pub durable: bool,
    /// Subscribers that received the dispatch notification.
    pub delivered: usize,
}

/// Entry point for clients of the pipeline.
pub struct Gateway {
    log: Arc<dyn DurableLog>,
    cache: Arc<dyn ResultCache>,
    dispatch: Arc<dyn DispatchChannel>,
    max_index: u32,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("channel", &self.dispatch.channel())
            .field("max_index", &self.max_index)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway over the given stores with the default bound.
    pub fn new(
        log: Arc<dyn DurableLog>,
        cache: Arc<dyn ResultCache>,
        dispatch: Arc<dyn DispatchChannel>,
    ) -> Self {
        Self {
            log,
            cache,
            dispatch,
            max_index: DEFAULT_MAX_INDEX,
        }
    }

    /// Override the admission bound.
    pub fn with_max_index(mut self, max_index: u32) -> Self {
        self.max_index = max_index;
        self
    }

    /// The admission bound.
    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// Validate and submit a raw index as received from a client.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] when the index is missing, malformed,
    ///   negative, or above the bound. Nothing is written in that case.
    /// - [`CoreError::CacheWrite`] when the pending entry can't be seeded.
    ///   Nothing is appended or published in that case.
    /// - [`CoreError::Dispatch`] when the channel backend is unreachable.
    #[instrument(skip(self), fields(max_index = self.max_index))]
    pub async fn submit(&self, raw_index: Option<&str>) -> Result<SubmitReceipt> {
        let request = JobRequest::parse(raw_index, self.max_index).inspect_err(|e| {
            debug!(error = %e, "Submission rejected");
        })?;
        self.submit_request(request).await
    }

    /// Submit an already-parsed request. The bound is re-checked against this
    /// gateway's own limit.
    pub async fn submit_request(&self, request: JobRequest) -> Result<SubmitReceipt> {
        let request = JobRequest::new(i64::from(request.index()), self.max_index)?;
        let index = request.index();
        let key = request.cache_key();

        let seeded = self
            .cache
            .set_if_absent(&key, &CacheValue::Pending.encode())
            .await
            .inspect_err(|e| error!(index, error = %e, "Failed to seed pending entry"))?;

        let (appended, published) = tokio::join!(
            self.log.append(DurableRecord::new(index)),
            self.dispatch.publish(index),
        );

        let durable = match appended {
            Ok(()) => true,
            Err(e) => {
                warn!(index, error = %e, "Durable log append failed, continuing");
                false
            }
        };

        let delivered = published.inspect_err(|e| {
            error!(index, error = %e, "Failed to publish dispatch notification");
        })?;

        if delivered == 0 {
            warn!(
                index,
                channel = %self.dispatch.channel(),
                "No worker subscribed, dispatch notification lost"
            );
        }

        info!(index, seeded, durable, delivered, "Submission accepted");

        Ok(SubmitReceipt {
            index,
            accepted: true,
            seeded,
            durable,
            delivered,
        })
    }

    /// Every submitted index in insertion order, duplicates included.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<DurableRecord>> {
        self.log.scan_all().await
    }

    /// Snapshot of the result cache, pending entries included.
    #[instrument(skip(self))]
    pub async fn current_values(&self) -> Result<CacheSnapshot> {
        self.cache.get_all().await
    }
}
