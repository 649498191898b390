// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recovery of work lost by the dispatch channel.
//!
//! The channel never replays, so an index whose notification was published
//! with no worker listening (or whose worker died mid-computation) stays
//! pending forever. This pass re-derives that work from the durable log:
//! every logged index whose cache entry is absent or pending gets computed
//! and written.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::compute::{ComputeStrategy, compute_blocking};
use crate::error::Result;
use crate::job::CacheValue;
use crate::persistence::DurableLog;

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Distinct indexes found in the durable log.
    pub scanned: usize,
    /// Entries computed and written.
    pub recomputed: usize,
    /// Indexes above the current bound, left alone.
    pub skipped: usize,
    /// Entries whose compute or write failed.
    pub failed: usize,
}

/// Settings for a reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Strategy used to compute missing values.
    pub strategy: ComputeStrategy,
    /// Per-index compute timeout.
    pub compute_timeout: Option<Duration>,
    /// Indexes above this are skipped.
    pub max_index: u32,
}

/// Compute and store every logged index that has no final value.
pub async fn reconcile(
    log: &dyn DurableLog,
    cache: &dyn ResultCache,
    options: ReconcileOptions,
) -> Result<ReconcileReport> {
    let indexes: BTreeSet<i32> = log.scan_all().await?.into_iter().map(|r| r.number).collect();
    let snapshot = cache.get_all().await?;

    let mut report = ReconcileReport {
        scanned: indexes.len(),
        ..Default::default()
    };

    for number in indexes {
        let key = number.to_string();
        let needs_work = match snapshot.get(&key).map(|raw| CacheValue::decode(raw)) {
            None => true,
            Some(Some(value)) => value.is_pending(),
            Some(None) => {
                warn!(index = number, "Unreadable cache value, recomputing");
                true
            }
        };
        if !needs_work {
            continue;
        }

        let index = match u32::try_from(number) {
            Ok(index) if index <= options.max_index => index,
            _ => {
                warn!(
                    index = number,
                    max_index = options.max_index,
                    "Logged index outside current bound, not reconciled"
                );
                report.skipped += 1;
                continue;
            }
        };

        let written = match compute_blocking(options.strategy, index, options.compute_timeout).await
        {
            Ok(value) => cache.set(&key, &CacheValue::Ready(value).encode()).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => report.recomputed += 1,
            Err(e) => {
                warn!(index, error = %e, "Failed to reconcile entry");
                report.failed += 1;
            }
        }
    }

    info!(
        scanned = report.scanned,
        recomputed = report.recomputed,
        skipped = report.skipped,
        failed = report.failed,
        "Reconciliation pass completed"
    );

    Ok(report)
}
