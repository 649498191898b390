// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for fibq-core integration tests.
//!
//! Provides in-process backends and helpers for waiting on cache entries.

#![allow(dead_code)]

use std::time::Duration;

use fibq_core::backends::Backends;
use fibq_core::cache::ResultCache;
use fibq_core::runtime::{Pipeline, PipelineBuilder};
use fibq_core::worker::WorkerPoolConfig;

/// In-process backends on the default channel name.
pub async fn backends() -> Backends {
    Backends::in_process("insert")
        .await
        .expect("in-process backends")
}

/// Builder over fresh in-process backends.
pub async fn builder() -> PipelineBuilder {
    Pipeline::builder().backends(backends().await)
}

/// A pipeline with `workers` workers and no reconciliation.
pub async fn pipeline_with_workers(workers: usize) -> Pipeline {
    builder()
        .await
        .workers(WorkerPoolConfig {
            workers,
            reconcile_on_start: false,
            ..Default::default()
        })
        .build()
        .expect("valid pipeline")
        .start()
        .await
        .expect("pipeline starts")
}

/// Poll `cache` until `key` holds `expected`, failing after five seconds.
pub async fn wait_for_value(cache: &dyn ResultCache, key: &str, expected: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = cache.get(key).await.expect("cache read");
        if current.as_deref() == Some(expected) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "cache entry {key} is {current:?}, expected {expected}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
