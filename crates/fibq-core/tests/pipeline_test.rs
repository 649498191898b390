// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests for the submit → dispatch → compute → cache pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use fibq_core::cache::ResultCache;
use fibq_core::dispatch::{DispatchChannel, LocalDispatch};
use fibq_core::persistence::{DurableLog, DurableRecord};
use fibq_core::worker::WorkerPoolConfig;
use fibq_core::{CacheValue, PENDING_SENTINEL};

use common::{pipeline_with_workers, wait_for_value};

#[tokio::test]
async fn test_rejected_indexes_leave_no_trace() {
    let pipeline = pipeline_with_workers(1).await;
    let gateway = pipeline.gateway();

    for raw in ["41", "42", "100", "4000000000"] {
        let err = gateway.submit(Some(raw)).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    assert!(gateway.list_all().await.unwrap().is_empty());
    assert!(gateway.current_values().await.unwrap().is_empty());

    let stats = pipeline.shutdown().await.unwrap();
    assert_eq!(stats.processed, 0);
}

#[tokio::test]
async fn test_submitted_index_is_pending_then_final() {
    // Gateway only: nothing computes, so the pending state is observable.
    let backends = common::backends().await;
    let pipeline = fibq_core::runtime::Pipeline::builder()
        .backends(backends.clone())
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    let receipt = pipeline.gateway().submit(Some("10")).await.unwrap();
    assert!(receipt.accepted);

    let values = pipeline.gateway().current_values().await.unwrap();
    assert_eq!(values["10"], PENDING_SENTINEL);

    // A worker joining later computes from its next dispatch.
    let workers = fibq_core::worker::WorkerPool::new(
        backends.cache.clone(),
        backends.dispatch.clone(),
        WorkerPoolConfig {
            reconcile_on_start: false,
            ..Default::default()
        },
    )
    .start()
    .await
    .unwrap();

    pipeline.gateway().submit(Some("10")).await.unwrap();
    wait_for_value(backends.cache.as_ref(), "10", "89").await;

    // Final never reverts, even with another submission of the same index.
    pipeline.gateway().submit(Some("10")).await.unwrap();
    let values = pipeline.gateway().current_values().await.unwrap();
    assert_eq!(CacheValue::decode(&values["10"]), Some(CacheValue::Ready(89)));

    workers.shutdown().await;
    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_every_accepted_submission_is_logged_once() {
    let pipeline = pipeline_with_workers(1).await;
    let gateway = pipeline.gateway();

    for raw in ["3", "0", "40", "3"] {
        gateway.submit(Some(raw)).await.unwrap();
    }

    let numbers: Vec<i32> = gateway
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.number)
        .collect();
    assert_eq!(numbers, vec![3, 0, 40, 3]);

    let cache = pipeline.backends().cache.clone();
    wait_for_value(cache.as_ref(), "0", "1").await;
    wait_for_value(cache.as_ref(), "3", "3").await;
    wait_for_value(cache.as_ref(), "40", "165580141").await;

    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_submissions_converge() {
    let pipeline = pipeline_with_workers(3).await;
    let gateway = pipeline.gateway();

    let submissions = (0..5).map(|_| gateway.submit(Some("25")));
    for receipt in futures::future::join_all(submissions).await {
        let receipt = receipt.unwrap();
        assert_eq!(receipt.delivered, 3);
    }

    let cache = pipeline.backends().cache.clone();
    wait_for_value(cache.as_ref(), "25", "121393").await;

    assert_eq!(gateway.list_all().await.unwrap().len(), 5);
    let values = gateway.current_values().await.unwrap();
    assert_eq!(values.len(), 1);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_publish_without_workers_is_lost_until_reconciled() {
    let backends = common::backends().await;
    let pipeline = fibq_core::runtime::Pipeline::builder()
        .backends(backends.clone())
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    let receipt = pipeline.gateway().submit(Some("12")).await.unwrap();
    assert_eq!(receipt.delivered, 0);

    // Nothing is listening, nothing is retained: a later subscriber sees nothing.
    let mut late = backends.dispatch.subscribe().await.unwrap();
    let next = tokio::time::timeout(Duration::from_millis(50), futures::StreamExt::next(&mut late));
    assert!(next.await.is_err());
    assert_eq!(
        backends.cache.get("12").await.unwrap().as_deref(),
        Some(PENDING_SENTINEL)
    );

    // A worker pool that reconciles on start recovers the index from the log.
    let workers = fibq_core::worker::WorkerPool::new(
        backends.cache.clone(),
        backends.dispatch.clone(),
        WorkerPoolConfig::default(),
    )
    .with_log(backends.log.clone())
    .start()
    .await
    .unwrap();

    let report = workers.reconciled().expect("reconciliation ran");
    assert_eq!(report.recomputed, 1);
    assert_eq!(backends.cache.get("12").await.unwrap().as_deref(), Some("233"));

    workers.shutdown().await;
    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pipeline_reconciles_on_start() {
    let backends = common::backends().await;
    backends.log.append(DurableRecord::new(9)).await.unwrap();
    backends.cache.set("9", PENDING_SENTINEL).await.unwrap();

    let pipeline = fibq_core::runtime::Pipeline::builder()
        .backends(backends.clone())
        .workers(WorkerPoolConfig::default())
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    assert_eq!(pipeline.reconciled().map(|r| r.recomputed), Some(1));
    assert_eq!(backends.cache.get("9").await.unwrap().as_deref(), Some("55"));

    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_separate_channels_do_not_cross() {
    let cache: Arc<dyn ResultCache> = Arc::new(fibq_core::cache::MemoryCache::new());
    let jobs = Arc::new(LocalDispatch::new("jobs"));
    let other = Arc::new(LocalDispatch::new("other"));

    let workers = fibq_core::worker::WorkerPool::new(
        cache.clone(),
        jobs.clone(),
        WorkerPoolConfig::default(),
    )
    .start()
    .await
    .unwrap();

    assert_eq!(other.publish(5).await.unwrap(), 0);
    assert_eq!(jobs.publish(6).await.unwrap(), 1);
    wait_for_value(cache.as_ref(), "6", "13").await;
    assert_eq!(cache.get("5").await.unwrap(), None);

    workers.shutdown().await;
}
