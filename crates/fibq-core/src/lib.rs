// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! fibq Core - Submission, Dispatch and Compute Pipeline
//!
//! This crate accepts numeric job requests, records them durably, fans them
//! out to workers over a publish/subscribe channel, and serves computed
//! results from a low-latency cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Clients                               │
//! │                      (fibq-gateway, HTTP)                        │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Gateway                               │
//! │           validate → seed cache → append log + publish           │
//! └──────────────────────────────────────────────────────────────────┘
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//! ┌──────────────┐       ┌────────────────┐       ┌─────────────────┐
//! │ Durable Log  │       │  Result Cache  │◄──┐   │ Dispatch Channel│
//! │ (PostgreSQL) │       │  (Redis hash)  │   │   │ (Redis pub/sub) │
//! └──────────────┘       └────────────────┘   │   └─────────────────┘
//!        ▲                                    │            │ fan-out
//!        │ reconcile on start                 │            ▼
//!        │                           ┌─────────────────────────────┐
//!        └───────────────────────────│         Worker Pool         │
//!                                    │   (fibq-worker, N workers)  │
//!                                    └─────────────────────────────┘
//! ```
//!
//! # Cache Entry State Machine
//!
//! ```text
//!   ┌────────┐  submit   ┌─────────┐  worker writes  ┌───────┐
//!   │ absent │──────────►│ pending │────────────────►│ final │
//!   └────────┘           └─────────┘                 └───────┘
//! ```
//!
//! `final` is terminal. The gateway only ever seeds absent entries, and
//! workers only ever write final values, so a duplicate submission never
//! reverts a computed result.
//!
//! # Delivery
//!
//! The dispatch channel is a broadcast with no replay. Every subscribed
//! worker receives every message; a message published while nobody is
//! subscribed is lost. The reconciliation pass run by a starting worker pool
//! recovers such indexes from the durable log.
//!
//! # Modules
//!
//! - [`backends`]: Connection handles for the three stores
//! - [`cache`]: Result cache trait, Redis and in-memory backends
//! - [`compute`]: The computed function and its strategies
//! - [`config`]: Configuration from environment variables
//! - [`dispatch`]: Dispatch channel trait, Redis and in-process backends
//! - [`error`]: Error types with machine-readable codes
//! - [`gateway`]: Admission, submission and read queries
//! - [`job`]: Requests, cache values and dispatch messages
//! - [`persistence`]: Durable log trait, PostgreSQL and SQLite backends
//! - [`reconcile`]: Recovery of lost dispatches from the durable log
//! - [`runtime`]: Embeddable gateway + worker pool runtime
//! - [`worker`]: Worker pool

#![deny(missing_docs)]

/// Connection handles for the durable log, cache and dispatch channel.
pub mod backends;

/// Result cache interface and backends.
pub mod cache;

/// The computed function.
pub mod compute;

/// Configuration loaded from environment variables.
pub mod config;

/// Dispatch channel interface and backends.
pub mod dispatch;

/// Error types with machine-readable codes.
pub mod error;

/// Gateway operations: submit, list, snapshot.
pub mod gateway;

/// Job requests, cache values and dispatch messages.
pub mod job;

/// Embedded database migrations.
pub mod migrations;

/// Durable log interface and backends.
pub mod persistence;

/// Reconciliation of pending entries from the durable log.
pub mod reconcile;

/// Embeddable pipeline runtime.
pub mod runtime;

/// Worker pool consuming the dispatch channel.
pub mod worker;

pub use error::{CoreError, Result};
pub use gateway::{Gateway, SubmitReceipt};
pub use job::{CacheValue, DispatchMessage, JobRequest, PENDING_SENTINEL};
