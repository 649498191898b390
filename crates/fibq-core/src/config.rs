// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::compute::ComputeStrategy;
use crate::job::{DEFAULT_CHANNEL, DEFAULT_MAX_INDEX, MAX_SUPPORTED_INDEX};
use crate::worker::WorkerPoolConfig;

/// fibq configuration shared by the gateway and worker processes.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL for the durable log
    pub database_url: String,
    /// Redis URL for the result cache and dispatch channel
    pub redis_url: String,
    /// HTTP listen address of the gateway
    pub http_addr: SocketAddr,
    /// Largest index accepted by the gateway
    pub max_index: u32,
    /// Redis hash holding cache entries
    pub cache_key: String,
    /// Pub/sub channel for dispatch notifications
    pub dispatch_channel: String,
    /// Delay between subscriber reconnect attempts
    pub reconnect_interval: Duration,
    /// Workers per worker process
    pub workers: usize,
    /// Workers run inside the gateway process
    pub embedded_workers: usize,
    /// How workers compute results
    pub compute_strategy: ComputeStrategy,
    /// Per-message compute timeout
    pub compute_timeout: Option<Duration>,
    /// Whether workers reconcile from the durable log on startup
    pub reconcile_on_start: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required (one of):
    /// - `FIBQ_DATABASE_URL`: PostgreSQL or SQLite connection string
    /// - `PGHOST` (+ optional `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`)
    ///
    /// Optional (with defaults):
    /// - `FIBQ_REDIS_URL`: Redis URL (default: built from `REDIS_HOST`/`REDIS_PORT`,
    ///   else `redis://127.0.0.1:6379`)
    /// - `FIBQ_HTTP_PORT`: gateway port (default: 5000)
    /// - `FIBQ_MAX_INDEX`: admission bound (default: 40, at most 92)
    /// - `FIBQ_CACHE_KEY`: Redis hash name (default: values)
    /// - `FIBQ_DISPATCH_CHANNEL`: channel name (default: insert)
    /// - `FIBQ_RECONNECT_INTERVAL_MS`: subscriber reconnect delay (default: 1000)
    /// - `FIBQ_WORKERS`: workers per worker process (default: 1)
    /// - `FIBQ_EMBEDDED_WORKERS`: workers inside the gateway (default: 0)
    /// - `FIBQ_COMPUTE_STRATEGY`: `iterative` or `recursive` (default: iterative)
    /// - `FIBQ_COMPUTE_TIMEOUT_MS`: per-message compute timeout (default: none)
    /// - `FIBQ_RECONCILE_ON_START`: run reconciliation on startup (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = match std::env::var("FIBQ_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => postgres_url_from_parts()
                .ok_or(ConfigError::Missing("FIBQ_DATABASE_URL or PGHOST"))?,
        };

        let redis_url = match std::env::var("FIBQ_REDIS_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port: u16 = parse_var("REDIS_PORT", 6379, "must be a valid port number")?;
                format!("redis://{}:{}", host, port)
            }
        };

        let http_port: u16 = parse_var("FIBQ_HTTP_PORT", 5000, "must be a valid port number")?;

        let max_index: u32 = parse_var(
            "FIBQ_MAX_INDEX",
            DEFAULT_MAX_INDEX,
            "must be an integer between 0 and 92",
        )?;
        if max_index > MAX_SUPPORTED_INDEX {
            return Err(ConfigError::Invalid(
                "FIBQ_MAX_INDEX",
                "must be an integer between 0 and 92",
            ));
        }

        let reconnect_ms: u64 = parse_var(
            "FIBQ_RECONNECT_INTERVAL_MS",
            1000,
            "must be a positive integer",
        )?;
        if reconnect_ms == 0 {
            return Err(ConfigError::Invalid(
                "FIBQ_RECONNECT_INTERVAL_MS",
                "must be a positive integer",
            ));
        }

        let workers: usize = parse_var("FIBQ_WORKERS", 1, "must be a positive integer")?;
        if workers == 0 {
            return Err(ConfigError::Invalid(
                "FIBQ_WORKERS",
                "must be a positive integer",
            ));
        }

        let embedded_workers: usize = parse_var(
            "FIBQ_EMBEDDED_WORKERS",
            0,
            "must be a non-negative integer",
        )?;

        let compute_strategy = match std::env::var("FIBQ_COMPUTE_STRATEGY") {
            Ok(value) => value.parse().map_err(|_| {
                ConfigError::Invalid(
                    "FIBQ_COMPUTE_STRATEGY",
                    "must be 'iterative' or 'recursive'",
                )
            })?,
            Err(_) => ComputeStrategy::default(),
        };

        let compute_timeout = match std::env::var("FIBQ_COMPUTE_TIMEOUT_MS") {
            Ok(value) => {
                let ms: u64 = value.parse().map_err(|_| {
                    ConfigError::Invalid("FIBQ_COMPUTE_TIMEOUT_MS", "must be a positive integer")
                })?;
                Some(Duration::from_millis(ms))
            }
            Err(_) => None,
        };

        let reconcile_on_start = std::env::var("FIBQ_RECONCILE_ON_START")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            database_url,
            redis_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            max_index,
            cache_key: std::env::var("FIBQ_CACHE_KEY").unwrap_or_else(|_| "values".to_string()),
            dispatch_channel: std::env::var("FIBQ_DISPATCH_CHANNEL")
                .unwrap_or_else(|_| DEFAULT_CHANNEL.to_string()),
            reconnect_interval: Duration::from_millis(reconnect_ms),
            workers,
            embedded_workers,
            compute_strategy,
            compute_timeout,
            reconcile_on_start,
        })
    }

    /// Worker pool settings with `workers` workers.
    pub fn worker_pool(&self, workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            workers,
            strategy: self.compute_strategy,
            compute_timeout: self.compute_timeout,
            reconcile_on_start: self.reconcile_on_start,
            max_index: self.max_index,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(name, reason)),
        Err(_) => Ok(default),
    }
}

fn postgres_url_from_parts() -> Option<String> {
    let host = std::env::var("PGHOST").ok()?;
    let port = std::env::var("PGPORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string());
    let database = std::env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string());
    let credentials = match std::env::var("PGPASSWORD") {
        Ok(password) => format!("{}:{}", user, password),
        Err(_) => user,
    };
    Some(format!(
        "postgres://{}@{}:{}/{}",
        credentials, host, port, database
    ))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
