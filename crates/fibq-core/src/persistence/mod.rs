//! Durable log interfaces and backends for fibq-core.
//!
//! The durable log is the append-only record of every accepted submission.
//! It is never updated or deleted by the pipeline.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresLog;
pub use self::sqlite::SqliteLog;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::error::CoreError;
use crate::migrations;

/// One accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DurableRecord {
    /// The submitted index.
    pub number: i32,
}

impl DurableRecord {
    /// Record for a submitted index.
    pub fn new(index: u32) -> Self {
        Self {
            number: index as i32,
        }
    }
}

/// Durable log interface used by the gateway and the reconciliation pass.
#[async_trait]
pub trait DurableLog: Send + Sync {
    /// Append one record.
    async fn append(&self, record: DurableRecord) -> Result<(), CoreError>;

    /// All records in insertion order.
    async fn scan_all(&self) -> Result<Vec<DurableRecord>, CoreError>;

    /// Release pooled connections. The log must not be used afterwards.
    async fn close(&self) {}
}

/// Connect to the durable log named by `url` and apply migrations.
///
/// `postgres://`/`postgresql://` URLs select [`PostgresLog`], `sqlite:` URLs
/// select [`SqliteLog`].
pub async fn connect(url: &str) -> Result<Arc<dyn DurableLog>, CoreError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;
        migrations::run_postgres(&pool).await?;
        info!("Durable log connected (postgres)");
        Ok(Arc::new(PostgresLog::new(pool)))
    } else if url.starts_with("sqlite:") {
        // Every connection to `sqlite::memory:` opens a separate database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;
        migrations::run_sqlite(&pool).await?;
        info!("Durable log connected (sqlite)");
        Ok(Arc::new(SqliteLog::new(pool)))
    } else {
        Err(CoreError::Database {
            operation: "connect".to_string(),
            details: format!("unsupported database URL scheme: {}", redact(url)),
        })
    }
}

fn redact(url: &str) -> &str {
    url.split_once("://").map(|(scheme, _)| scheme).unwrap_or(url)
}
