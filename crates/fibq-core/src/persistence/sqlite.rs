//! SQLite-backed durable log.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;
use crate::migrations;

use super::{DurableLog, DurableRecord};

/// SQLite-backed durable log.
#[derive(Clone)]
pub struct SqliteLog {
    pool: SqlitePool,
}

impl SqliteLog {
    /// Create a new SQLite log from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a SQLite log from a file path.
    ///
    /// Creates parent directories and the database file when missing, then
    /// runs all migrations.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let log = SqliteLog::from_path(".data/fibq.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl DurableLog for SqliteLog {
    async fn append(&self, record: DurableRecord) -> Result<(), CoreError> {
        sqlx::query("INSERT INTO submitted_values (number) VALUES (?)")
            .bind(record.number)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::DurableWrite {
                details: e.to_string(),
            })?;

        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<DurableRecord>, CoreError> {
        let records = sqlx::query_as::<_, DurableRecord>(
            r#"
            SELECT number
            FROM submitted_values
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
