// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed durable log.

use sqlx::PgPool;

use crate::error::CoreError;

use super::{DurableLog, DurableRecord};

/// PostgreSQL-backed durable log.
#[derive(Clone)]
pub struct PostgresLog {
    pool: PgPool,
}

impl PostgresLog {
    /// Create a new Postgres-backed log from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Append a submitted index.
pub async fn insert_value(pool: &PgPool, number: i32) -> Result<(), CoreError> {
    sqlx::query("INSERT INTO submitted_values (number) VALUES ($1)")
        .bind(number)
        .execute(pool)
        .await
        .map_err(|e| CoreError::DurableWrite {
            details: e.to_string(),
        })?;

    Ok(())
}

/// All submitted indexes in insertion order.
pub async fn list_values(pool: &PgPool) -> Result<Vec<DurableRecord>, CoreError> {
    let records = sqlx::query_as::<_, DurableRecord>(
        r#"
        SELECT number
        FROM submitted_values
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(records)
}

#[async_trait::async_trait]
impl DurableLog for PostgresLog {
    async fn append(&self, record: DurableRecord) -> Result<(), CoreError> {
        insert_value(&self.pool, record.number).await
    }

    async fn scan_all(&self) -> Result<Vec<DurableRecord>, CoreError> {
        list_values(&self.pool).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to get a test database pool
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        crate::migrations::run_postgres(&pool).await.ok()?;
        Some(pool)
    }

    async fn count_number(pool: &PgPool, number: i32) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM submitted_values WHERE number = $1")
            .bind(number)
            .fetch_one(pool)
            .await
            .expect("count query");
        row.0
    }

    #[tokio::test]
    async fn test_append_and_scan() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let log = PostgresLog::new(pool.clone());

        let before = count_number(&pool, 17).await;
        log.append(DurableRecord::new(17)).await.unwrap();
        log.append(DurableRecord::new(17)).await.unwrap();
        assert_eq!(count_number(&pool, 17).await, before + 2);

        let records = log.scan_all().await.unwrap();
        let tail: Vec<_> = records.iter().rev().take(2).collect();
        assert!(tail.iter().all(|r| r.number == 17));
    }

    #[tokio::test]
    async fn test_scan_preserves_insertion_order() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let log = PostgresLog::new(pool);

        for n in [33, 2, 19] {
            log.append(DurableRecord::new(n)).await.unwrap();
        }

        let records = log.scan_all().await.unwrap();
        let tail: Vec<i32> = records[records.len() - 3..].iter().map(|r| r.number).collect();
        assert_eq!(tail, vec![33, 2, 19]);
    }
}
