// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for fibq-core.
//!
//! Embedded migrators for the durable log schema. [`crate::persistence::connect`]
//! runs them automatically; deployments that manage their own connection
//! pools can call these directly.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::PgPool;
//! use fibq_core::migrations;
//!
//! let pool = PgPool::connect(&database_url).await?;
//! migrations::run_postgres(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// PostgreSQL migrator with all durable log migrations embedded.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

/// SQLite migrator with all durable log migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run PostgreSQL migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Run SQLite migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
