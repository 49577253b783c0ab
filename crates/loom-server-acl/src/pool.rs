// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::error::AclServerError;
use crate::repository::SqliteAuthorizationRepository;
use crate::schema::run_migrations;

/// Create a SqlitePool with WAL mode and foreign keys enforced.
///
/// Foreign keys must be on: cascade subtrees are linked through
/// `parent_id REFERENCES acl_authorizations(id) ON DELETE CASCADE`.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./loom-acl.db")
///
/// # Errors
/// Returns `AclServerError::Internal` if the URL is invalid, or
/// `AclServerError::Persistence` if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, AclServerError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| AclServerError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Opens the configured database and applies the ACL schema.
#[tracing::instrument(skip(config))]
pub async fn open_repository(
	config: &DatabaseConfig,
) -> Result<SqliteAuthorizationRepository, AclServerError> {
	let pool = create_pool(&config.url).await?;
	run_migrations(&pool).await?;
	Ok(SqliteAuthorizationRepository::new(pool))
}
