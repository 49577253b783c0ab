// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests against an in-memory database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::repository::SqliteAuthorizationRepository;
use crate::schema::run_migrations;

/// In-memory pool with the ACL schema.
///
/// Limited to one connection that is never recycled: every connection to
/// `:memory:` opens its own empty database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_test_repository() -> SqliteAuthorizationRepository {
	SqliteAuthorizationRepository::new(create_test_pool().await)
}
