// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite schema for roles and authorizations.
//!
//! Children reference their parent with `ON DELETE CASCADE`, so removing an
//! authorization row also removes whatever the application did not delete
//! explicitly below it. Authorizations outlive their role (`ON DELETE SET NULL`).

use sqlx::sqlite::SqlitePool;

use crate::error::AclServerError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS acl_roles (
		id TEXT PRIMARY KEY NOT NULL,
		kind TEXT NOT NULL,
		security_identity_id TEXT NOT NULL,
		resources TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_acl_roles_identity ON acl_roles(security_identity_id)",
	r#"
	CREATE TABLE IF NOT EXISTS acl_authorizations (
		id TEXT PRIMARY KEY NOT NULL,
		security_identity_id TEXT NOT NULL,
		role_id TEXT REFERENCES acl_roles(id) ON DELETE SET NULL,
		resource_class TEXT NOT NULL,
		resource_id TEXT,
		actions INTEGER NOT NULL CHECK (actions >= 0),
		cascadable INTEGER NOT NULL DEFAULT 0,
		parent_id TEXT REFERENCES acl_authorizations(id) ON DELETE CASCADE,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_acl_authorizations_lookup
		ON acl_authorizations(security_identity_id, resource_class, resource_id)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_acl_authorizations_resource
		ON acl_authorizations(resource_class, resource_id)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_acl_authorizations_parent ON acl_authorizations(parent_id)",
	"CREATE INDEX IF NOT EXISTS idx_acl_authorizations_role ON acl_authorizations(role_id)",
];

/// Creates the ACL tables and indexes if they do not exist.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AclServerError> {
	let mut tx = pool.begin().await?;
	for statement in STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::debug!(statements = STATEMENTS.len(), "acl schema ready");
	Ok(())
}
