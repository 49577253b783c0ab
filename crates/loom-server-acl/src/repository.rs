// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization and role persistence.
//!
//! Every write runs in one transaction: a batch (including multi-level
//! cascade trees) is either fully committed or not at all. Children are a
//! query on `parent_id`; nothing is loaded implicitly, and list queries take
//! an explicit [`Page`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::instrument;

use loom_acl_core::{
	order_parents_first, AclError, Action, ActionSet, Authorization, AuthorizationId, ResourceRef,
	Role, RoleId, SecurityIdentityId,
};

use crate::error::{AclServerError, Result};

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Explicit pagination for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub limit: u32,
	pub offset: u32,
}

impl Page {
	pub fn new(limit: u32, offset: u32) -> Self {
		Self { limit, offset }
	}

	pub fn first(limit: u32) -> Self {
		Self::new(limit, 0)
	}

	/// The page after this one.
	pub fn next(self) -> Self {
		Self::new(self.limit, self.offset.saturating_add(self.limit))
	}
}

impl Default for Page {
	fn default() -> Self {
		Self::first(DEFAULT_PAGE_SIZE)
	}
}

/// Repository trait for authorization and role storage.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
	// Authorization writes

	/// Persists a batch atomically, reordered so parents precede children.
	///
	/// Fails without committing anything if any record violates a storage
	/// constraint or a parent/child invariant.
	async fn insert_bulk(&self, authorizations: &[Authorization]) -> Result<()>;

	/// Removes one authorization and its cascade subtree. Returns rows removed.
	async fn remove_authorization(&self, id: AuthorizationId) -> Result<u64>;

	/// Removes every authorization exactly matching `resource`, with subtrees.
	///
	/// Nothing matching is not an error.
	async fn remove_authorizations_for_resource(&self, resource: &ResourceRef) -> Result<u64>;

	/// Removes every authorization owned by a role, with subtrees.
	async fn remove_authorizations_for_role(&self, role_id: RoleId) -> Result<u64>;

	/// Replaces all stored authorizations with `authorizations` in one transaction.
	async fn replace_all_authorizations(&self, authorizations: &[Authorization]) -> Result<()>;

	// Authorization reads

	async fn find_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>>;
	async fn find_all(&self, page: Page) -> Result<Vec<Authorization>>;
	async fn find_children(&self, parent_id: AuthorizationId, page: Page)
		-> Result<Vec<Authorization>>;
	async fn find_for_role(&self, role_id: RoleId, page: Page) -> Result<Vec<Authorization>>;
	async fn count_authorizations(&self) -> Result<u64>;

	/// Cascadable authorizations on exactly `resource` (entity or class).
	async fn find_cascadable_authorizations_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<Authorization>>;

	// Resolution

	/// True if `identity` holds `action` on the entity itself or on its class.
	///
	/// # Errors
	/// [`AclError::ExpectedEntityResource`] when given a class resource.
	async fn is_allowed_on_entity(
		&self,
		identity: SecurityIdentityId,
		action: Action,
		resource: &ResourceRef,
	) -> Result<bool>;

	/// True if `identity` holds `action` through a class-level grant on `class`.
	///
	/// Entity-level grants never satisfy this query.
	async fn is_allowed_on_entity_class(
		&self,
		identity: SecurityIdentityId,
		action: Action,
		class: &str,
	) -> Result<bool>;

	// Roles

	/// Persists a role and the authorizations it derives in one transaction.
	async fn insert_role_with_authorizations(
		&self,
		role: &Role,
		authorizations: &[Authorization],
	) -> Result<()>;
	async fn get_role(&self, id: RoleId) -> Result<Option<Role>>;
	async fn list_roles(&self, page: Page) -> Result<Vec<Role>>;

	/// Deletes a role and every authorization it owns. Returns false if the
	/// role did not exist.
	async fn delete_role(&self, id: RoleId) -> Result<bool>;
}

/// SQLite implementation of the authorization repository.
#[derive(Clone)]
pub struct SqliteAuthorizationRepository {
	pool: SqlitePool,
}

impl SqliteAuthorizationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

const SELECT_AUTHORIZATION: &str = r#"
	SELECT id, security_identity_id, role_id, resource_class, resource_id,
	       actions, cascadable, parent_id, created_at
	FROM acl_authorizations
"#;

#[async_trait]
impl AuthorizationRepository for SqliteAuthorizationRepository {
	#[instrument(skip(self, authorizations), fields(count = authorizations.len()))]
	async fn insert_bulk(&self, authorizations: &[Authorization]) -> Result<()> {
		if authorizations.is_empty() {
			return Ok(());
		}

		let mut tx = self.pool.begin().await?;
		insert_authorizations(&mut tx, authorizations).await?;
		tx.commit().await?;

		tracing::info!(count = authorizations.len(), "inserted authorizations");
		Ok(())
	}

	#[instrument(skip(self), fields(authorization_id = %id))]
	async fn remove_authorization(&self, id: AuthorizationId) -> Result<u64> {
		let removed = delete_subtrees(&self.pool, "id = ?", vec![Some(id.to_string())]).await?;
		tracing::info!(authorization_id = %id, removed, "removed authorization subtree");
		Ok(removed)
	}

	#[instrument(skip(self), fields(resource = %resource))]
	async fn remove_authorizations_for_resource(&self, resource: &ResourceRef) -> Result<u64> {
		let removed = delete_subtrees(
			&self.pool,
			"resource_class = ? AND resource_id IS ?",
			vec![
				Some(resource.class().to_string()),
				resource.id().map(str::to_string),
			],
		)
		.await?;

		if removed > 0 {
			tracing::info!(resource = %resource, removed, "removed authorizations for resource");
		} else {
			tracing::debug!(resource = %resource, "no authorizations for resource");
		}
		Ok(removed)
	}

	#[instrument(skip(self), fields(role_id = %role_id))]
	async fn remove_authorizations_for_role(&self, role_id: RoleId) -> Result<u64> {
		let removed =
			delete_subtrees(&self.pool, "role_id = ?", vec![Some(role_id.to_string())]).await?;
		tracing::info!(role_id = %role_id, removed, "removed authorizations for role");
		Ok(removed)
	}

	#[instrument(skip(self, authorizations), fields(count = authorizations.len()))]
	async fn replace_all_authorizations(&self, authorizations: &[Authorization]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let removed = sqlx::query("DELETE FROM acl_authorizations")
			.execute(&mut *tx)
			.await?
			.rows_affected();
		insert_authorizations(&mut tx, authorizations).await?;

		tx.commit().await?;
		tracing::info!(removed, inserted = authorizations.len(), "replaced all authorizations");
		Ok(())
	}

	#[instrument(skip(self), fields(authorization_id = %id))]
	async fn find_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>> {
		let sql = format!("{SELECT_AUTHORIZATION} WHERE id = ?");
		let row = sqlx::query_as::<_, AuthorizationRow>(&sql)
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(limit = page.limit, offset = page.offset))]
	async fn find_all(&self, page: Page) -> Result<Vec<Authorization>> {
		let sql = format!("{SELECT_AUTHORIZATION} ORDER BY rowid LIMIT ? OFFSET ?");
		let rows = sqlx::query_as::<_, AuthorizationRow>(&sql)
			.bind(page.limit)
			.bind(page.offset)
			.fetch_all(&self.pool)
			.await?;

		collect_rows(rows)
	}

	#[instrument(skip(self), fields(parent_id = %parent_id, limit = page.limit, offset = page.offset))]
	async fn find_children(
		&self,
		parent_id: AuthorizationId,
		page: Page,
	) -> Result<Vec<Authorization>> {
		let sql = format!("{SELECT_AUTHORIZATION} WHERE parent_id = ? ORDER BY rowid LIMIT ? OFFSET ?");
		let rows = sqlx::query_as::<_, AuthorizationRow>(&sql)
			.bind(parent_id.to_string())
			.bind(page.limit)
			.bind(page.offset)
			.fetch_all(&self.pool)
			.await?;

		collect_rows(rows)
	}

	#[instrument(skip(self), fields(role_id = %role_id, limit = page.limit, offset = page.offset))]
	async fn find_for_role(&self, role_id: RoleId, page: Page) -> Result<Vec<Authorization>> {
		let sql = format!("{SELECT_AUTHORIZATION} WHERE role_id = ? ORDER BY rowid LIMIT ? OFFSET ?");
		let rows = sqlx::query_as::<_, AuthorizationRow>(&sql)
			.bind(role_id.to_string())
			.bind(page.limit)
			.bind(page.offset)
			.fetch_all(&self.pool)
			.await?;

		collect_rows(rows)
	}

	#[instrument(skip(self))]
	async fn count_authorizations(&self) -> Result<u64> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM acl_authorizations")
			.fetch_one(&self.pool)
			.await?;
		Ok(count as u64)
	}

	#[instrument(skip(self), fields(resource = %resource))]
	async fn find_cascadable_authorizations_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<Authorization>> {
		let sql = format!(
			"{SELECT_AUTHORIZATION} WHERE resource_class = ? AND resource_id IS ? AND cascadable = 1 ORDER BY rowid"
		);
		let rows = sqlx::query_as::<_, AuthorizationRow>(&sql)
			.bind(resource.class())
			.bind(resource.id())
			.fetch_all(&self.pool)
			.await?;

		let authorizations = collect_rows(rows)?;
		tracing::debug!(resource = %resource, count = authorizations.len(), "found cascadable authorizations");
		Ok(authorizations)
	}

	#[instrument(skip(self), fields(identity = %identity, action = action.bit(), resource = %resource))]
	async fn is_allowed_on_entity(
		&self,
		identity: SecurityIdentityId,
		action: Action,
		resource: &ResourceRef,
	) -> Result<bool> {
		let entity_id = resource
			.id()
			.ok_or_else(|| AclError::ExpectedEntityResource(resource.clone()))?;

		let allowed: i64 = sqlx::query_scalar(
			r#"
			SELECT EXISTS (
				SELECT 1 FROM acl_authorizations
				WHERE security_identity_id = ?1
				  AND resource_class = ?2
				  AND (resource_id = ?3 OR resource_id IS NULL)
				  AND (actions & ?4) = ?4
			)
			"#,
		)
		.bind(identity.to_string())
		.bind(resource.class())
		.bind(entity_id)
		.bind(action_bits(action.into())?)
		.fetch_one(&self.pool)
		.await?;

		let allowed = allowed != 0;
		tracing::debug!(allowed, "entity access decision");
		Ok(allowed)
	}

	#[instrument(skip(self), fields(identity = %identity, action = action.bit(), class = %class))]
	async fn is_allowed_on_entity_class(
		&self,
		identity: SecurityIdentityId,
		action: Action,
		class: &str,
	) -> Result<bool> {
		let allowed: i64 = sqlx::query_scalar(
			r#"
			SELECT EXISTS (
				SELECT 1 FROM acl_authorizations
				WHERE security_identity_id = ?1
				  AND resource_class = ?2
				  AND resource_id IS NULL
				  AND (actions & ?3) = ?3
			)
			"#,
		)
		.bind(identity.to_string())
		.bind(class)
		.bind(action_bits(action.into())?)
		.fetch_one(&self.pool)
		.await?;

		let allowed = allowed != 0;
		tracing::debug!(allowed, "class access decision");
		Ok(allowed)
	}

	#[instrument(skip(self, role, authorizations), fields(role_id = %role.id, kind = %role.kind, count = authorizations.len()))]
	async fn insert_role_with_authorizations(
		&self,
		role: &Role,
		authorizations: &[Authorization],
	) -> Result<()> {
		let resources_json = serde_json::to_string(&role.resources)?;

		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO acl_roles (id, kind, security_identity_id, resources, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(role.id.to_string())
		.bind(&role.kind)
		.bind(role.security_identity.to_string())
		.bind(&resources_json)
		.bind(role.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;

		insert_authorizations(&mut tx, authorizations).await?;
		tx.commit().await?;

		tracing::info!(
			role_id = %role.id,
			kind = %role.kind,
			authorizations = authorizations.len(),
			"role granted"
		);
		Ok(())
	}

	#[instrument(skip(self), fields(role_id = %id))]
	async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
		let row = sqlx::query_as::<_, RoleRow>(
			r#"
			SELECT id, kind, security_identity_id, resources, created_at
			FROM acl_roles
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(limit = page.limit, offset = page.offset))]
	async fn list_roles(&self, page: Page) -> Result<Vec<Role>> {
		let rows = sqlx::query_as::<_, RoleRow>(
			r#"
			SELECT id, kind, security_identity_id, resources, created_at
			FROM acl_roles
			ORDER BY rowid
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(page.limit)
		.bind(page.offset)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(role_id = %id))]
	async fn delete_role(&self, id: RoleId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		let removed = delete_subtrees_in(&mut tx, "role_id = ?", &[Some(id.to_string())]).await?;

		let deleted = sqlx::query("DELETE FROM acl_roles WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?
			.rows_affected()
			> 0;

		tx.commit().await?;

		if deleted {
			tracing::info!(role_id = %id, authorizations = removed, "role revoked");
		}
		Ok(deleted)
	}
}

/// Inserts a batch on an open transaction, parents first.
///
/// Children whose parent is not part of the batch are checked against the
/// stored parent.
async fn insert_authorizations(
	conn: &mut SqliteConnection,
	authorizations: &[Authorization],
) -> Result<()> {
	let ordered = order_parents_first(authorizations)?;
	let in_batch: HashSet<AuthorizationId> = authorizations.iter().map(|a| a.id).collect();

	for authorization in ordered {
		if let Some(parent_id) = authorization.parent_id.filter(|id| !in_batch.contains(id)) {
			let sql = format!("{SELECT_AUTHORIZATION} WHERE id = ?");
			let parent: Authorization = sqlx::query_as::<_, AuthorizationRow>(&sql)
				.bind(parent_id.to_string())
				.fetch_optional(&mut *conn)
				.await?
				.ok_or_else(|| {
					AclError::InvariantViolation(format!(
						"parent {parent_id} of authorization {} does not exist",
						authorization.id
					))
				})?
				.try_into()?;
			authorization.check_against_parent(&parent)?;
		}

		sqlx::query(
			r#"
			INSERT INTO acl_authorizations (
				id, security_identity_id, role_id, resource_class, resource_id,
				actions, cascadable, parent_id, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(authorization.id.to_string())
		.bind(authorization.security_identity.to_string())
		.bind(authorization.role_id.map(|id| id.to_string()))
		.bind(authorization.resource.class())
		.bind(authorization.resource.id())
		.bind(action_bits(authorization.actions)?)
		.bind(authorization.cascadable)
		.bind(authorization.parent_id.map(|id| id.to_string()))
		.bind(authorization.created_at.to_rfc3339())
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

/// `DELETE` of every row matching `root_filter` plus all descendants.
///
/// SQLite removes the whole subtree within the one statement, so no row is
/// ever left pointing at a deleted parent.
/// Recursive CTE naming every authorization below the roots matching
/// `root_filter`, the roots included.
fn subtree_cte(root_filter: &str) -> String {
	format!(
		r#"
		WITH RECURSIVE subtree(id) AS (
			SELECT id FROM acl_authorizations WHERE {root_filter}
			UNION
			SELECT a.id FROM acl_authorizations a JOIN subtree s ON a.parent_id = s.id
		)
		"#
	)
}

async fn delete_subtrees(
	pool: &SqlitePool,
	root_filter: &str,
	binds: Vec<Option<String>>,
) -> Result<u64> {
	let mut tx = pool.begin().await?;
	let removed = delete_subtrees_in(&mut tx, root_filter, &binds).await?;
	tx.commit().await?;
	Ok(removed)
}

/// Deletes the matching subtrees on an open transaction and returns how many
/// rows went, descendants included.
///
/// SQLite reports only the rows named by the `DELETE` itself, so the subtree
/// is counted before it is removed.
async fn delete_subtrees_in(
	conn: &mut SqliteConnection,
	root_filter: &str,
	binds: &[Option<String>],
) -> Result<u64> {
	let cte = subtree_cte(root_filter);

	let count_sql = format!("{cte} SELECT COUNT(*) FROM subtree");
	let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
	for value in binds {
		count = count.bind(value.clone());
	}
	let removed = count.fetch_one(&mut *conn).await?;
	if removed == 0 {
		return Ok(0);
	}

	let delete_sql =
		format!("{cte} DELETE FROM acl_authorizations WHERE id IN (SELECT id FROM subtree)");
	let mut delete = sqlx::query(&delete_sql);
	for value in binds {
		delete = delete.bind(value.clone());
	}
	delete.execute(&mut *conn).await?;

	u64::try_from(removed)
		.map_err(|_| AclServerError::Internal(format!("negative subtree count {removed}")))
}

fn action_bits(actions: ActionSet) -> Result<i64> {
	i64::try_from(actions.bits())
		.map_err(|_| AclServerError::Internal(format!("action mask {actions} exceeds 63 bits")))
}

fn collect_rows(rows: Vec<AuthorizationRow>) -> Result<Vec<Authorization>> {
	rows.into_iter().map(TryInto::try_into).collect()
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| AclServerError::Internal(format!("Invalid {column}: {e}")))
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct AuthorizationRow {
	id: String,
	security_identity_id: String,
	role_id: Option<String>,
	resource_class: String,
	resource_id: Option<String>,
	actions: i64,
	cascadable: bool,
	parent_id: Option<String>,
	created_at: String,
}

impl TryFrom<AuthorizationRow> for Authorization {
	type Error = AclServerError;

	fn try_from(row: AuthorizationRow) -> Result<Self> {
		let actions = u64::try_from(row.actions)
			.map_err(|_| AclServerError::Internal(format!("Invalid actions mask {}", row.actions)))?;

		Ok(Authorization {
			id: row
				.id
				.parse()
				.map_err(|e| AclServerError::Internal(format!("Invalid authorization id UUID: {e}")))?,
			security_identity: row.security_identity_id.parse().map_err(|e| {
				AclServerError::Internal(format!("Invalid security_identity_id UUID: {e}"))
			})?,
			role_id: row
				.role_id
				.map(|s| {
					s.parse()
						.map_err(|e| AclServerError::Internal(format!("Invalid role_id UUID: {e}")))
				})
				.transpose()?,
			resource: match row.resource_id {
				Some(id) => ResourceRef::for_entity(row.resource_class, id),
				None => ResourceRef::for_class(row.resource_class),
			},
			actions: ActionSet::from_bits_unchecked(actions),
			cascadable: row.cascadable,
			parent_id: row
				.parent_id
				.map(|s| {
					s.parse()
						.map_err(|e| AclServerError::Internal(format!("Invalid parent_id UUID: {e}")))
				})
				.transpose()?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct RoleRow {
	id: String,
	kind: String,
	security_identity_id: String,
	resources: String,
	created_at: String,
}

impl TryFrom<RoleRow> for Role {
	type Error = AclServerError;

	fn try_from(row: RoleRow) -> Result<Self> {
		Ok(Role {
			id: row
				.id
				.parse()
				.map_err(|e| AclServerError::Internal(format!("Invalid role id UUID: {e}")))?,
			kind: row.kind,
			security_identity: row.security_identity_id.parse().map_err(|e| {
				AclServerError::Internal(format!("Invalid security_identity_id UUID: {e}"))
			})?,
			resources: serde_json::from_str(&row.resources)?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_repository;
	use loom_acl_core::standard::{CREATE, DELETE, EDIT, VIEW};

	fn article(id: &str) -> ResourceRef {
		ResourceRef::for_entity("article", id)
	}

	fn grant(
		identity: SecurityIdentityId,
		actions: ActionSet,
		resource: ResourceRef,
		cascadable: bool,
	) -> Authorization {
		Authorization::create_unowned(identity, actions, resource, cascadable)
	}

	#[tokio::test]
	async fn test_insert_bulk_round_trip() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW | EDIT, article("1"), true);
		let child = root.create_child(article("2"), Some(VIEW.into())).unwrap();
		let class = grant(user, CREATE.into(), ResourceRef::for_class("article"), false);

		repo
			.insert_bulk(&[root.clone(), child.clone(), class.clone()])
			.await
			.unwrap();

		assert_eq!(repo.find_by_id(root.id).await.unwrap(), Some(root.clone()));
		assert_eq!(repo.find_by_id(child.id).await.unwrap(), Some(child));
		assert_eq!(repo.find_by_id(class.id).await.unwrap(), Some(class));
		assert_eq!(repo.count_authorizations().await.unwrap(), 3);
		assert_eq!(repo.find_all(Page::default()).await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn test_insert_bulk_reorders_children_first_batch() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW | EDIT, article("1"), true);
		let child = root.create_child(article("2"), None).unwrap();
		let grandchild = child.create_child(article("3"), None).unwrap();

		repo
			.insert_bulk(&[grandchild.clone(), child.clone(), root.clone()])
			.await
			.unwrap();

		let children = repo.find_children(root.id, Page::default()).await.unwrap();
		assert_eq!(children, vec![child.clone()]);
		let grandchildren = repo.find_children(child.id, Page::default()).await.unwrap();
		assert_eq!(grandchildren, vec![grandchild]);
	}

	#[tokio::test]
	async fn test_failing_batch_leaves_nothing() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let existing = grant(user, VIEW.into(), article("1"), false);
		repo.insert_bulk(&[existing.clone()]).await.unwrap();

		let fresh = grant(user, EDIT.into(), article("2"), false);
		let mut clash = grant(user, DELETE.into(), article("3"), false);
		clash.id = existing.id;

		let err = repo.insert_bulk(&[fresh.clone(), clash]).await.unwrap_err();
		assert!(matches!(err, AclServerError::Persistence(_)));
		assert!(repo.find_by_id(fresh.id).await.unwrap().is_none());
		assert_eq!(repo.count_authorizations().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_widening_child_is_rejected() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW.into(), article("1"), true);
		let mut child = root.create_child(article("2"), None).unwrap();
		child.actions = VIEW | DELETE;

		let err = repo.insert_bulk(&[root, child]).await.unwrap_err();
		assert!(matches!(err.as_acl(), Some(AclError::InvariantViolation(_))));
		assert_eq!(repo.count_authorizations().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_child_of_stored_parent_is_checked() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW | EDIT, article("1"), true);
		repo.insert_bulk(&[root.clone()]).await.unwrap();

		let child = root.create_child(article("2"), Some(EDIT.into())).unwrap();
		repo.insert_bulk(&[child.clone()]).await.unwrap();

		let mut wide = root.create_child(article("3"), None).unwrap();
		wide.actions = VIEW | EDIT | DELETE;
		let err = repo.insert_bulk(&[wide]).await.unwrap_err();
		assert!(matches!(err.as_acl(), Some(AclError::InvariantViolation(_))));

		let orphan = grant(user, VIEW.into(), article("4"), false);
		let mut orphan_child = orphan.clone();
		orphan_child.id = AuthorizationId::generate();
		orphan_child.parent_id = Some(orphan.id);
		let err = repo.insert_bulk(&[orphan_child]).await.unwrap_err();
		assert!(matches!(err.as_acl(), Some(AclError::InvariantViolation(_))));
	}

	#[tokio::test]
	async fn test_find_cascadable_is_exact_and_filtered() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let cascading = grant(user, VIEW.into(), article("1"), true);
		let plain = grant(user, EDIT.into(), article("1"), false);
		let other = grant(user, VIEW.into(), article("2"), true);
		let class = grant(user, VIEW.into(), ResourceRef::for_class("article"), true);
		repo
			.insert_bulk(&[cascading.clone(), plain, other, class.clone()])
			.await
			.unwrap();

		let found = repo
			.find_cascadable_authorizations_for_resource(&article("1"))
			.await
			.unwrap();
		assert_eq!(found, vec![cascading]);

		let found = repo
			.find_cascadable_authorizations_for_resource(&ResourceRef::for_class("article"))
			.await
			.unwrap();
		assert_eq!(found, vec![class]);
	}

	#[tokio::test]
	async fn test_entity_and_class_resolution() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let other = SecurityIdentityId::generate();
		repo
			.insert_bulk(&[
				grant(user, VIEW | EDIT, article("1"), false),
				grant(user, CREATE.into(), ResourceRef::for_class("article"), false),
			])
			.await
			.unwrap();

		assert!(repo.is_allowed_on_entity(user, EDIT, &article("1")).await.unwrap());
		assert!(!repo.is_allowed_on_entity(user, DELETE, &article("1")).await.unwrap());
		assert!(!repo.is_allowed_on_entity(user, VIEW, &article("2")).await.unwrap());
		// Class grants cover every entity of the class.
		assert!(repo.is_allowed_on_entity(user, CREATE, &article("2")).await.unwrap());
		assert!(!repo.is_allowed_on_entity(other, EDIT, &article("1")).await.unwrap());

		// Entity grants never satisfy a class query.
		assert!(!repo.is_allowed_on_entity_class(user, EDIT, "article").await.unwrap());
		assert!(repo.is_allowed_on_entity_class(user, CREATE, "article").await.unwrap());
		assert!(!repo.is_allowed_on_entity_class(user, CREATE, "comment").await.unwrap());

		let err = repo
			.is_allowed_on_entity(user, VIEW, &ResourceRef::for_class("article"))
			.await
			.unwrap_err();
		assert!(matches!(err.as_acl(), Some(AclError::ExpectedEntityResource(_))));
	}

	#[tokio::test]
	async fn test_entity_and_class_grants_combine_on_one_entity() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		repo
			.insert_bulk(&[
				grant(user, VIEW.into(), ResourceRef::for_class("article"), false),
				grant(user, EDIT.into(), article("1"), false),
			])
			.await
			.unwrap();

		assert!(repo.is_allowed_on_entity(user, VIEW, &article("1")).await.unwrap());
		assert!(repo.is_allowed_on_entity(user, EDIT, &article("1")).await.unwrap());
		assert!(!repo.is_allowed_on_entity(user, DELETE, &article("1")).await.unwrap());
		assert!(!repo.is_allowed_on_entity(user, EDIT, &article("2")).await.unwrap());

		assert!(repo.is_allowed_on_entity_class(user, VIEW, "article").await.unwrap());
		assert!(!repo.is_allowed_on_entity_class(user, EDIT, "article").await.unwrap());
	}

	#[tokio::test]
	async fn test_remove_for_resource_is_isolated() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW.into(), article("1"), true);
		let child = root.create_child(article("2"), None).unwrap();
		let sibling = root.create_child(article("3"), None).unwrap();
		let grandchild = child.create_child(article("4"), None).unwrap();
		let class = grant(user, VIEW.into(), ResourceRef::for_class("article"), false);
		repo
			.insert_bulk(&[
				root.clone(),
				child.clone(),
				sibling.clone(),
				grandchild.clone(),
				class.clone(),
			])
			.await
			.unwrap();

		let removed = repo
			.remove_authorizations_for_resource(&article("2"))
			.await
			.unwrap();
		assert_eq!(removed, 2);
		assert!(repo.find_by_id(child.id).await.unwrap().is_none());
		assert!(repo.find_by_id(grandchild.id).await.unwrap().is_none());
		assert!(repo.find_by_id(root.id).await.unwrap().is_some());
		assert!(repo.find_by_id(sibling.id).await.unwrap().is_some());
		assert!(repo.find_by_id(class.id).await.unwrap().is_some());

		assert_eq!(
			repo
				.remove_authorizations_for_resource(&article("2"))
				.await
				.unwrap(),
			0
		);
	}

	#[tokio::test]
	async fn test_remove_class_resource_keeps_entities() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let entity = grant(user, VIEW.into(), article("1"), false);
		let class = grant(user, VIEW.into(), ResourceRef::for_class("article"), false);
		repo.insert_bulk(&[entity.clone(), class]).await.unwrap();

		let removed = repo
			.remove_authorizations_for_resource(&ResourceRef::for_class("article"))
			.await
			.unwrap();
		assert_eq!(removed, 1);
		assert!(repo.find_by_id(entity.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_remove_authorization_removes_subtree_only() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW.into(), article("1"), true);
		let child = root.create_child(article("2"), None).unwrap();
		let grandchild = child.create_child(article("3"), None).unwrap();
		repo
			.insert_bulk(&[root.clone(), child.clone(), grandchild])
			.await
			.unwrap();

		assert_eq!(repo.remove_authorization(child.id).await.unwrap(), 2);
		assert_eq!(repo.count_authorizations().await.unwrap(), 1);
		assert!(repo.find_by_id(root.id).await.unwrap().is_some());
		assert!(repo
			.find_children(root.id, Page::default())
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_remove_counts_every_descendant() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW.into(), article("1"), true);
		let child = root.create_child(article("2"), None).unwrap();
		let grandchild = child.create_child(article("3"), None).unwrap();
		let great_grandchild = grandchild.create_child(article("4"), None).unwrap();
		repo
			.insert_bulk(&[root.clone(), child.clone(), grandchild, great_grandchild])
			.await
			.unwrap();

		assert_eq!(repo.remove_authorization(child.id).await.unwrap(), 3);
		assert_eq!(repo.count_authorizations().await.unwrap(), 1);
		assert_eq!(repo.remove_authorization(child.id).await.unwrap(), 0);
		assert_eq!(repo.remove_authorizations_for_resource(&article("1")).await.unwrap(), 1);
		assert_eq!(repo.count_authorizations().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_find_children_pages() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let root = grant(user, VIEW.into(), article("root"), true);
		let mut batch = vec![root.clone()];
		for i in 0..5 {
			batch.push(root.create_child(article(&i.to_string()), None).unwrap());
		}
		repo.insert_bulk(&batch).await.unwrap();

		let first = repo.find_children(root.id, Page::first(2)).await.unwrap();
		let second = repo
			.find_children(root.id, Page::first(2).next())
			.await
			.unwrap();
		let third = repo
			.find_children(root.id, Page::first(2).next().next())
			.await
			.unwrap();

		assert_eq!(first, batch[1..3].to_vec());
		assert_eq!(second, batch[3..5].to_vec());
		assert_eq!(third, batch[5..].to_vec());
	}

	#[tokio::test]
	async fn test_role_lifecycle() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let role = Role::new("articleEditor", user, vec![article("1")]);
		let root = Authorization::create(&role, VIEW | EDIT, article("1"), true);
		let child = root.create_child(article("2"), None).unwrap();
		let unowned = grant(user, VIEW.into(), article("9"), false);

		repo
			.insert_role_with_authorizations(&role, &[root.clone(), child.clone()])
			.await
			.unwrap();
		repo.insert_bulk(&[unowned.clone()]).await.unwrap();

		assert_eq!(repo.get_role(role.id).await.unwrap(), Some(role.clone()));
		assert_eq!(repo.list_roles(Page::default()).await.unwrap(), vec![role.clone()]);
		assert_eq!(
			repo.find_for_role(role.id, Page::default()).await.unwrap(),
			vec![root, child]
		);

		assert!(repo.delete_role(role.id).await.unwrap());
		assert!(repo.get_role(role.id).await.unwrap().is_none());
		assert_eq!(repo.count_authorizations().await.unwrap(), 1);
		assert!(repo.find_by_id(unowned.id).await.unwrap().is_some());
		assert!(!repo.delete_role(role.id).await.unwrap());
	}

	#[tokio::test]
	async fn test_role_insert_is_atomic() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let role = Role::new("articleEditor", user, vec![article("1")]);
		let root = Authorization::create(&role, VIEW.into(), article("1"), false);
		let bad_child = Authorization {
			id: AuthorizationId::generate(),
			parent_id: Some(root.id),
			..root.clone()
		};

		assert!(repo
			.insert_role_with_authorizations(&role, &[root, bad_child])
			.await
			.is_err());
		assert!(repo.get_role(role.id).await.unwrap().is_none());
		assert_eq!(repo.count_authorizations().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_remove_for_role_and_replace_all() {
		let repo = create_test_repository().await;
		let user = SecurityIdentityId::generate();
		let role = Role::new("articleEditor", user, vec![article("1")]);
		let owned = Authorization::create(&role, VIEW.into(), article("1"), false);
		let unowned = grant(user, EDIT.into(), article("2"), false);
		repo
			.insert_role_with_authorizations(&role, &[owned.clone()])
			.await
			.unwrap();
		repo.insert_bulk(&[unowned.clone()]).await.unwrap();

		assert_eq!(repo.remove_authorizations_for_role(role.id).await.unwrap(), 1);
		assert!(repo.get_role(role.id).await.unwrap().is_some());

		let replacement = Authorization::create(&role, VIEW | EDIT, article("3"), false);
		repo
			.replace_all_authorizations(&[replacement.clone()])
			.await
			.unwrap();
		assert_eq!(
			repo.find_all(Page::default()).await.unwrap(),
			vec![replacement]
		);
	}
}
