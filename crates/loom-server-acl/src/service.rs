// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACL orchestration.
//!
//! [`AclService`] ties the role registry, cascade engine and repository
//! together. Derivation and cascade expansion always finish before anything
//! is written, so a cycle or an invalid role leaves storage untouched.

use loom_acl_core::{
	Action, ActionRegistry, Authorization, CascadeEngine, ResourceHierarchy, ResourceRef, Role,
	RoleId, SecurityIdentity,
};
use tracing::instrument;

use crate::error::Result;
use crate::repository::{AuthorizationRepository, Page};
use crate::setup::AclSetup;

/// Grants, revokes and resolves access on top of an [`AuthorizationRepository`].
pub struct AclService<R, H> {
	repository: R,
	hierarchy: H,
	setup: AclSetup,
}

impl<R, H> AclService<R, H>
where
	R: AuthorizationRepository,
	H: ResourceHierarchy,
{
	pub fn new(repository: R, hierarchy: H, setup: AclSetup) -> Self {
		Self {
			repository,
			hierarchy,
			setup,
		}
	}

	pub fn repository(&self) -> &R {
		&self.repository
	}

	pub fn hierarchy(&self) -> &H {
		&self.hierarchy
	}

	pub fn actions(&self) -> &ActionRegistry {
		&self.setup.actions
	}

	pub fn setup(&self) -> &AclSetup {
		&self.setup
	}

	fn engine(&self) -> CascadeEngine<'_, H> {
		CascadeEngine::new(&self.hierarchy, self.setup.cascade)
	}

	/// Derives and cascades the role's authorizations, then persists the role
	/// and the full tree in one transaction. Returns what was stored.
	#[instrument(skip(self, role), fields(role_id = %role.id, kind = %role.kind))]
	pub async fn grant_role(&self, role: &Role) -> Result<Vec<Authorization>> {
		let roots = self.setup.roles.create_authorizations(role)?;
		let tree = self.engine().expand_all(roots)?;

		self.repository
			.insert_role_with_authorizations(role, &tree)
			.await?;

		tracing::info!(role_id = %role.id, authorizations = tree.len(), "granted role");
		Ok(tree)
	}

	/// Removes a role with every authorization it owns. Returns false if the
	/// role was not stored.
	#[instrument(skip(self), fields(role_id = %role_id))]
	pub async fn revoke_role(&self, role_id: RoleId) -> Result<bool> {
		self.repository.delete_role(role_id).await
	}

	/// Resolves access on an entity (entity or class grants) or on a class
	/// (class grants only).
	#[instrument(skip(self, identity), fields(action = action.bit(), resource = %resource))]
	pub async fn is_allowed<I>(
		&self,
		identity: &I,
		action: Action,
		resource: &ResourceRef,
	) -> Result<bool>
	where
		I: SecurityIdentity + ?Sized,
	{
		let identity = identity.security_identity_id();
		match resource {
			ResourceRef::Entity { .. } => {
				self.repository
					.is_allowed_on_entity(identity, action, resource)
					.await
			}
			ResourceRef::Class { class } => {
				self.repository
					.is_allowed_on_entity_class(identity, action, class)
					.await
			}
		}
	}

	/// [`AclService::is_allowed`] with the action looked up by name.
	pub async fn is_allowed_by_name<I>(
		&self,
		identity: &I,
		action: &str,
		resource: &ResourceRef,
	) -> Result<bool>
	where
		I: SecurityIdentity + ?Sized,
	{
		let action = self.setup.actions.action(action)?;
		self.is_allowed(identity, action, resource).await
	}

	/// Gives a newly created resource the authorizations it inherits from
	/// cascadable grants on its parents. Returns what was stored.
	#[instrument(skip(self), fields(resource = %resource))]
	pub async fn process_new_resource(&self, resource: &ResourceRef) -> Result<Vec<Authorization>> {
		let mut inherited = Vec::new();
		for parent in self.hierarchy.parent_resources(resource) {
			inherited.extend(
				self.repository
					.find_cascadable_authorizations_for_resource(&parent)
					.await?,
			);
		}

		if inherited.is_empty() {
			tracing::debug!(resource = %resource, "nothing to inherit");
			return Ok(Vec::new());
		}

		let derived = self.engine().inherit(resource, &inherited)?;
		self.repository.insert_bulk(&derived).await?;

		tracing::info!(resource = %resource, authorizations = derived.len(), "inherited authorizations");
		Ok(derived)
	}

	/// Removes every authorization on a deleted resource, with subtrees.
	#[instrument(skip(self), fields(resource = %resource))]
	pub async fn process_deleted_resource(&self, resource: &ResourceRef) -> Result<u64> {
		self.repository
			.remove_authorizations_for_resource(resource)
			.await
	}

	/// Re-derives every stored role and replaces all authorizations in one
	/// transaction. Returns the number of authorizations stored.
	///
	/// Authorizations not owned by any role are dropped.
	#[instrument(skip(self))]
	pub async fn rebuild_authorizations(&self) -> Result<usize> {
		let engine = self.engine();
		let mut authorizations = Vec::new();
		let mut roles = 0usize;
		let mut page = Page::default();

		loop {
			let batch = self.repository.list_roles(page).await?;
			for role in &batch {
				let roots = self.setup.roles.create_authorizations(role)?;
				authorizations.extend(engine.expand_all(roots)?);
			}
			roles += batch.len();
			if batch.len() < page.limit as usize {
				break;
			}
			page = page.next();
		}

		self.repository
			.replace_all_authorizations(&authorizations)
			.await?;

		tracing::info!(roles, authorizations = authorizations.len(), "rebuilt authorizations");
		Ok(authorizations.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::AclServerError;
	use crate::repository::SqliteAuthorizationRepository;
	use crate::testing::create_test_repository;
	use loom_acl_core::{
		standard, AclError, ActionSet, CascadeTarget, GrantTarget, GrantTemplate, RoleDefinition,
		SecurityIdentityId, StaticHierarchy,
	};

	fn folder(id: &str) -> ResourceRef {
		ResourceRef::for_entity("folder", id)
	}

	fn file(id: &str) -> ResourceRef {
		ResourceRef::for_entity("file", id)
	}

	fn setup() -> AclSetup {
		let mut setup = AclSetup::default();
		setup
			.register_role(RoleDefinition::new(
				"folderOwner",
				vec![GrantTemplate::new(
					ActionSet::all(&ActionRegistry::standard()),
					true,
					GrantTarget::EachBoundResource,
				)],
			))
			.register_role(RoleDefinition::new(
				"fileViewer",
				vec![GrantTemplate::new(
					standard::VIEW.into(),
					false,
					GrantTarget::Class("file".to_string()),
				)],
			));
		setup
	}

	async fn service(
		hierarchy: StaticHierarchy,
	) -> AclService<SqliteAuthorizationRepository, StaticHierarchy> {
		AclService::new(create_test_repository().await, hierarchy, setup())
	}

	#[tokio::test]
	async fn test_grant_role_persists_cascade_tree() {
		let hierarchy = StaticHierarchy::new()
			.with_child(folder("1"), file("a"))
			.with_target(
				folder("1"),
				CascadeTarget::new(file("b")).with_override(standard::VIEW.into()),
			);
		let service = service(hierarchy).await;
		let user = SecurityIdentityId::generate();

		let role = Role::new("folderOwner", user, vec![folder("1")]);
		let tree = service.grant_role(&role).await.unwrap();
		assert_eq!(tree.len(), 3);

		assert!(service.is_allowed(&user, standard::EDIT, &file("a")).await.unwrap());
		assert!(service.is_allowed(&user, standard::VIEW, &file("b")).await.unwrap());
		assert!(!service.is_allowed(&user, standard::EDIT, &file("b")).await.unwrap());
		assert!(!service.is_allowed(&user, standard::VIEW, &file("c")).await.unwrap());

		let stored = service.repository().get_role(role.id).await.unwrap();
		assert_eq!(stored.map(|r| r.kind).as_deref(), Some("folderOwner"));
	}

	#[tokio::test]
	async fn test_class_grant_resolves_for_entities_and_class() {
		let service = service(StaticHierarchy::new()).await;
		let user = SecurityIdentityId::generate();

		service
			.grant_role(&Role::new("fileViewer", user, vec![]))
			.await
			.unwrap();

		assert!(service.is_allowed(&user, standard::VIEW, &file("x")).await.unwrap());
		assert!(service
			.is_allowed(&user, standard::VIEW, &ResourceRef::for_class("file"))
			.await
			.unwrap());
		assert!(!service
			.is_allowed(&user, standard::VIEW, &ResourceRef::for_class("folder"))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_is_allowed_by_name_rejects_unknown_action() {
		let service = service(StaticHierarchy::new()).await;
		let user = SecurityIdentityId::generate();

		let err = service
			.is_allowed_by_name(&user, "publish", &file("a"))
			.await
			.unwrap_err();
		assert!(matches!(err, AclServerError::Acl(AclError::UnknownAction(_))));
		assert!(!service
			.is_allowed_by_name(&user, "view", &file("a"))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_unknown_role_kind_writes_nothing() {
		let service = service(StaticHierarchy::new()).await;
		let role = Role::new("stranger", SecurityIdentityId::generate(), vec![folder("1")]);

		let err = service.grant_role(&role).await.unwrap_err();
		assert!(matches!(err, AclServerError::Acl(AclError::UnknownRoleKind(_))));
		assert!(service.repository().get_role(role.id).await.unwrap().is_none());
		assert_eq!(service.repository().count_authorizations().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_revoke_role_removes_its_tree() {
		let hierarchy = StaticHierarchy::new().with_child(folder("1"), file("a"));
		let service = service(hierarchy).await;
		let user = SecurityIdentityId::generate();

		let role = Role::new("folderOwner", user, vec![folder("1")]);
		service.grant_role(&role).await.unwrap();

		assert!(service.revoke_role(role.id).await.unwrap());
		assert!(!service.revoke_role(role.id).await.unwrap());
		assert_eq!(service.repository().count_authorizations().await.unwrap(), 0);
		assert!(!service.is_allowed(&user, standard::VIEW, &file("a")).await.unwrap());
	}

	#[tokio::test]
	async fn test_process_deleted_resource_keeps_parent() {
		let hierarchy = StaticHierarchy::new().with_child(folder("1"), file("a"));
		let service = service(hierarchy).await;
		let user = SecurityIdentityId::generate();
		service
			.grant_role(&Role::new("folderOwner", user, vec![folder("1")]))
			.await
			.unwrap();

		assert_eq!(service.process_deleted_resource(&file("a")).await.unwrap(), 1);
		assert_eq!(service.process_deleted_resource(&file("a")).await.unwrap(), 0);
		assert!(service.is_allowed(&user, standard::EDIT, &folder("1")).await.unwrap());
		assert!(!service.is_allowed(&user, standard::VIEW, &file("a")).await.unwrap());
	}
}
