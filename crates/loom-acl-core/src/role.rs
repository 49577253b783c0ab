// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles and role-to-authorization derivation.
//!
//! A [`Role`] binds a security identity to zero or more resources under a role
//! kind. What the role actually grants is decided by the [`RoleBehavior`]
//! registered for that kind in a [`RoleRegistry`]. The registry is built
//! explicitly at startup; there is no lookup by type name.
//!
//! # Example
//!
//! ```
//! use loom_acl_core::{
//!     ActionRegistry, ActionSet, GrantTarget, GrantTemplate, ResourceRef, Role, RoleDefinition,
//!     RoleRegistry, SecurityIdentityId,
//! };
//!
//! let actions = ActionRegistry::standard();
//! let mut roles = RoleRegistry::new();
//! roles.register(RoleDefinition::new(
//!     "fileOwner",
//!     vec![GrantTemplate::new(ActionSet::all(&actions), true, GrantTarget::EachBoundResource)],
//! ));
//!
//! let role = Role::new(
//!     "fileOwner",
//!     SecurityIdentityId::generate(),
//!     vec![ResourceRef::for_entity("file", "1")],
//! );
//! let authorizations = roles.create_authorizations(&role).unwrap();
//! assert_eq!(authorizations.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::ActionSet;
use crate::authorization::Authorization;
use crate::error::{AclError, Result};
use crate::resource::ResourceRef;
use crate::types::{RoleId, SecurityIdentityId};

/// A role granted to a security identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	/// Key into the [`RoleRegistry`].
	pub kind: String,
	pub security_identity: SecurityIdentityId,
	/// Resources the role governs; meaning depends on the kind.
	pub resources: Vec<ResourceRef>,
	pub created_at: DateTime<Utc>,
}

impl Role {
	pub fn new(
		kind: impl Into<String>,
		security_identity: SecurityIdentityId,
		resources: Vec<ResourceRef>,
	) -> Self {
		Self {
			id: RoleId::generate(),
			kind: kind.into(),
			security_identity,
			resources,
			created_at: Utc::now(),
		}
	}
}

/// Derives the authorizations a role implies.
///
/// Implementations must return the same grants on every call for the same
/// role (fresh, unpersisted values each time), and must fail with
/// [`AclError::InvalidRoleState`] rather than return an empty list when the
/// role's bindings do not make sense.
pub trait RoleBehavior: Send + Sync + fmt::Debug {
	/// The role kind this behavior is registered under.
	fn kind(&self) -> &str;

	fn create_authorizations(&self, role: &Role) -> Result<Vec<Authorization>>;
}

/// Which resource a [`GrantTemplate`] applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantTarget {
	/// One grant per resource bound to the role; at least one is required.
	EachBoundResource,
	/// One class-level grant, independent of bound resources.
	Class(String),
}

/// One grant a [`RoleDefinition`] produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantTemplate {
	pub actions: ActionSet,
	pub cascadable: bool,
	pub target: GrantTarget,
}

impl GrantTemplate {
	pub fn new(actions: ActionSet, cascadable: bool, target: GrantTarget) -> Self {
		Self {
			actions,
			cascadable,
			target,
		}
	}
}

/// A role kind described as data: a fixed list of grant templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
	kind: String,
	grants: Vec<GrantTemplate>,
}

impl RoleDefinition {
	pub fn new(kind: impl Into<String>, grants: Vec<GrantTemplate>) -> Self {
		Self {
			kind: kind.into(),
			grants,
		}
	}

	pub fn grants(&self) -> &[GrantTemplate] {
		&self.grants
	}
}

impl RoleBehavior for RoleDefinition {
	fn kind(&self) -> &str {
		&self.kind
	}

	fn create_authorizations(&self, role: &Role) -> Result<Vec<Authorization>> {
		if role.kind != self.kind {
			return Err(AclError::InvalidRoleState(format!(
				"role {} has kind {}, expected {}",
				role.id, role.kind, self.kind
			)));
		}
		if self.grants.is_empty() {
			return Err(AclError::InvalidRoleState(format!(
				"role kind {} defines no grants",
				self.kind
			)));
		}

		let mut authorizations = Vec::new();
		for grant in &self.grants {
			match &grant.target {
				GrantTarget::EachBoundResource => {
					if role.resources.is_empty() {
						return Err(AclError::InvalidRoleState(format!(
							"role {} of kind {} has no bound resource",
							role.id, role.kind
						)));
					}
					for resource in &role.resources {
						authorizations.push(Authorization::create(
							role,
							grant.actions,
							resource.clone(),
							grant.cascadable,
						));
					}
				}
				GrantTarget::Class(class) => {
					authorizations.push(Authorization::create(
						role,
						grant.actions,
						ResourceRef::for_class(class.clone()),
						grant.cascadable,
					));
				}
			}
		}
		Ok(authorizations)
	}
}

/// Recognized role kinds.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
	behaviors: HashMap<String, Arc<dyn RoleBehavior>>,
}

impl RoleRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a behavior under its kind, replacing any previous one.
	pub fn register<B: RoleBehavior + 'static>(&mut self, behavior: B) {
		self.register_arc(Arc::new(behavior));
	}

	pub fn register_arc(&mut self, behavior: Arc<dyn RoleBehavior>) {
		let kind = behavior.kind().to_string();
		if self.behaviors.insert(kind.clone(), behavior).is_some() {
			tracing::warn!(kind = %kind, "role kind registered twice, replacing");
		}
	}

	pub fn get(&self, kind: &str) -> Option<&Arc<dyn RoleBehavior>> {
		self.behaviors.get(kind)
	}

	pub fn contains(&self, kind: &str) -> bool {
		self.behaviors.contains_key(kind)
	}

	pub fn kinds(&self) -> impl Iterator<Item = &str> {
		self.behaviors.keys().map(String::as_str)
	}

	/// Derives the authorizations for `role` using the behavior of its kind.
	///
	/// # Errors
	/// [`AclError::UnknownRoleKind`] if the kind is not registered, or whatever
	/// the behavior reports.
	pub fn create_authorizations(&self, role: &Role) -> Result<Vec<Authorization>> {
		let behavior = self
			.get(&role.kind)
			.ok_or_else(|| AclError::UnknownRoleKind(role.kind.clone()))?;
		let authorizations = behavior.create_authorizations(role)?;
		tracing::debug!(
			role_id = %role.id,
			kind = %role.kind,
			count = authorizations.len(),
			"derived role authorizations"
		);
		Ok(authorizations)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::action::standard::{EDIT, VIEW};
	use crate::action::ActionRegistry;

	fn owner_definition() -> RoleDefinition {
		RoleDefinition::new(
			"fileOwner",
			vec![GrantTemplate::new(
				ActionSet::all(&ActionRegistry::standard()),
				true,
				GrantTarget::EachBoundResource,
			)],
		)
	}

	fn registry() -> RoleRegistry {
		let mut registry = RoleRegistry::new();
		registry.register(owner_definition());
		registry.register(RoleDefinition::new(
			"allFilesViewer",
			vec![GrantTemplate::new(
				VIEW.into(),
				false,
				GrantTarget::Class("file".to_string()),
			)],
		));
		registry
	}

	#[test]
	fn owner_gets_all_actions_cascadable() {
		let role = Role::new(
			"fileOwner",
			SecurityIdentityId::generate(),
			vec![ResourceRef::for_entity("file", "1")],
		);
		let auths = registry().create_authorizations(&role).unwrap();
		assert_eq!(auths.len(), 1);
		assert_eq!(auths[0].resource, ResourceRef::for_entity("file", "1"));
		assert_eq!(auths[0].actions, ActionSet::all(&ActionRegistry::standard()));
		assert!(auths[0].cascadable);
		assert_eq!(auths[0].role_id, Some(role.id));
	}

	#[test]
	fn each_bound_resource_gets_a_grant() {
		let role = Role::new(
			"fileOwner",
			SecurityIdentityId::generate(),
			vec![
				ResourceRef::for_entity("file", "1"),
				ResourceRef::for_entity("file", "2"),
			],
		);
		let auths = registry().create_authorizations(&role).unwrap();
		assert_eq!(auths.len(), 2);
	}

	#[test]
	fn class_grant_ignores_bindings() {
		let role = Role::new("allFilesViewer", SecurityIdentityId::generate(), vec![]);
		let auths = registry().create_authorizations(&role).unwrap();
		assert_eq!(auths.len(), 1);
		assert_eq!(auths[0].resource, ResourceRef::for_class("file"));
		assert!(!auths[0].cascadable);
	}

	#[test]
	fn missing_resource_is_invalid_role_state() {
		let role = Role::new("fileOwner", SecurityIdentityId::generate(), vec![]);
		assert!(matches!(
			registry().create_authorizations(&role),
			Err(AclError::InvalidRoleState(_))
		));
	}

	#[test]
	fn unknown_kind_is_reported() {
		let role = Role::new("nobody", SecurityIdentityId::generate(), vec![]);
		assert_eq!(
			registry().create_authorizations(&role).unwrap_err(),
			AclError::UnknownRoleKind("nobody".to_string())
		);
	}

	#[test]
	fn derivation_is_idempotent_in_output() {
		let role = Role::new(
			"fileOwner",
			SecurityIdentityId::generate(),
			vec![ResourceRef::for_entity("file", "1")],
		);
		let registry = registry();
		let first = registry.create_authorizations(&role).unwrap();
		let second = registry.create_authorizations(&role).unwrap();
		assert_eq!(first.len(), second.len());
		for (a, b) in first.iter().zip(&second) {
			assert_ne!(a.id, b.id);
			assert!(a.same_grant(b));
		}
	}

	#[derive(Debug)]
	struct EditorRole;

	impl RoleBehavior for EditorRole {
		fn kind(&self) -> &str {
			"articleEditor"
		}

		fn create_authorizations(&self, role: &Role) -> Result<Vec<Authorization>> {
			let article = role
				.resources
				.iter()
				.find(|r| r.is_entity() && r.class() == "article")
				.ok_or_else(|| AclError::InvalidRoleState("no article bound".to_string()))?;
			Ok(vec![Authorization::create(
				role,
				VIEW | EDIT,
				article.clone(),
				false,
			)])
		}
	}

	#[test]
	fn custom_behavior_can_be_registered() {
		let mut registry = RoleRegistry::new();
		registry.register(EditorRole);
		assert!(registry.contains("articleEditor"));

		let role = Role::new(
			"articleEditor",
			SecurityIdentityId::generate(),
			vec![ResourceRef::for_entity("article", "5")],
		);
		let auths = registry.create_authorizations(&role).unwrap();
		assert_eq!(auths[0].actions, VIEW | EDIT);

		let broken = Role::new("articleEditor", SecurityIdentityId::generate(), vec![]);
		assert!(matches!(
			registry.create_authorizations(&broken),
			Err(AclError::InvalidRoleState(_))
		));
	}
}
