// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization records.
//!
//! An [`Authorization`] grants an [`ActionSet`] on a [`ResourceRef`] to a
//! security identity. Authorizations derived through cascade point at their
//! parent by id; children are never stored on the parent and are found by
//! querying for `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::action::ActionSet;
use crate::error::{AclError, Result};
use crate::resource::ResourceRef;
use crate::role::Role;
use crate::types::{AuthorizationId, RoleId, SecurityIdentityId};

/// A grant of actions on a resource to a security identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
	pub id: AuthorizationId,
	pub security_identity: SecurityIdentityId,
	/// `None` once the owning role is gone, or for grants made outside a role.
	pub role_id: Option<RoleId>,
	pub resource: ResourceRef,
	pub actions: ActionSet,
	pub cascadable: bool,
	pub parent_id: Option<AuthorizationId>,
	pub created_at: DateTime<Utc>,
}

impl Authorization {
	/// Creates an unpersisted root authorization owned by `role`.
	pub fn create(role: &Role, actions: ActionSet, resource: ResourceRef, cascadable: bool) -> Self {
		Self {
			id: AuthorizationId::generate(),
			security_identity: role.security_identity,
			role_id: Some(role.id),
			resource,
			actions,
			cascadable,
			parent_id: None,
			created_at: Utc::now(),
		}
	}

	/// Creates an unpersisted root authorization that no role owns.
	pub fn create_unowned(
		security_identity: SecurityIdentityId,
		actions: ActionSet,
		resource: ResourceRef,
		cascadable: bool,
	) -> Self {
		Self {
			id: AuthorizationId::generate(),
			security_identity,
			role_id: None,
			resource,
			actions,
			cascadable,
			parent_id: None,
			created_at: Utc::now(),
		}
	}

	/// Derives a cascade child on `resource`.
	///
	/// The child keeps the identity, role and cascadable flag, and its actions
	/// are this authorization's actions narrowed by `action_override`.
	///
	/// # Errors
	/// [`AclError::InvariantViolation`] if this authorization is not cascadable.
	pub fn create_child(
		&self,
		resource: ResourceRef,
		action_override: Option<ActionSet>,
	) -> Result<Self> {
		if !self.cascadable {
			return Err(AclError::InvariantViolation(format!(
				"authorization {} is not cascadable",
				self.id
			)));
		}

		let actions = match action_override {
			Some(local) => self.actions & local,
			None => self.actions,
		};

		Ok(Self {
			id: AuthorizationId::generate(),
			security_identity: self.security_identity,
			role_id: self.role_id,
			resource,
			actions,
			cascadable: self.cascadable,
			parent_id: Some(self.id),
			created_at: Utc::now(),
		})
	}

	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	/// True if both grant the same thing, ignoring ids, linkage and timestamps.
	pub fn same_grant(&self, other: &Authorization) -> bool {
		self.security_identity == other.security_identity
			&& self.role_id == other.role_id
			&& self.resource == other.resource
			&& self.actions == other.actions
			&& self.cascadable == other.cascadable
	}

	/// Checks the parent/child invariants against the parent record.
	pub fn check_against_parent(&self, parent: &Authorization) -> Result<()> {
		if self.parent_id != Some(parent.id) {
			return Err(AclError::InvariantViolation(format!(
				"authorization {} is not a child of {}",
				self.id, parent.id
			)));
		}
		if !parent.cascadable {
			return Err(AclError::InvariantViolation(format!(
				"authorization {} has a child but is not cascadable",
				parent.id
			)));
		}
		if !self.actions.is_subset_of(parent.actions) {
			return Err(AclError::InvariantViolation(format!(
				"authorization {} grants {} which is not a subset of parent {} ({})",
				self.id, self.actions, parent.id, parent.actions
			)));
		}
		Ok(())
	}
}

/// Orders a batch so every parent precedes its children.
///
/// Relative order is otherwise preserved. Parents that are not part of the
/// batch are assumed to exist already. Each child present in the batch is
/// checked against its in-batch parent.
///
/// # Errors
/// [`AclError::InvariantViolation`] on duplicate ids, a parent cycle inside
/// the batch, or a child violating the parent invariants.
pub fn order_parents_first(batch: &[Authorization]) -> Result<Vec<&Authorization>> {
	let mut by_id: HashMap<AuthorizationId, &Authorization> = HashMap::with_capacity(batch.len());
	for authorization in batch {
		if by_id.insert(authorization.id, authorization).is_some() {
			return Err(AclError::InvariantViolation(format!(
				"duplicate authorization id {} in batch",
				authorization.id
			)));
		}
	}

	for authorization in batch {
		if let Some(parent) = authorization.parent_id.and_then(|id| by_id.get(&id)) {
			authorization.check_against_parent(parent)?;
		}
	}

	let mut ordered = Vec::with_capacity(batch.len());
	let mut placed: HashMap<AuthorizationId, bool> = HashMap::with_capacity(batch.len());

	for authorization in batch {
		// Walk up to the first ancestor not yet placed that is in the batch.
		let mut chain = Vec::new();
		let mut current = Some(authorization);
		while let Some(node) = current {
			match placed.get(&node.id) {
				Some(true) => break,
				Some(false) => {
					return Err(AclError::InvariantViolation(format!(
						"parent cycle in batch at authorization {}",
						node.id
					)));
				}
				None => {}
			}
			placed.insert(node.id, false);
			chain.push(node);
			current = node.parent_id.and_then(|id| by_id.get(&id).copied());
		}
		for node in chain.into_iter().rev() {
			placed.insert(node.id, true);
			ordered.push(node);
		}
	}

	Ok(ordered)
}
