// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registries built from configuration.

use std::collections::HashSet;

use loom_acl_core::{
	ActionRegistry, ActionSet, CascadeConfig, GrantTarget, GrantTemplate, RoleBehavior,
	RoleDefinition, RoleRegistry,
};

use crate::config::{AclConfig, ConfigError, RoleConfig};

/// Actions, role kinds and cascade limits an [`AclService`](crate::AclService)
/// runs with.
#[derive(Debug, Clone)]
pub struct AclSetup {
	pub actions: ActionRegistry,
	pub roles: RoleRegistry,
	pub cascade: CascadeConfig,
}

impl Default for AclSetup {
	fn default() -> Self {
		Self {
			actions: ActionRegistry::standard(),
			roles: RoleRegistry::new(),
			cascade: CascadeConfig::default(),
		}
	}
}

impl AclSetup {
	/// Builds the registries described by `config`.
	///
	/// No configured actions means the standard set. Every configured role
	/// becomes a [`RoleDefinition`]; more kinds can be added afterwards with
	/// [`AclSetup::register_role`].
	#[tracing::instrument(skip(config), fields(actions = config.actions.len(), roles = config.roles.len()))]
	pub fn from_config(config: &AclConfig) -> Result<Self, ConfigError> {
		let actions = if config.actions.is_empty() {
			ActionRegistry::standard()
		} else {
			ActionRegistry::with_actions(config.actions.iter().cloned())?
		};

		let mut roles = RoleRegistry::new();
		let mut seen = HashSet::new();
		for role in &config.roles {
			if !seen.insert(role.kind.as_str()) {
				return Err(ConfigError::InvalidValue {
					key: "roles".to_string(),
					message: format!("role kind '{}' declared more than once", role.kind),
				});
			}
			roles.register(role_definition(&actions, role)?);
		}

		tracing::info!(
			actions = actions.len(),
			roles = config.roles.len(),
			max_depth = config.cascade.max_depth,
			"acl setup loaded"
		);

		Ok(Self {
			actions,
			roles,
			cascade: config.cascade,
		})
	}

	/// Adds a role kind implemented in code.
	pub fn register_role<B: RoleBehavior + 'static>(&mut self, behavior: B) -> &mut Self {
		self.roles.register(behavior);
		self
	}
}

fn role_definition(
	actions: &ActionRegistry,
	role: &RoleConfig,
) -> Result<RoleDefinition, ConfigError> {
	if role.kind.trim().is_empty() {
		return Err(ConfigError::InvalidValue {
			key: "roles.kind".to_string(),
			message: "role kind must not be empty".to_string(),
		});
	}

	let grants = role
		.grants
		.iter()
		.map(|grant| -> Result<GrantTemplate, ConfigError> {
			let target = match &grant.class {
				Some(class) => GrantTarget::Class(class.clone()),
				None => GrantTarget::EachBoundResource,
			};
			Ok(GrantTemplate::new(
				ActionSet::from_names(actions, &grant.actions)?,
				grant.cascadable,
				target,
			))
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(RoleDefinition::new(role.kind.clone(), grants))
}
