// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cascade propagation.
//!
//! When a cascadable authorization is granted on a resource, the
//! [`CascadeEngine`] walks the application's [`ResourceHierarchy`] below that
//! resource and derives one child authorization per reachable resource. The
//! result is a tree, returned flattened with every parent before its
//! children so it can be persisted in a single batch.
//!
//! Cycles are detected on the current derivation path, so a resource reachable
//! through two different parents (a diamond) is fine, while `a -> b -> a`
//! fails with [`AclError::CascadeCycle`]. Within one tree a resource gets at
//! most one child per action set: the first path to reach it wins and later
//! paths stop there. Depth is also capped by [`CascadeConfig::max_depth`].

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::action::ActionSet;
use crate::authorization::Authorization;
use crate::error::{AclError, Result};
use crate::resource::ResourceRef;

/// Default cap on cascade depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A resource an authorization cascades to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeTarget {
	pub resource: ResourceRef,
	/// Local restriction: the child gets `parent.actions ∩ override`.
	pub action_override: Option<ActionSet>,
}

impl CascadeTarget {
	pub fn new(resource: ResourceRef) -> Self {
		Self {
			resource,
			action_override: None,
		}
	}

	pub fn with_override(mut self, actions: ActionSet) -> Self {
		self.action_override = Some(actions);
		self
	}
}

/// The application's resource hierarchy.
///
/// The engine knows nothing about what resources mean; it only follows the
/// edges reported here.
pub trait ResourceHierarchy: Send + Sync {
	/// Resources that authorizations on `parent` cascade to.
	///
	/// The sequence is consumed lazily and must be finite.
	fn cascade_targets<'a>(
		&'a self,
		parent: &ResourceRef,
	) -> Box<dyn Iterator<Item = CascadeTarget> + 'a>;

	/// Resources whose cascadable authorizations a newly created `resource`
	/// inherits.
	fn parent_resources(&self, _resource: &ResourceRef) -> Vec<ResourceRef> {
		Vec::new()
	}
}

/// A hierarchy with no edges: nothing ever cascades.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatHierarchy;

impl ResourceHierarchy for FlatHierarchy {
	fn cascade_targets<'a>(
		&'a self,
		_parent: &ResourceRef,
	) -> Box<dyn Iterator<Item = CascadeTarget> + 'a> {
		Box::new(std::iter::empty())
	}
}

/// An in-memory hierarchy built from explicit edges.
#[derive(Debug, Clone, Default)]
pub struct StaticHierarchy {
	children: HashMap<ResourceRef, Vec<CascadeTarget>>,
}

impl StaticHierarchy {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an edge `parent -> child`.
	pub fn with_child(self, parent: ResourceRef, child: ResourceRef) -> Self {
		self.with_target(parent, CascadeTarget::new(child))
	}

	pub fn with_target(mut self, parent: ResourceRef, target: CascadeTarget) -> Self {
		self.add_target(parent, target);
		self
	}

	pub fn add_target(&mut self, parent: ResourceRef, target: CascadeTarget) {
		self.children.entry(parent).or_default().push(target);
	}
}

impl ResourceHierarchy for StaticHierarchy {
	fn cascade_targets<'a>(
		&'a self,
		parent: &ResourceRef,
	) -> Box<dyn Iterator<Item = CascadeTarget> + 'a> {
		match self.children.get(parent) {
			Some(targets) => Box::new(targets.iter().cloned()),
			None => Box::new(std::iter::empty()),
		}
	}

	fn parent_resources(&self, resource: &ResourceRef) -> Vec<ResourceRef> {
		let mut parents: Vec<ResourceRef> = self
			.children
			.iter()
			.filter(|(_, targets)| targets.iter().any(|t| &t.resource == resource))
			.map(|(parent, _)| parent.clone())
			.collect();
		parents.sort();
		parents
	}
}

/// Cascade limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeConfig {
	/// Deepest derived child allowed below a root authorization.
	pub max_depth: usize,
}

impl Default for CascadeConfig {
	fn default() -> Self {
		Self {
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}
}

/// Derives cascade trees over a [`ResourceHierarchy`].
pub struct CascadeEngine<'h, H: ResourceHierarchy + ?Sized> {
	hierarchy: &'h H,
	config: CascadeConfig,
}

impl<'h, H: ResourceHierarchy + ?Sized> CascadeEngine<'h, H> {
	pub fn new(hierarchy: &'h H, config: CascadeConfig) -> Self {
		Self { hierarchy, config }
	}

	/// Expands `root` into its full cascade tree.
	///
	/// The returned list starts with `root` and lists parents before children.
	/// Non-cascadable roots come back alone.
	///
	/// # Errors
	/// [`AclError::CascadeCycle`] or [`AclError::CascadeDepthExceeded`]; no
	/// partial tree is returned.
	#[instrument(
		level = "debug",
		skip(self, root),
		fields(authorization_id = %root.id, resource = %root.resource)
	)]
	pub fn expand(&self, root: Authorization) -> Result<Vec<Authorization>> {
		let mut path = vec![root.resource.clone()];
		let mut derived = HashSet::from([(root.resource.clone(), root.actions)]);
		let mut tree = vec![root.clone()];
		self.descend(&root, &mut path, &mut derived, &mut tree)?;
		tracing::debug!(count = tree.len(), "expanded cascade tree");
		Ok(tree)
	}

	/// Expands each root in turn and concatenates the trees.
	pub fn expand_all(&self, roots: Vec<Authorization>) -> Result<Vec<Authorization>> {
		let mut all = Vec::with_capacity(roots.len());
		for root in roots {
			all.extend(self.expand(root)?);
		}
		Ok(all)
	}

	/// Derives what a newly created `resource` inherits.
	///
	/// `inherited` holds cascadable authorizations on the resource's parents.
	/// Each yields a child on `resource` (narrowed by the parent's override
	/// for this edge, if any), which is then expanded further.
	#[instrument(level = "debug", skip(self, inherited), fields(resource = %resource, inherited = inherited.len()))]
	pub fn inherit(
		&self,
		resource: &ResourceRef,
		inherited: &[Authorization],
	) -> Result<Vec<Authorization>> {
		let mut tree = Vec::new();
		for ancestor in inherited.iter().filter(|a| a.cascadable) {
			if &ancestor.resource == resource {
				return Err(self.cycle(resource, &[ancestor.resource.clone()]));
			}
			let action_override = self
				.hierarchy
				.cascade_targets(&ancestor.resource)
				.find(|t| &t.resource == resource)
				.and_then(|t| t.action_override);
			let child = ancestor.create_child(resource.clone(), action_override)?;
			let mut path = vec![ancestor.resource.clone(), resource.clone()];
			let mut derived = HashSet::from([
				(ancestor.resource.clone(), ancestor.actions),
				(resource.clone(), child.actions),
			]);
			tree.push(child.clone());
			self.descend(&child, &mut path, &mut derived, &mut tree)?;
		}
		tracing::debug!(count = tree.len(), "derived inherited authorizations");
		Ok(tree)
	}

	fn descend(
		&self,
		node: &Authorization,
		path: &mut Vec<ResourceRef>,
		derived: &mut HashSet<(ResourceRef, ActionSet)>,
		tree: &mut Vec<Authorization>,
	) -> Result<()> {
		if !node.cascadable {
			return Ok(());
		}

		for target in self.hierarchy.cascade_targets(&node.resource) {
			if path.contains(&target.resource) {
				return Err(self.cycle(&target.resource, path));
			}

			let child = node.create_child(target.resource.clone(), target.action_override)?;
			if !derived.insert((child.resource.clone(), child.actions)) {
				tracing::trace!(resource = %child.resource, "already derived on another path");
				continue;
			}
			if path.len() > self.config.max_depth {
				return Err(AclError::CascadeDepthExceeded {
					resource: target.resource,
					max_depth: self.config.max_depth,
				});
			}

			tree.push(child.clone());
			path.push(target.resource);
			self.descend(&child, path, derived, tree)?;
			path.pop();
		}
		Ok(())
	}

	fn cycle(&self, resource: &ResourceRef, path: &[ResourceRef]) -> AclError {
		let path = path
			.iter()
			.chain(std::iter::once(resource))
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(" -> ");
		tracing::warn!(resource = %resource, path = %path, "cascade cycle detected");
		AclError::CascadeCycle {
			resource: resource.clone(),
			path,
		}
	}
}
