// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core model for the Loom access control list.
//!
//! This crate holds the storage-agnostic part of the ACL:
//!
//! - [`ActionSet`] / [`ActionRegistry`]: bitmask sets over application-defined actions
//! - [`ResourceRef`]: an entity (class + id) or a whole class of entities
//! - [`Authorization`]: a grant of actions on a resource to a security identity,
//!   possibly derived from a parent grant through cascade
//! - [`Role`] / [`RoleBehavior`] / [`RoleRegistry`]: role kinds and the
//!   authorizations they imply
//! - [`CascadeEngine`] / [`ResourceHierarchy`]: propagation of cascadable grants
//!   down the application's resource hierarchy
//!
//! Persistence and resolution queries live in `loom-server-acl`.
//!
//! # Example
//!
//! ```
//! use loom_acl_core::{
//!     standard, ActionRegistry, ActionSet, Authorization, CascadeConfig, CascadeEngine,
//!     ResourceRef, Role, SecurityIdentityId, StaticHierarchy,
//! };
//!
//! let folder = ResourceRef::for_entity("folder", "1");
//! let file = ResourceRef::for_entity("file", "a");
//! let hierarchy = StaticHierarchy::new().with_child(folder.clone(), file.clone());
//!
//! let role = Role::new("folderOwner", SecurityIdentityId::generate(), vec![folder.clone()]);
//! let root = Authorization::create(&role, ActionSet::all(&ActionRegistry::standard()), folder, true);
//!
//! let engine = CascadeEngine::new(&hierarchy, CascadeConfig::default());
//! let tree = engine.expand(root).unwrap();
//! assert_eq!(tree.len(), 2);
//! assert!(tree[1].actions.contains(standard::EDIT));
//! ```

pub mod action;
pub mod authorization;
pub mod cascade;
pub mod error;
pub mod resource;
pub mod role;
pub mod types;

pub use action::{standard, Action, ActionRegistry, ActionSet, ALL_ACTIONS, MAX_ACTIONS};
pub use authorization::{order_parents_first, Authorization};
pub use cascade::{
	CascadeConfig, CascadeEngine, CascadeTarget, FlatHierarchy, ResourceHierarchy, StaticHierarchy,
	DEFAULT_MAX_DEPTH,
};
pub use error::{AclError, Result};
pub use resource::ResourceRef;
pub use role::{GrantTarget, GrantTemplate, Role, RoleBehavior, RoleDefinition, RoleRegistry};
pub use types::{AuthorizationId, RoleId, SecurityIdentity, SecurityIdentityId};
