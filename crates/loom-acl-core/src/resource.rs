// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource identity.
//!
//! A protected object is referenced either as a single entity (class + id) or
//! as a whole class of entities. A class-level grant covers every instance of
//! the class, but the two kinds never compare equal: falling back from an
//! entity to its class is an explicit query path, not part of [`ResourceRef::matches`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
	/// A specific instance of a resource class.
	Entity { class: String, id: String },
	/// Every instance of a resource class.
	Class { class: String },
}

impl ResourceRef {
	/// References a specific entity.
	pub fn for_entity(class: impl Into<String>, id: impl Into<String>) -> Self {
		Self::Entity {
			class: class.into(),
			id: id.into(),
		}
	}

	/// References every entity of a class.
	pub fn for_class(class: impl Into<String>) -> Self {
		Self::Class {
			class: class.into(),
		}
	}

	/// Returns the resource class, present for both kinds.
	pub fn class(&self) -> &str {
		match self {
			Self::Entity { class, .. } | Self::Class { class } => class,
		}
	}

	/// Returns the entity id, or `None` for class resources.
	pub fn id(&self) -> Option<&str> {
		match self {
			Self::Entity { id, .. } => Some(id),
			Self::Class { .. } => None,
		}
	}

	pub fn is_entity(&self) -> bool {
		matches!(self, Self::Entity { .. })
	}

	pub fn is_class(&self) -> bool {
		matches!(self, Self::Class { .. })
	}

	/// Returns the class resource covering this resource.
	pub fn class_ref(&self) -> ResourceRef {
		Self::for_class(self.class())
	}

	/// Exact match: same kind, same class, same id.
	pub fn matches(&self, other: &ResourceRef) -> bool {
		self == other
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Entity { class, id } => write!(f, "{class}#{id}"),
			Self::Class { class } => write!(f, "{class}"),
		}
	}
}
