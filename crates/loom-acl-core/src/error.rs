// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the ACL model.

use thiserror::Error;

use crate::resource::ResourceRef;

/// Result type for ACL model operations.
pub type Result<T> = std::result::Result<T, AclError>;

/// Errors raised by the ACL model and cascade engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
	#[error("unknown action: {0}")]
	UnknownAction(String),

	#[error("duplicate action: {0}")]
	DuplicateAction(String),

	#[error("too many actions registered (maximum {max})")]
	TooManyActions { max: usize },

	#[error("invalid role state: {0}")]
	InvalidRoleState(String),

	#[error("unknown role kind: {0}")]
	UnknownRoleKind(String),

	#[error("cascade cycle detected at {resource} (path: {path})")]
	CascadeCycle { resource: ResourceRef, path: String },

	#[error("cascade exceeded maximum depth of {max_depth} at {resource}")]
	CascadeDepthExceeded {
		resource: ResourceRef,
		max_depth: usize,
	},

	#[error("expected an entity resource, got {0}")]
	ExpectedEntityResource(ResourceRef),

	#[error("invariant violation: {0}")]
	InvariantViolation(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_display_variants() {
		let errors = vec![
			AclError::UnknownAction("publish".to_string()),
			AclError::DuplicateAction("view".to_string()),
			AclError::TooManyActions { max: 63 },
			AclError::InvalidRoleState("no resource bound".to_string()),
			AclError::UnknownRoleKind("fileOwner".to_string()),
			AclError::CascadeCycle {
				resource: ResourceRef::for_entity("folder", "1"),
				path: "folder#1 -> folder#2".to_string(),
			},
			AclError::CascadeDepthExceeded {
				resource: ResourceRef::for_entity("folder", "1"),
				max_depth: 4,
			},
			AclError::ExpectedEntityResource(ResourceRef::for_class("folder")),
			AclError::InvariantViolation("child widens parent".to_string()),
		];

		for error in errors {
			assert!(!error.to_string().is_empty());
		}
	}

	#[test]
	fn cycle_error_names_the_resource() {
		let error = AclError::CascadeCycle {
			resource: ResourceRef::for_entity("folder", "7"),
			path: "folder#7".to_string(),
		};
		assert!(error.to_string().contains("folder#7"));
	}
}
