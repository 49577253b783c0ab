// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_acl_core::AclError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum AclServerError {
	#[error("Persistence error: {0}")]
	Persistence(#[from] sqlx::Error),

	#[error(transparent)]
	Acl(#[from] AclError),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl AclServerError {
	/// Returns the model error, if this error wraps one.
	pub fn as_acl(&self) -> Option<&AclError> {
		match self {
			Self::Acl(e) => Some(e),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, AclServerError>;
