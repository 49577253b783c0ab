// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.
//!
//! Each section has a runtime struct (fully resolved) and a `*Layer` struct
//! (partial, for merging) that finalizes into it.

use loom_acl_core::{CascadeConfig, DEFAULT_MAX_DEPTH};
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./loom-acl.db";

/// Database configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

/// Database configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}

/// Cascade configuration layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CascadeConfigLayer {
	#[serde(default)]
	pub max_depth: Option<usize>,
}

impl CascadeConfigLayer {
	pub fn merge(&mut self, other: CascadeConfigLayer) {
		if other.max_depth.is_some() {
			self.max_depth = other.max_depth;
		}
	}

	pub fn finalize(self) -> CascadeConfig {
		CascadeConfig {
			max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
		}
	}
}

/// Registered action names, in bit order.
///
/// Empty means the standard set (`view, create, edit, delete, undelete, allow`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsConfigLayer {
	#[serde(default)]
	pub names: Option<Vec<String>>,
}

impl ActionsConfigLayer {
	pub fn merge(&mut self, other: ActionsConfigLayer) {
		if other.names.is_some() {
			self.names = other.names;
		}
	}

	pub fn finalize(self) -> Vec<String> {
		self.names.unwrap_or_default()
	}
}

/// A role kind declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleConfig {
	pub kind: String,
	#[serde(default)]
	pub grants: Vec<RoleGrantConfig>,
}

/// One grant of a configured role.
///
/// Without `class` the grant applies to each resource bound to the role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleGrantConfig {
	pub actions: Vec<String>,
	#[serde(default)]
	pub cascadable: bool,
	#[serde(default)]
	pub class: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_url() {
		let config = DatabaseConfigLayer::default().finalize();
		assert_eq!(config.url, "sqlite:./loom-acl.db");
	}

	#[test]
	fn test_custom_url() {
		let layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/loom/acl.db".to_string()),
		};
		assert_eq!(layer.finalize().url, "sqlite:/var/lib/loom/acl.db");
	}

	#[test]
	fn test_merge_keeps_existing_when_other_empty() {
		let mut layer = CascadeConfigLayer { max_depth: Some(8) };
		layer.merge(CascadeConfigLayer::default());
		assert_eq!(layer.finalize().max_depth, 8);
	}

	#[test]
	fn test_default_max_depth() {
		assert_eq!(
			CascadeConfigLayer::default().finalize().max_depth,
			DEFAULT_MAX_DEPTH
		);
	}

	#[test]
	fn test_actions_default_to_empty() {
		assert!(ActionsConfigLayer::default().finalize().is_empty());
	}
}
