// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use super::sections::{ActionsConfigLayer, CascadeConfigLayer, DatabaseConfigLayer, RoleConfig};

/// One partial configuration, as produced by a single source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AclConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub cascade: Option<CascadeConfigLayer>,
	#[serde(default)]
	pub actions: Option<ActionsConfigLayer>,
	#[serde(default)]
	pub roles: Option<Vec<RoleConfig>>,
}

impl AclConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	///
	/// Role lists are replaced as a whole, not concatenated.
	pub fn merge(&mut self, other: AclConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.cascade, other.cascade, CascadeConfigLayer::merge);
		merge_section(&mut self.actions, other.actions, ActionsConfigLayer::merge);
		if other.roles.is_some() {
			self.roles = other.roles;
		}
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(layer)) => merge(existing, layer),
		(None, Some(layer)) => *base = Some(layer),
		(_, None) => {}
	}
}
