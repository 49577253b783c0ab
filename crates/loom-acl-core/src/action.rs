// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Action bitmasks.
//!
//! The set of recognized actions is application-defined: an [`ActionRegistry`]
//! assigns one bit per action name, in registration order, and is built once
//! at startup. An [`ActionSet`] is an immutable mask over those bits.
//!
//! At most [`MAX_ACTIONS`] actions can be registered so that every mask fits a
//! non-negative signed 64-bit integer column.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::error::{AclError, Result};

/// Maximum number of actions a registry can hold.
pub const MAX_ACTIONS: usize = 63;

/// Name that stands for every registered action in configuration.
pub const ALL_ACTIONS: &str = "*";

/// A single registered action (exactly one bit set).
///
/// Serialized as its bit; deserializing anything other than a single bit
/// below [`MAX_ACTIONS`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Action(u64);

impl Action {
	/// The action occupying bit `index`, if that bit is addressable.
	pub const fn from_index(index: u32) -> Option<Self> {
		if (index as usize) < MAX_ACTIONS {
			Some(Self::nth(index))
		} else {
			None
		}
	}

	/// Callers guarantee `index < MAX_ACTIONS`.
	const fn nth(index: u32) -> Self {
		Self(1 << index)
	}

	pub const fn bit(self) -> u64 {
		self.0
	}

	pub const fn index(self) -> u32 {
		self.0.trailing_zeros()
	}
}

impl TryFrom<u64> for Action {
	type Error = AclError;

	fn try_from(bits: u64) -> Result<Self> {
		if bits.count_ones() == 1 && (bits.trailing_zeros() as usize) < MAX_ACTIONS {
			Ok(Self(bits))
		} else {
			Err(AclError::UnknownAction(format!("bits {bits:#x}")))
		}
	}
}

impl From<Action> for u64 {
	fn from(action: Action) -> Self {
		action.0
	}
}

/// The default actions, matching [`ActionRegistry::standard`].
pub mod standard {
	use super::Action;

	pub const VIEW: Action = Action::nth(0);
	pub const CREATE: Action = Action::nth(1);
	pub const EDIT: Action = Action::nth(2);
	pub const DELETE: Action = Action::nth(3);
	pub const UNDELETE: Action = Action::nth(4);
	pub const ALLOW: Action = Action::nth(5);

	pub(super) const NAMES: [&str; 6] = ["view", "create", "edit", "delete", "undelete", "allow"];
}

/// Immutable set of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(u64);

impl ActionSet {
	pub const EMPTY: ActionSet = ActionSet(0);

	/// Builds a set from action names.
	///
	/// # Errors
	/// Returns [`AclError::UnknownAction`] for a name the registry does not know.
	/// `"*"` expands to every registered action.
	pub fn from_names<I, S>(registry: &ActionRegistry, names: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut bits = 0;
		for name in names {
			let name = name.as_ref();
			if name == ALL_ACTIONS {
				bits |= registry.all().0;
				continue;
			}
			bits |= registry.action(name)?.bit();
		}
		Ok(Self(bits))
	}

	/// Builds a set from a raw mask, rejecting bits the registry does not define.
	pub fn from_mask(registry: &ActionRegistry, mask: u64) -> Result<Self> {
		let unknown = mask & !registry.all().0;
		if unknown != 0 {
			return Err(AclError::UnknownAction(format!("bits {unknown:#x}")));
		}
		Ok(Self(mask))
	}

	/// Builds a set from a mask without consulting a registry.
	///
	/// Used when reading masks back from storage.
	pub const fn from_bits_unchecked(bits: u64) -> Self {
		Self(bits)
	}

	pub fn from_actions<I: IntoIterator<Item = Action>>(actions: I) -> Self {
		Self(actions.into_iter().fold(0, |bits, a| bits | a.bit()))
	}

	/// Every registered action.
	pub fn all(registry: &ActionRegistry) -> Self {
		registry.all()
	}

	pub const fn bits(self) -> u64 {
		self.0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub const fn union(self, other: ActionSet) -> ActionSet {
		Self(self.0 | other.0)
	}

	pub const fn intersection(self, other: ActionSet) -> ActionSet {
		Self(self.0 & other.0)
	}

	pub const fn contains(self, action: Action) -> bool {
		self.0 & action.bit() == action.bit()
	}

	pub const fn is_subset_of(self, other: ActionSet) -> bool {
		self.0 & other.0 == self.0
	}
}

impl From<Action> for ActionSet {
	fn from(action: Action) -> Self {
		Self(action.bit())
	}
}

impl BitOr for ActionSet {
	type Output = ActionSet;

	fn bitor(self, rhs: ActionSet) -> ActionSet {
		self.union(rhs)
	}
}

impl BitOr<Action> for ActionSet {
	type Output = ActionSet;

	fn bitor(self, rhs: Action) -> ActionSet {
		self.union(rhs.into())
	}
}

impl BitOr for Action {
	type Output = ActionSet;

	fn bitor(self, rhs: Action) -> ActionSet {
		ActionSet::from(self).union(rhs.into())
	}
}

impl BitAnd for ActionSet {
	type Output = ActionSet;

	fn bitand(self, rhs: ActionSet) -> ActionSet {
		self.intersection(rhs)
	}
}

impl fmt::Display for ActionSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

/// The application's universe of named actions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionRegistry {
	names: Vec<String>,
}

impl ActionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry holding `view, create, edit, delete, undelete, allow`,
	/// consistent with the constants in [`standard`].
	pub fn standard() -> Self {
		Self {
			names: standard::NAMES.iter().map(|n| n.to_string()).collect(),
		}
	}

	/// Builds a registry from names, assigning bits in order.
	pub fn with_actions<I, S>(names: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut registry = Self::new();
		for name in names {
			registry.register(name)?;
		}
		Ok(registry)
	}

	/// Registers a new action and returns its bit.
	pub fn register(&mut self, name: impl Into<String>) -> Result<Action> {
		let name = name.into();
		if name.is_empty() || name == ALL_ACTIONS {
			return Err(AclError::UnknownAction(name));
		}
		if self.names.contains(&name) {
			return Err(AclError::DuplicateAction(name));
		}
		if self.names.len() >= MAX_ACTIONS {
			return Err(AclError::TooManyActions { max: MAX_ACTIONS });
		}
		self.names.push(name);
		Ok(Action::nth((self.names.len() - 1) as u32))
	}

	/// Looks up an action by name.
	pub fn action(&self, name: &str) -> Result<Action> {
		self
			.names
			.iter()
			.position(|n| n == name)
			.map(|index| Action::nth(index as u32))
			.ok_or_else(|| AclError::UnknownAction(name.to_string()))
	}

	/// Returns the name of a registered action.
	pub fn name_of(&self, action: Action) -> Option<&str> {
		self.names.get(action.index() as usize).map(String::as_str)
	}

	/// Returns the names of every action in `set`, in bit order.
	pub fn names(&self, set: ActionSet) -> Vec<&str> {
		self
			.names
			.iter()
			.enumerate()
			.filter(|(index, _)| set.contains(Action::nth(*index as u32)))
			.map(|(_, name)| name.as_str())
			.collect()
	}

	/// OR of every registered bit.
	pub fn all(&self) -> ActionSet {
		let bits = (0..self.names.len()).fold(0u64, |bits, index| bits | (1 << index));
		ActionSet(bits)
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}
}
