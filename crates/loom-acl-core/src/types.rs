// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier types for the ACL model.
//!
//! - [`AuthorizationId`]: a single grant record
//! - [`RoleId`]: a role assigned to a security identity
//! - [`SecurityIdentityId`]: the principal (user, group, ...) holding grants
//!
//! All ID types serialize transparently as UUID strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(AuthorizationId, "Unique identifier for an authorization.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(
	SecurityIdentityId,
	"Stable identifier of a security identity (user, group or other principal)."
);

/// A principal that authorizations can be granted to.
///
/// The ACL never creates identities; it only needs a stable, comparable id.
pub trait SecurityIdentity {
	fn security_identity_id(&self) -> SecurityIdentityId;
}

impl SecurityIdentity for SecurityIdentityId {
	fn security_identity_id(&self) -> SecurityIdentityId {
		*self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_roundtrip_through_strings() {
		let id = AuthorizationId::generate();
		let parsed: AuthorizationId = id.to_string().parse().unwrap();
		assert_eq!(id, parsed);
	}

	#[test]
	fn invalid_id_string_is_rejected() {
		assert!("not-a-uuid".parse::<RoleId>().is_err());
	}

	#[test]
	fn identity_id_is_its_own_security_identity() {
		let id = SecurityIdentityId::generate();
		assert_eq!(id.security_identity_id(), id);
	}
}
