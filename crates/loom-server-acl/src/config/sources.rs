// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use super::error::ConfigError;
use super::layer::AclConfigLayer;
use super::sections::{ActionsConfigLayer, CascadeConfigLayer, DatabaseConfigLayer};

pub const ENV_DATABASE_URL: &str = "LOOM_ACL_DATABASE_URL";
pub const ENV_CASCADE_MAX_DEPTH: &str = "LOOM_ACL_CASCADE_MAX_DEPTH";
pub const ENV_ACTIONS: &str = "LOOM_ACL_ACTIONS";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AclConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AclConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(AclConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/acl.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AclConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AclConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: AclConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_ACL_<SECTION>_<FIELD>. Reads the process environment
/// unless built with [`EnvSource::from_vars`].
#[derive(Debug, Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// A source backed by a fixed set of variables instead of the process
	/// environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn var_usize(&self, name: &str) -> Result<Option<usize>, ConfigError> {
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid usize value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn var_list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AclConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(AclConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: self.var(ENV_DATABASE_URL),
			}),
			cascade: Some(CascadeConfigLayer {
				max_depth: self.var_usize(ENV_CASCADE_MAX_DEPTH)?,
			}),
			actions: Some(ActionsConfigLayer {
				names: self.var_list(ENV_ACTIONS),
			}),
			roles: None,
		})
	}
}
