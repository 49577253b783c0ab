// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered ACL configuration.
//!
//! Sources are merged in precedence order: built-in defaults, then a TOML
//! file (`/etc/loom/acl.toml` unless overridden), then `LOOM_ACL_*`
//! environment variables.
//!
//! ```toml
//! [database]
//! url = "sqlite:/var/lib/loom/acl.db"
//!
//! [cascade]
//! max_depth = 32
//!
//! [actions]
//! names = ["view", "create", "edit", "delete", "undelete", "allow", "publish"]
//!
//! [[roles]]
//! kind = "articlePublisher"
//!
//! [[roles.grants]]
//! actions = ["view", "publish"]
//! cascadable = true
//! ```

mod error;
mod layer;
mod sections;
mod sources;

use loom_acl_core::CascadeConfig;
use tracing::debug;

pub use error::ConfigError;
pub use layer::AclConfigLayer;
pub use sections::{
	ActionsConfigLayer, CascadeConfigLayer, DatabaseConfig, DatabaseConfigLayer, RoleConfig,
	RoleGrantConfig, DEFAULT_DATABASE_URL,
};
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, ENV_ACTIONS,
	ENV_CASCADE_MAX_DEPTH, ENV_DATABASE_URL,
};

/// Fully resolved ACL configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AclConfig {
	pub database: DatabaseConfig,
	pub cascade: CascadeConfig,
	/// Action names in bit order; empty selects the standard actions.
	pub actions: Vec<String>,
	pub roles: Vec<RoleConfig>,
}

/// Load configuration from defaults, the system TOML file and the environment.
pub fn load_config() -> Result<AclConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AclConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge an explicit list of sources; order in the list does not matter.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<AclConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AclConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	Ok(finalize(merged))
}

fn finalize(layer: AclConfigLayer) -> AclConfig {
	AclConfig {
		database: layer.database.unwrap_or_default().finalize(),
		cascade: layer.cascade.unwrap_or_default().finalize(),
		actions: layer.actions.unwrap_or_default().finalize(),
		roles: layer.roles.unwrap_or_default(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn toml_file(content: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[test]
	fn test_defaults_only() {
		let config = load_config_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config, AclConfig::default());
		assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
		assert_eq!(config.cascade.max_depth, loom_acl_core::DEFAULT_MAX_DEPTH);
	}

	#[test]
	fn test_env_overrides_file() {
		let file = toml_file(
			r#"
[database]
url = "sqlite:file.db"

[cascade]
max_depth = 5
"#,
		);

		let config = load_config_from_sources(vec![
			Box::new(EnvSource::from_vars([(ENV_DATABASE_URL, "sqlite:env.db")])),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.database.url, "sqlite:env.db");
		assert_eq!(config.cascade.max_depth, 5);
	}

	#[test]
	fn test_file_overrides_defaults() {
		let file = toml_file("[actions]\nnames = [\"read\", \"write\"]\n");

		let config = load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
			Box::new(EnvSource::from_vars(Vec::<(String, String)>::new())),
		])
		.unwrap();

		assert_eq!(config.actions, vec!["read", "write"]);
		assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
	}

	#[test]
	fn test_missing_file_is_skipped() {
		let config = load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new("/nonexistent/loom/acl.toml")),
		])
		.unwrap();
		assert_eq!(config, AclConfig::default());
	}
}
