// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the jobctl parameter storage server.
//!
//! Layered from defaults, a TOML file and `JOBCTL_SERVER_*` environment
//! variables, in that order of increasing precedence.
//!
//! ```ignore
//! use jobctl_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("parameter sets kept for {} days", config.parameter_storage.retention_days);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Upper bound on `parameter_storage.retention_days` (100 years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub parameter_storage: ParameterStorageConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`JOBCTL_SERVER_*`)
/// 2. Config file (`/etc/jobctl/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let parameter_storage = layer.parameter_storage.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&database, &parameter_storage)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		parameter_storage_enabled = parameter_storage.enabled,
		cleanup_enabled = parameter_storage.cleanup_enabled,
		retention_days = parameter_storage.retention_days,
		log_format = %logging.format,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		parameter_storage,
		logging,
	})
}

fn validate_config(
	database: &DatabaseConfig,
	parameter_storage: &ParameterStorageConfig,
) -> Result<(), ConfigError> {
	if database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}

	if parameter_storage.cleanup_enabled && parameter_storage.retention_days == 0 {
		return Err(ConfigError::Validation(
			"parameter_storage.retention_days must be at least 1 while cleanup is enabled"
				.to_string(),
		));
	}

	if parameter_storage.retention_days > MAX_RETENTION_DAYS {
		return Err(ConfigError::Validation(format!(
			"parameter_storage.retention_days must be at most {MAX_RETENTION_DAYS}"
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_zero_retention_rejected_when_cleanup_enabled() {
		let storage = ParameterStorageConfig {
			retention_days: 0,
			..Default::default()
		};
		let result = validate_config(&DatabaseConfig::default(), &storage);
		assert!(result.unwrap_err().to_string().contains("retention_days"));
	}

	#[test]
	fn test_zero_retention_allowed_without_cleanup() {
		let storage = ParameterStorageConfig {
			retention_days: 0,
			cleanup_enabled: false,
			..Default::default()
		};
		assert!(validate_config(&DatabaseConfig::default(), &storage).is_ok());
	}

	#[test]
	fn test_excessive_retention_rejected() {
		let storage = ParameterStorageConfig {
			retention_days: u32::MAX,
			..Default::default()
		};
		let result = validate_config(&DatabaseConfig::default(), &storage);
		assert!(result.unwrap_err().to_string().contains("at most"));

		let storage = ParameterStorageConfig {
			retention_days: MAX_RETENTION_DAYS,
			..Default::default()
		};
		assert!(validate_config(&DatabaseConfig::default(), &storage).is_ok());
	}

	#[test]
	fn test_zero_connections_rejected() {
		let database = DatabaseConfig {
			max_connections: 0,
			..Default::default()
		};
		assert!(validate_config(&database, &ParameterStorageConfig::default()).is_err());
	}

	#[test]
	fn test_finalize_empty_layer_uses_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./jobctl.db");
		assert!(config.parameter_storage.enabled);
		assert_eq!(config.logging.format, LogFormat::Pretty);
	}

	#[test]
	fn test_load_from_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[parameter_storage]\nenabled = false\nretention_days = 3\n\n\
			 [logging]\nlevel = \"debug\""
		)
		.unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		];
		let config = load_from_sources(sources).unwrap();

		assert!(!config.parameter_storage.enabled);
		assert!(config.parameter_storage.cleanup_enabled);
		assert_eq!(config.parameter_storage.retention_days, 3);
		assert_eq!(config.logging.level, "debug");
		assert_eq!(config.database.max_connections, 5);
	}
}
