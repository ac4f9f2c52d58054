// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the vend server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`VEND_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use vend_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
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
use vend_server_auth_github::DispatchConfig;
use vend_server_identity::{IdentityConfig, ResolverConfig};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub github: DispatchConfig,
	pub identity: IdentityConfig,
	pub resolver: ResolverConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`VEND_SERVER_*`)
/// 2. Config file (`/etc/vend/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
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

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let github = layer.github.unwrap_or_default().resolve()?;
	let identity = layer.identity.unwrap_or_default().resolve()?;
	let resolver = layer.resolver.unwrap_or_default().resolve()?;
	let logging = layer.logging.unwrap_or_default().finalize();

	info!(
		host = %http.host,
		port = http.port,
		repository_file = %github.repository_file.display(),
		workflow = %github.workflow,
		strategy = identity.strategy.name(),
		name_prefix = %identity.name_prefix,
		max_attempts = resolver.max_attempts,
		interval_secs = resolver.interval.as_secs(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		github,
		identity,
		resolver,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::time::Duration;
	use vend_server_identity::{IdentityStrategy, ReadinessPolicy};

	struct FixedSource(Precedence, ServerConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	fn port_layer(port: u16) -> ServerConfigLayer {
		ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(port),
			}),
			..Default::default()
		}
	}

	#[test]
	fn defaults_resolve() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:7080");
		assert_eq!(config.identity.strategy, IdentityStrategy::Dedicated);
		assert_eq!(config.resolver.max_attempts, 6);
		assert_eq!(config.logging.format, LogFormat::Text);
	}

	#[test]
	fn environment_beats_file_beats_defaults() {
		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(FixedSource(Precedence::Environment, port_layer(3))),
			Box::new(FixedSource(Precedence::ConfigFile, port_layer(2))),
			Box::new(DefaultsSource),
		];
		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.http.port, 3);

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(FixedSource(Precedence::ConfigFile, port_layer(2))),
			Box::new(DefaultsSource),
		];
		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.http.port, 2);
	}

	#[test]
	fn file_source_resolves_into_runtime_types() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[identity]
strategy = "shared"
namespace = "ci-shared"

[resolver]
readiness = "min-secrets:2"
interval_secs = 1
"#
		)
		.unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
		];
		let config = load_from_sources(sources).unwrap();

		assert_eq!(
			config.identity.strategy,
			IdentityStrategy::Shared {
				namespace: "ci-shared".to_string()
			}
		);
		assert_eq!(config.resolver.readiness, ReadinessPolicy::MinSecrets(2));
		assert_eq!(config.resolver.interval, Duration::from_secs(1));
	}

	#[test]
	fn validation_errors_surface() {
		let layer = ServerConfigLayer {
			identity: Some(IdentityConfigLayer {
				strategy: Some(StrategyKind::Shared),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}
}
