// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	GitHubConfigLayer, HttpConfigLayer, IdentityConfigLayer, LogFormat, LoggingConfigLayer,
	ResolverConfigLayer, StrategyKind,
};

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
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
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

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/vend/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: VEND_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl EnvSource {
	/// Build a layer from an arbitrary variable lookup.
	pub fn load_with(
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<ServerConfigLayer, ConfigError> {
		let env = Env { lookup };
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: env.var("VEND_SERVER_HOST"),
				port: env.parse("VEND_SERVER_PORT")?,
			}),
			github: Some(GitHubConfigLayer {
				api_base_url: env.var("VEND_SERVER_GITHUB_API_BASE_URL"),
				repository_file: env.var("VEND_SERVER_GITHUB_REPOSITORY_FILE").map(PathBuf::from),
				default_repository: env.var("VEND_SERVER_GITHUB_DEFAULT_REPOSITORY"),
				workflow: env.var("VEND_SERVER_GITHUB_WORKFLOW"),
				git_ref: env.var("VEND_SERVER_GITHUB_REF"),
				timeout_secs: env.parse("VEND_SERVER_GITHUB_TIMEOUT_SECS")?,
			}),
			identity: Some(IdentityConfigLayer {
				strategy: env
					.var("VEND_SERVER_IDENTITY_STRATEGY")
					.map(|v| v.parse::<StrategyKind>())
					.transpose()?,
				namespace: env.var("VEND_SERVER_IDENTITY_NAMESPACE"),
				name_prefix: env.var("VEND_SERVER_IDENTITY_NAME_PREFIX"),
				create_token_secret: env.bool("VEND_SERVER_IDENTITY_CREATE_TOKEN_SECRET"),
				rules: None,
			}),
			resolver: Some(ResolverConfigLayer {
				max_attempts: env.parse("VEND_SERVER_RESOLVER_MAX_ATTEMPTS")?,
				interval_secs: env.parse("VEND_SERVER_RESOLVER_INTERVAL_SECS")?,
				readiness: env.var("VEND_SERVER_RESOLVER_READINESS"),
			}),
			logging: Some(LoggingConfigLayer {
				level: env.var("VEND_SERVER_LOG_LEVEL"),
				format: env
					.var("VEND_SERVER_LOG_FORMAT")
					.map(|v| v.parse::<LogFormat>())
					.transpose()?,
			}),
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

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Self::load_with(|name| std::env::var(name).ok())
	}
}

struct Env<F> {
	lookup: F,
}

impl<F> Env<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
			}),
			None => Ok(None),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn precedence_order() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn env_vars_populate_layer() {
		let layer = EnvSource::load_with(lookup(&[
			("VEND_SERVER_PORT", "9000"),
			("VEND_SERVER_GITHUB_REPOSITORY_FILE", "/tmp/repo"),
			("VEND_SERVER_IDENTITY_STRATEGY", "shared"),
			("VEND_SERVER_IDENTITY_NAMESPACE", "ci-pool"),
			("VEND_SERVER_IDENTITY_CREATE_TOKEN_SECRET", "false"),
			("VEND_SERVER_RESOLVER_READINESS", "min-secrets:2"),
			("VEND_SERVER_LOG_FORMAT", "json"),
		]))
		.unwrap();

		assert_eq!(layer.http.unwrap().port, Some(9000));
		assert_eq!(
			layer.github.unwrap().repository_file,
			Some(PathBuf::from("/tmp/repo"))
		);
		let identity = layer.identity.unwrap();
		assert_eq!(identity.strategy, Some(StrategyKind::Shared));
		assert_eq!(identity.namespace.as_deref(), Some("ci-pool"));
		assert_eq!(identity.create_token_secret, Some(false));
		assert_eq!(
			layer.resolver.unwrap().readiness.as_deref(),
			Some("min-secrets:2")
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn empty_env_vars_are_ignored() {
		let layer = EnvSource::load_with(lookup(&[("VEND_SERVER_HOST", "")])).unwrap();
		assert_eq!(layer.http.unwrap().host, None);
	}

	#[test]
	fn invalid_env_number_is_reported() {
		let err = EnvSource::load_with(lookup(&[("VEND_SERVER_PORT", "not-a-port")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "VEND_SERVER_PORT"));
	}

	#[test]
	fn missing_toml_file_is_skipped() {
		let layer = TomlSource::new("/nonexistent/vend/server.toml")
			.load()
			.unwrap();
		assert!(layer.http.is_none());
	}

	#[test]
	fn toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[http]
port = 8443

[identity]
strategy = "service-account-only"
namespace = "ci-pool"
name_prefix = "chart-verifier"

[[identity.rules]]
api_groups = [""]
resources = ["pods", "pods/log"]
verbs = ["get", "list"]

[resolver]
max_attempts = 12
interval_secs = 5
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();

		assert_eq!(layer.http.unwrap().port, Some(8443));
		let identity = layer.identity.unwrap();
		assert_eq!(identity.strategy, Some(StrategyKind::ServiceAccountOnly));
		assert_eq!(identity.rules.unwrap()[0].resources, vec!["pods", "pods/log"]);
		assert_eq!(layer.resolver.unwrap().interval_secs, Some(5));
	}

	#[test]
	fn malformed_toml_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[http\nport = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}
}
