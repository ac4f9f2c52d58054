// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provisioning configuration section.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vend_server_identity::{IdentityConfig, IdentityStrategy, RoleRule};

use crate::error::ConfigError;

/// Longest accepted name prefix; keeps generated namespace names within a
/// DNS label.
pub const MAX_NAME_PREFIX_LEN: usize = 16;

/// Strategy name as written in config files and env vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
	Dedicated,
	Shared,
	ServiceAccountOnly,
}

impl FromStr for StrategyKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"dedicated" => Ok(StrategyKind::Dedicated),
			"shared" => Ok(StrategyKind::Shared),
			"service-account-only" => Ok(StrategyKind::ServiceAccountOnly),
			other => Err(ConfigError::InvalidValue {
				key: "identity.strategy".to_string(),
				message: format!(
					"unknown strategy '{other}' (expected dedicated, shared or service-account-only)"
				),
			}),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfigLayer {
	pub strategy: Option<StrategyKind>,
	/// Required by the shared strategies.
	pub namespace: Option<String>,
	pub name_prefix: Option<String>,
	pub create_token_secret: Option<bool>,
	pub rules: Option<Vec<RoleRule>>,
}

fn is_dns_label(s: &str) -> bool {
	!s.is_empty()
		&& s
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
		&& !s.starts_with('-')
		&& !s.ends_with('-')
}

impl IdentityConfigLayer {
	pub fn merge(&mut self, other: IdentityConfigLayer) {
		if other.strategy.is_some() {
			self.strategy = other.strategy;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.name_prefix.is_some() {
			self.name_prefix = other.name_prefix;
		}
		if other.create_token_secret.is_some() {
			self.create_token_secret = other.create_token_secret;
		}
		if other.rules.is_some() {
			self.rules = other.rules;
		}
	}

	pub fn resolve(self) -> Result<IdentityConfig, ConfigError> {
		let defaults = IdentityConfig::default();

		let shared_namespace = |kind: &str| match &self.namespace {
			Some(ns) if is_dns_label(ns) => Ok(ns.clone()),
			Some(ns) => Err(ConfigError::InvalidValue {
				key: "identity.namespace".to_string(),
				message: format!("'{ns}' is not a valid namespace name"),
			}),
			None => Err(ConfigError::Validation(format!(
				"identity.namespace is required for the {kind} strategy"
			))),
		};
		let strategy = match self.strategy.unwrap_or(StrategyKind::Dedicated) {
			StrategyKind::Dedicated => IdentityStrategy::Dedicated,
			StrategyKind::Shared => IdentityStrategy::Shared {
				namespace: shared_namespace("shared")?,
			},
			StrategyKind::ServiceAccountOnly => IdentityStrategy::ServiceAccountOnly {
				namespace: shared_namespace("service-account-only")?,
			},
		};

		let name_prefix = self.name_prefix.unwrap_or(defaults.name_prefix);
		if !is_dns_label(&name_prefix) || name_prefix.len() > MAX_NAME_PREFIX_LEN {
			return Err(ConfigError::InvalidValue {
				key: "identity.name_prefix".to_string(),
				message: format!(
					"'{name_prefix}' must be a DNS label of at most {MAX_NAME_PREFIX_LEN} characters"
				),
			});
		}

		let rules = self.rules.unwrap_or(defaults.rules);
		if rules.iter().any(|r| r.verbs.is_empty()) {
			return Err(ConfigError::Validation(
				"every identity rule needs at least one verb".to_string(),
			));
		}

		Ok(IdentityConfig {
			strategy,
			name_prefix,
			create_token_secret: self
				.create_token_secret
				.unwrap_or(defaults.create_token_secret),
			rules,
		})
	}
}
