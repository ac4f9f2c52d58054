// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token resolver configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vend_server_identity::{ReadinessPolicy, ResolverConfig};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfigLayer {
	pub max_attempts: Option<u32>,
	pub interval_secs: Option<u64>,
	/// `token-secret` or `min-secrets:<n>`.
	pub readiness: Option<String>,
}

/// Parse a readiness policy as written in configuration.
pub fn parse_readiness(value: &str) -> Result<ReadinessPolicy, ConfigError> {
	let invalid = || ConfigError::InvalidValue {
		key: "resolver.readiness".to_string(),
		message: format!("expected 'token-secret' or 'min-secrets:<n>', got '{value}'"),
	};

	match value.trim() {
		"token-secret" => Ok(ReadinessPolicy::TokenSecretPresent),
		other => {
			let n = other
				.strip_prefix("min-secrets:")
				.ok_or_else(invalid)?
				.parse::<usize>()
				.map_err(|_| invalid())?;
			if n == 0 {
				return Err(invalid());
			}
			Ok(ReadinessPolicy::MinSecrets(n))
		}
	}
}

impl ResolverConfigLayer {
	pub fn merge(&mut self, other: ResolverConfigLayer) {
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.readiness.is_some() {
			self.readiness = other.readiness;
		}
	}

	pub fn resolve(self) -> Result<ResolverConfig, ConfigError> {
		let defaults = ResolverConfig::default();

		let max_attempts = self.max_attempts.unwrap_or(defaults.max_attempts);
		if max_attempts == 0 {
			return Err(ConfigError::Validation(
				"resolver.max_attempts must be at least 1".to_string(),
			));
		}

		let readiness = match self.readiness {
			Some(value) => parse_readiness(&value)?,
			None => defaults.readiness,
		};

		Ok(ResolverConfig {
			max_attempts,
			interval: self
				.interval_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.interval),
			readiness,
		})
	}
}
