// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioner and resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vend_server_k8s::PolicyRule;

/// How identities are laid out in the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStrategy {
	/// A fresh namespace per request, holding its own service account and RBAC.
	Dedicated,
	/// One pre-existing namespace shared by all requests; each request gets a
	/// service account plus a role and binding named after it.
	Shared { namespace: String },
	/// One pre-existing namespace; each request gets only a service account.
	ServiceAccountOnly { namespace: String },
}

impl IdentityStrategy {
	pub fn name(&self) -> &'static str {
		match self {
			IdentityStrategy::Dedicated => "dedicated",
			IdentityStrategy::Shared { .. } => "shared",
			IdentityStrategy::ServiceAccountOnly { .. } => "service-account-only",
		}
	}
}

/// One RBAC rule granted to every vended service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
	#[serde(default)]
	pub api_groups: Vec<String>,
	pub resources: Vec<String>,
	pub verbs: Vec<String>,
}

impl RoleRule {
	/// Everything within the role's namespace.
	pub fn allow_all() -> Self {
		Self {
			api_groups: vec!["*".to_string()],
			resources: vec!["*".to_string()],
			verbs: vec!["*".to_string()],
		}
	}

	pub(crate) fn to_policy_rule(&self) -> PolicyRule {
		PolicyRule {
			api_groups: Some(self.api_groups.clone()),
			resources: Some(self.resources.clone()),
			verbs: self.verbs.clone(),
			..Default::default()
		}
	}
}

/// Configuration for the provisioner.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
	pub strategy: IdentityStrategy,
	/// Tag prepended to every generated name.
	pub name_prefix: String,
	/// Create a `<sa>-token` secret instead of waiting for the cluster to
	/// attach one.
	pub create_token_secret: bool,
	pub rules: Vec<RoleRule>,
}

impl Default for IdentityConfig {
	fn default() -> Self {
		Self {
			strategy: IdentityStrategy::Dedicated,
			name_prefix: "ci".to_string(),
			create_token_secret: true,
			rules: vec![RoleRule::allow_all()],
		}
	}
}

/// When the service account's token counts as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
	/// A token-typed secret with a non-empty `token` field exists.
	TokenSecretPresent,
	/// At least `n` secrets are attached; then scan them once.
	MinSecrets(usize),
}

/// Configuration for the secret resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
	pub max_attempts: u32,
	pub interval: Duration,
	pub readiness: ReadinessPolicy,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			max_attempts: 6,
			interval: Duration::from_secs(10),
			readiness: ReadinessPolicy::TokenSecretPresent,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let identity = IdentityConfig::default();
		assert_eq!(identity.strategy, IdentityStrategy::Dedicated);
		assert_eq!(identity.name_prefix, "ci");
		assert!(identity.create_token_secret);
		assert_eq!(identity.rules, vec![RoleRule::allow_all()]);

		let resolver = ResolverConfig::default();
		assert_eq!(resolver.max_attempts, 6);
		assert_eq!(resolver.interval, Duration::from_secs(10));
	}

	#[test]
	fn rule_converts_to_policy_rule() {
		let rule = RoleRule {
			api_groups: vec!["".to_string()],
			resources: vec!["pods".to_string()],
			verbs: vec!["get".to_string(), "list".to_string()],
		};
		let policy = rule.to_policy_rule();
		assert_eq!(policy.api_groups, Some(vec!["".to_string()]));
		assert_eq!(policy.resources, Some(vec!["pods".to_string()]));
		assert_eq!(policy.verbs, vec!["get", "list"]);
	}
}
