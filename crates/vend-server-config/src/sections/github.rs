// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub dispatch oracle configuration section.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vend_server_auth_github::DispatchConfig;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfigLayer {
	pub api_base_url: Option<String>,
	/// File holding `owner/repo`, usually a mounted binding.
	pub repository_file: Option<PathBuf>,
	pub default_repository: Option<String>,
	pub workflow: Option<String>,
	pub git_ref: Option<String>,
	pub timeout_secs: Option<u64>,
}

impl GitHubConfigLayer {
	pub fn merge(&mut self, other: GitHubConfigLayer) {
		if other.api_base_url.is_some() {
			self.api_base_url = other.api_base_url;
		}
		if other.repository_file.is_some() {
			self.repository_file = other.repository_file;
		}
		if other.default_repository.is_some() {
			self.default_repository = other.default_repository;
		}
		if other.workflow.is_some() {
			self.workflow = other.workflow;
		}
		if other.git_ref.is_some() {
			self.git_ref = other.git_ref;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn resolve(self) -> Result<DispatchConfig, ConfigError> {
		let defaults = DispatchConfig::default();

		if self.timeout_secs == Some(0) {
			return Err(ConfigError::Validation(
				"github.timeout_secs must be at least 1".to_string(),
			));
		}
		if let Some(repo) = &self.default_repository {
			if repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
				return Err(ConfigError::InvalidValue {
					key: "github.default_repository".to_string(),
					message: format!("expected owner/repo, got '{repo}'"),
				});
			}
		}

		Ok(DispatchConfig {
			api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
			repository_file: self.repository_file.unwrap_or(defaults.repository_file),
			default_repository: self.default_repository.unwrap_or(defaults.default_repository),
			workflow: self.workflow.unwrap_or(defaults.workflow),
			git_ref: self.git_ref.unwrap_or(defaults.git_ref),
			timeout: self
				.timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.timeout),
		})
	}
}
