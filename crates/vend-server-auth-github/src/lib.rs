// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller authentication against GitHub's workflow-dispatch endpoint.
//!
//! A caller is trusted when the credential it presents is allowed to trigger
//! a `workflow_dispatch` on the configured repository. GitHub answers a
//! permitted dispatch with `204 No Content`; anything else means the caller
//! is rejected.
//!
//! # Side effect
//!
//! The probe is not read-only: every successful validation really dispatches
//! the workflow. The workflow is expected to be a harmless notification job.
//!
//! # Security Considerations
//!
//! - The credential is held in a [`SecretString`] and never logged.
//! - All tracing instrumentation skips the credential.
//! - Validation fails closed: transport errors and malformed credentials
//!   yield `false`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use vend_common_secret::SecretString;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_REPOSITORY_FILE: &str = "/bindings/repository";
pub const DEFAULT_REPOSITORY: &str = "openshift-helm-charts/charts";
pub const DEFAULT_WORKFLOW: &str = "awaiting-approval-notification.yml";
pub const DEFAULT_GIT_REF: &str = "main";

const GITHUB_V3_ACCEPT: &str = "application/vnd.github.v3+json";

// =============================================================================
// Errors
// =============================================================================

/// Reasons a dispatch probe did not return 204.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
	/// The credential cannot be sent as an HTTP header value.
	#[error("credential is not a valid header value")]
	MalformedCredential,

	/// GitHub answered with something other than 204.
	#[error("dispatch rejected with status {0}")]
	Rejected(StatusCode),

	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),
}

// =============================================================================
// Configuration
// =============================================================================

/// Settings for the dispatch probe.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
	pub api_base_url: String,
	/// File holding `owner/repo`; re-read on every validation.
	pub repository_file: PathBuf,
	/// Used when the repository file is missing or empty.
	pub default_repository: String,
	pub workflow: String,
	pub git_ref: String,
	pub timeout: Duration,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			repository_file: PathBuf::from(DEFAULT_REPOSITORY_FILE),
			default_repository: DEFAULT_REPOSITORY.to_string(),
			workflow: DEFAULT_WORKFLOW.to_string(),
			git_ref: DEFAULT_GIT_REF.to_string(),
			timeout: vend_common_http::DEFAULT_TIMEOUT,
		}
	}
}

// =============================================================================
// Authenticator
// =============================================================================

/// Decides whether a presented credential may use the service.
#[async_trait]
pub trait CallerAuthenticator: Send + Sync {
	/// `true` iff the credential is accepted. Never errors; every failure
	/// is a rejection.
	async fn validate(&self, credential: &SecretString) -> bool;
}

/// [`CallerAuthenticator`] backed by a GitHub workflow dispatch.
#[derive(Debug, Clone)]
pub struct DispatchAuthenticator {
	config: DispatchConfig,
	http_client: reqwest::Client,
}

impl DispatchAuthenticator {
	#[tracing::instrument(skip_all, name = "DispatchAuthenticator::new")]
	pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
		let http_client = vend_common_http::new_client_with_timeout(config.timeout)?;
		Ok(Self {
			config,
			http_client,
		})
	}

	pub fn config(&self) -> &DispatchConfig {
		&self.config
	}

	/// Repository to dispatch against, read fresh so a remounted binding
	/// takes effect without a restart.
	pub async fn repository(&self) -> String {
		match tokio::fs::read_to_string(&self.config.repository_file).await {
			Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
			Ok(_) => {
				tracing::info!(
					path = %self.config.repository_file.display(),
					default = %self.config.default_repository,
					"repository file is empty, using default repository"
				);
				self.config.default_repository.clone()
			}
			Err(e) => {
				tracing::info!(
					path = %self.config.repository_file.display(),
					default = %self.config.default_repository,
					error = %e,
					"repository file unreadable, using default repository"
				);
				self.config.default_repository.clone()
			}
		}
	}

	fn dispatch_url(&self, repository: &str) -> String {
		format!(
			"{}/repos/{}/actions/workflows/{}/dispatches",
			self.config.api_base_url.trim_end_matches('/'),
			repository,
			self.config.workflow
		)
	}

	/// Fire one workflow dispatch with the caller's credential.
	#[tracing::instrument(skip(self, credential), name = "DispatchAuthenticator::dispatch")]
	pub async fn dispatch(&self, credential: &SecretString) -> Result<(), DispatchError> {
		let repository = self.repository().await;
		let url = self.dispatch_url(&repository);
		if credential.is_empty() {
			tracing::debug!("no credential presented, dispatching anyway");
		}

		let mut authorization = HeaderValue::from_str(&format!("token {}", credential.expose()))
			.map_err(|_| DispatchError::MalformedCredential)?;
		authorization.set_sensitive(true);

		let mut headers = HeaderMap::new();
		headers.insert(AUTHORIZATION, authorization);
		headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_V3_ACCEPT));

		let response = self
			.http_client
			.post(&url)
			.headers(headers)
			.json(&serde_json::json!({ "ref": self.config.git_ref }))
			.send()
			.await?;

		let status = response.status();
		if status == StatusCode::NO_CONTENT {
			tracing::debug!(%repository, "workflow dispatch accepted");
			return Ok(());
		}

		let response_headers = response.headers().clone();
		let body = response.text().await.unwrap_or_default();
		tracing::warn!(
			%url,
			%status,
			headers = ?response_headers,
			%body,
			"workflow dispatch rejected"
		);
		Err(DispatchError::Rejected(status))
	}
}

#[async_trait]
impl CallerAuthenticator for DispatchAuthenticator {
	async fn validate(&self, credential: &SecretString) -> bool {
		match self.dispatch(credential).await {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(error = %e, "caller authentication failed");
				false
			}
		}
	}
}
