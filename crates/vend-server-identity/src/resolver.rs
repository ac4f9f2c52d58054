// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Waits for the cluster to issue a service-account token and reads it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vend_common_secret::SecretString;
use vend_server_k8s::{K8sClient, Secret, SERVICE_ACCOUNT_TOKEN_TYPE, TOKEN_DATA_KEY};

use crate::config::{ReadinessPolicy, ResolverConfig};
use crate::error::IdentityError;
use crate::types::ScopedIdentity;

/// What a scan over a service account's secrets found.
enum Scan {
	Ready(SecretString),
	/// A token secret exists but the controller has not filled it yet.
	Unpopulated,
	NoTokenSecret,
}

/// Extract the bearer token if `secret` is a populated token secret.
fn token_from(secret: &Secret) -> Result<Option<SecretString>, IdentityError> {
	let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(TOKEN_DATA_KEY)) else {
		return Ok(None);
	};
	if bytes.0.is_empty() {
		return Ok(None);
	}
	let token = String::from_utf8(bytes.0.clone()).map_err(|_| IdentityError::InvalidToken {
		secret: secret.metadata.name.clone().unwrap_or_default(),
	})?;
	Ok(Some(SecretString::new(token)))
}

fn is_token_secret(secret: &Secret) -> bool {
	secret.type_.as_deref() == Some(SERVICE_ACCOUNT_TOKEN_TYPE)
}

/// Bounded, cancellable poll for a service-account token.
pub struct SecretResolver {
	client: Arc<dyn K8sClient>,
	config: ResolverConfig,
}

impl SecretResolver {
	pub fn new(client: Arc<dyn K8sClient>, config: ResolverConfig) -> Self {
		Self { client, config }
	}

	pub fn config(&self) -> &ResolverConfig {
		&self.config
	}

	/// Fetch each named secret in turn and return the first usable token.
	async fn scan(&self, namespace: &str, names: &[String]) -> Result<Scan, IdentityError> {
		let mut outcome = Scan::NoTokenSecret;
		for name in names {
			let secret = self.client.get_secret(name, namespace).await?;
			if !is_token_secret(&secret) {
				continue;
			}
			if let Some(token) = token_from(&secret)? {
				tracing::debug!(secret = %name, "found service-account token");
				return Ok(Scan::Ready(token));
			}
			outcome = Scan::Unpopulated;
		}
		Ok(outcome)
	}

	/// Poll until the identity's token is available.
	///
	/// Makes at most `max_attempts` service-account reads with `interval`
	/// between them. Any fetch error ends the wait immediately.
	#[tracing::instrument(
		skip(self, identity, cancel),
		fields(namespace = %identity.namespace, service_account = %identity.service_account)
	)]
	pub async fn resolve_token(
		&self,
		identity: &ScopedIdentity,
		cancel: &CancellationToken,
	) -> Result<SecretString, IdentityError> {
		let max_attempts = self.config.max_attempts.max(1);

		for attempt in 1..=max_attempts {
			if cancel.is_cancelled() {
				return Err(IdentityError::Cancelled);
			}

			let sa = self
				.client
				.get_service_account(&identity.service_account, &identity.namespace)
				.await?;
			let attached: Vec<String> = sa
				.secrets
				.unwrap_or_default()
				.into_iter()
				.filter_map(|r| r.name)
				.collect();
			tracing::debug!(attempt, attached = attached.len(), "checked service account");

			match self.config.readiness {
				ReadinessPolicy::TokenSecretPresent => {
					let mut candidates = Vec::with_capacity(attached.len() + 1);
					if let Some(explicit) = &identity.token_secret {
						candidates.push(explicit.clone());
					}
					for name in attached {
						if !candidates.contains(&name) {
							candidates.push(name);
						}
					}
					if let Scan::Ready(token) = self.scan(&identity.namespace, &candidates).await? {
						return Ok(token);
					}
				}
				ReadinessPolicy::MinSecrets(min) => {
					if attached.len() >= min {
						match self.scan(&identity.namespace, &attached).await? {
							Scan::Ready(token) => return Ok(token),
							Scan::Unpopulated => {
								tracing::debug!(attempt, "token secret attached but not yet populated");
							}
							Scan::NoTokenSecret => {
								return Err(IdentityError::SecretNotFound {
									service_account: identity.service_account.clone(),
								});
							}
						}
					}
				}
			}

			if attempt < max_attempts {
				tokio::select! {
					_ = cancel.cancelled() => return Err(IdentityError::Cancelled),
					_ = tokio::time::sleep(self.config.interval) => {}
				}
			}
		}

		tracing::warn!(attempts = max_attempts, "service-account token never became ready");
		Err(IdentityError::SecretTimeout {
			attempts: max_attempts,
		})
	}
}
