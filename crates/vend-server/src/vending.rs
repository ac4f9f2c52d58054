// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request orchestration: authenticate, then vend or revoke.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vend_common_secret::SecretString;
use vend_server_auth_github::CallerAuthenticator;
use vend_server_identity::{
	IdentityError, IdentityProvisioner, InflightRegistry, RequestId, SecretResolver, VendedToken,
};

use crate::error::VendError;

type VendOutcome = Result<VendedToken, Arc<IdentityError>>;

/// Ties the authenticator, provisioner and resolver together.
pub struct VendingService {
	authenticator: Arc<dyn CallerAuthenticator>,
	provisioner: Arc<dyn IdentityProvisioner>,
	resolver: Arc<SecretResolver>,
	inflight: InflightRegistry<VendOutcome>,
}

impl VendingService {
	pub fn new(
		authenticator: Arc<dyn CallerAuthenticator>,
		provisioner: Arc<dyn IdentityProvisioner>,
		resolver: Arc<SecretResolver>,
		shutdown: CancellationToken,
	) -> Self {
		Self {
			authenticator,
			provisioner,
			resolver,
			inflight: InflightRegistry::new(shutdown),
		}
	}

	async fn authenticate(&self, credential: &SecretString) -> Result<(), VendError> {
		if self.authenticator.validate(credential).await {
			Ok(())
		} else {
			tracing::warn!("rejecting unauthenticated request");
			Err(VendError::AuthenticationFailure)
		}
	}

	/// Provision an identity for `raw_id` and return its token.
	///
	/// Concurrent calls for the same id share one provisioning run.
	#[tracing::instrument(skip(self, credential), fields(id = %raw_id))]
	pub async fn vend(&self, raw_id: &str, credential: &SecretString) -> Result<VendedToken, VendError> {
		self.authenticate(credential).await?;
		let id = RequestId::parse(raw_id)?;

		let key = id.to_string();
		let provisioner = self.provisioner.clone();
		let resolver = self.resolver.clone();
		let outcome = self
			.inflight
			.run(&key, move |cancel| create_identity(provisioner, resolver, id, cancel))
			.await;

		match outcome {
			Some(Ok(vended)) => Ok(vended),
			Some(Err(e)) => {
				let err = VendError::from(e);
				log_failure("vend", raw_id, &err);
				Err(err)
			}
			None => {
				tracing::error!(id = raw_id, "vending task ended without a result");
				Err(VendError::Abandoned)
			}
		}
	}

	/// Remove every identity vended for `raw_id`. Returns how many were removed.
	#[tracing::instrument(skip(self, credential), fields(id = %raw_id))]
	pub async fn revoke(&self, raw_id: &str, credential: &SecretString) -> Result<usize, VendError> {
		self.authenticate(credential).await?;
		let id = RequestId::parse(raw_id)?;

		let result = self.revoke_all(&id).await;
		if let Err(err) = &result {
			log_failure("revoke", raw_id, err);
		}
		result
	}

	async fn revoke_all(&self, id: &RequestId) -> Result<usize, VendError> {
		let identities = self.provisioner.find(id).await?;
		if identities.is_empty() {
			return Err(IdentityError::IdentityNotFound { id: id.to_string() }.into());
		}
		let mut first_error = None;
		for identity in &identities {
			if let Err(e) = self.provisioner.teardown(identity).await {
				tracing::warn!(namespace = %identity.namespace, error = %e, "teardown failed");
				first_error.get_or_insert(e);
			}
		}
		if let Some(e) = first_error {
			return Err(e.into());
		}
		tracing::info!(removed = identities.len(), "revoked scoped identities");
		Ok(identities.len())
	}
}

fn log_failure(operation: &str, id: &str, err: &VendError) {
	if err.is_cancelled() {
		tracing::info!(operation, id, "request cancelled");
	} else {
		tracing::error!(operation, id, error = %err, "request failed");
	}
}

/// Provision and resolve; a resolution failure tears the fresh identity
/// down again.
async fn create_identity(
	provisioner: Arc<dyn IdentityProvisioner>,
	resolver: Arc<SecretResolver>,
	id: RequestId,
	cancel: CancellationToken,
) -> VendOutcome {
	let identity = provisioner.provision(&id, &cancel).await.map_err(Arc::new)?;

	match resolver.resolve_token(&identity, &cancel).await {
		Ok(token) => Ok(VendedToken {
			namespace: identity.namespace,
			token,
		}),
		Err(e) => {
			tracing::warn!(
				id = %id,
				namespace = %identity.namespace,
				error = %e,
				"token resolution failed, removing identity"
			);
			if let Err(teardown) = provisioner.teardown(&identity).await {
				tracing::warn!(id = %id, error = %teardown, "cleanup after failed resolution failed");
			}
			Err(Arc::new(e))
		}
	}
}
