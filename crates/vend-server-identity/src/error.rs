// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provisioning error types.

use std::fmt;

use vend_server_k8s::K8sError;

/// Provisioning step that was being executed when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
	Namespace,
	ServiceAccount,
	Role,
	RoleBinding,
	TokenSecret,
}

impl fmt::Display for ProvisionStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ProvisionStep::Namespace => "namespace",
			ProvisionStep::ServiceAccount => "service account",
			ProvisionStep::Role => "role",
			ProvisionStep::RoleBinding => "role binding",
			ProvisionStep::TokenSecret => "token secret",
		};
		f.write_str(s)
	}
}

/// Errors that can occur while vending a scoped identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
	/// Caller supplied an identifier that cannot be embedded in resource names
	#[error("Invalid request id {id:?}: {reason}")]
	InvalidRequestId { id: String, reason: &'static str },

	/// A create call failed; already-created objects have been rolled back
	#[error("Provisioning failed creating {step}: {source}")]
	ProvisioningFailure {
		step: ProvisionStep,
		#[source]
		source: K8sError,
	},

	/// A delete call failed
	#[error("Teardown failed for {target}: {source}")]
	TeardownFailure {
		target: String,
		#[source]
		source: K8sError,
	},

	/// Nothing labelled for this request id exists
	#[error("No identity found for request id {id}")]
	IdentityNotFound { id: String },

	/// The token controller never produced a usable secret
	#[error("Token secret not ready after {attempts} attempts")]
	SecretTimeout { attempts: u32 },

	/// Enough secrets were attached but none carries a token
	#[error("No service-account token secret attached to {service_account}")]
	SecretNotFound { service_account: String },

	/// Token bytes are not UTF-8
	#[error("Token in secret {secret} is not valid UTF-8")]
	InvalidToken { secret: String },

	/// The waiting request went away or the server is shutting down
	#[error("Operation cancelled")]
	Cancelled,

	/// Kubernetes error
	#[error(transparent)]
	K8s(#[from] K8sError),
}
