// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum K8sError {
	#[error("K8s API error ({code}): {message}")]
	ApiError { code: u16, message: String },

	#[error("{kind} not found: {name}")]
	NotFound { kind: &'static str, name: String },

	#[error("{kind} already exists: {name}")]
	AlreadyExists { kind: &'static str, name: String },

	#[error("K8s API unreachable: {message}")]
	Unavailable { message: String },
}

impl K8sError {
	/// Map a kube error for an operation on `kind`/`name`, keeping 404 and
	/// 409 distinguishable from other API failures.
	pub fn from_kube(err: kube::Error, kind: &'static str, name: &str) -> Self {
		match err {
			kube::Error::Api(resp) if resp.code == 404 => K8sError::NotFound {
				kind,
				name: name.to_string(),
			},
			kube::Error::Api(resp) if resp.code == 409 => K8sError::AlreadyExists {
				kind,
				name: name.to_string(),
			},
			other => other.into(),
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, K8sError::NotFound { .. })
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(resp) => K8sError::ApiError {
				code: resp.code,
				message: resp.message,
			},
			other => K8sError::Unavailable {
				message: other.to_string(),
			},
		}
	}
}
