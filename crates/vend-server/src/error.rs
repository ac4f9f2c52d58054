// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request-level errors and their HTTP mapping.

use std::sync::Arc;

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use vend_server_identity::IdentityError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// Everything that can end a token request early.
#[derive(Debug, thiserror::Error)]
pub enum VendError {
	#[error("caller authentication failed")]
	AuthenticationFailure,

	#[error("{0}")]
	InvalidRequestId(String),

	#[error(transparent)]
	Identity(Arc<IdentityError>),

	/// The shared vending task stopped without reporting back.
	#[error("vending task ended without a result")]
	Abandoned,
}

impl VendError {
	/// Client went away or the server is stopping; not a service fault.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, VendError::Identity(e) if matches!(**e, IdentityError::Cancelled))
	}
}

impl From<IdentityError> for VendError {
	fn from(err: IdentityError) -> Self {
		match err {
			IdentityError::InvalidRequestId { .. } => VendError::InvalidRequestId(err.to_string()),
			other => VendError::Identity(Arc::new(other)),
		}
	}
}

impl From<Arc<IdentityError>> for VendError {
	fn from(err: Arc<IdentityError>) -> Self {
		VendError::Identity(err)
	}
}

impl IntoResponse for VendError {
	fn into_response(self) -> Response {
		match self {
			VendError::AuthenticationFailure => (
				StatusCode::UNAUTHORIZED,
				Json(ErrorResponse {
					error: "unauthorized".to_string(),
					message: "Unauthorized request".to_string(),
				}),
			)
				.into_response(),
			VendError::InvalidRequestId(message) => (
				StatusCode::BAD_REQUEST,
				Json(ErrorResponse {
					error: "invalid_request_id".to_string(),
					message,
				}),
			)
				.into_response(),
			VendError::Identity(_) | VendError::Abandoned => {
				StatusCode::INTERNAL_SERVER_ERROR.into_response()
			}
		}
	}
}
