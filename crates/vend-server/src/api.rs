// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router.

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use vend_server_auth_github::CallerAuthenticator;
use vend_server_identity::{IdentityProvisioner, SecretResolver};

use crate::routes;
use crate::vending::VendingService;

#[derive(Clone)]
pub struct AppState {
	pub vending: Arc<VendingService>,
}

/// Build the shared state. Cancelling `shutdown` aborts every vending run
/// still in flight.
pub fn create_app_state(
	authenticator: Arc<dyn CallerAuthenticator>,
	provisioner: Arc<dyn IdentityProvisioner>,
	resolver: Arc<SecretResolver>,
	shutdown: CancellationToken,
) -> AppState {
	AppState {
		vending: Arc::new(VendingService::new(
			authenticator,
			provisioner,
			resolver,
			shutdown,
		)),
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route(
			"/api/token/{id}",
			get(routes::token::vend_token).delete(routes::token::revoke_token),
		)
		.with_state(state)
}
