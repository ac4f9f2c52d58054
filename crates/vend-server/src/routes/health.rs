// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Liveness endpoint.

use axum::{response::IntoResponse, Json};
use serde::Serialize;

use crate::version::VERSION;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub version: &'static str,
}

/// GET /health - process is up. Touches neither GitHub nor the cluster.
pub async fn health_check() -> impl IntoResponse {
	Json(HealthResponse {
		status: "ok",
		version: VERSION,
	})
}
