// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token vending routes.
//!
//! Endpoints:
//! - `GET /api/token/{id}` - provision a scoped identity and return its token
//! - `DELETE /api/token/{id}` - remove the identities vended for `id`

use axum::{
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use vend_common_secret::SecretString;

use crate::api::AppState;

pub const GITHUB_TOKEN_HEADER: &str = "x-github-token";

#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub namespace: String,
	pub token: String,
}

/// Credential from `X-GitHub-Token`; absent means empty.
fn credential(headers: &HeaderMap) -> SecretString {
	headers
		.get(GITHUB_TOKEN_HEADER)
		.map(|v| SecretString::new(String::from_utf8_lossy(v.as_bytes()).into_owned()))
		.unwrap_or_else(|| SecretString::from(""))
}

pub async fn vend_token(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Response {
	match state.vending.vend(&id, &credential(&headers)).await {
		Ok(vended) => (
			StatusCode::OK,
			Json(TokenResponse {
				namespace: vended.namespace,
				token: vended.token.into_inner(),
			}),
		)
			.into_response(),
		Err(e) => e.into_response(),
	}
}

pub async fn revoke_token(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Response {
	match state.vending.revoke(&id, &credential(&headers)).await {
		Ok(_) => StatusCode::OK.into_response(),
		Err(e) => e.into_response(),
	}
}
