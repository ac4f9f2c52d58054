// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP server vending scoped CI credentials.
//!
//! `GET /api/token/{id}` provisions a namespace-scoped service account for a
//! CI run and returns its token; `DELETE /api/token/{id}` removes it. Both
//! require an `X-GitHub-Token` header that may dispatch the configured
//! workflow.

pub mod api;
pub mod error;
pub mod routes;
pub mod vending;
pub mod version;

pub use api::{create_app_state, create_router, AppState};
pub use error::{ErrorResponse, VendError};
pub use vending::VendingService;
