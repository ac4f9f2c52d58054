// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared outbound HTTP client for the vending service.
//!
//! Every outbound call carries the same User-Agent and an explicit timeout;
//! there is no retry layer because the GitHub oracle call must be issued
//! exactly once per validation.

mod client;

pub use client::{builder, new_client_with_timeout, user_agent, DEFAULT_TIMEOUT};
