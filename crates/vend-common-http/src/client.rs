// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Timeout applied when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client builder with the standard User-Agent and [`DEFAULT_TIMEOUT`].
///
/// Use this when the client needs further customisation.
///
/// # Example
/// ```ignore
/// let client = vend_common_http::builder()
///     .timeout(Duration::from_secs(3))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.timeout(DEFAULT_TIMEOUT)
}

/// Build a client with the standard User-Agent and the given timeout.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// Format: `vend/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"vend/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_names_the_service_and_platform() {
		let ua = user_agent();
		assert!(ua.starts_with("vend/"));
		assert!(ua.contains(std::env::consts::OS));
		assert!(ua.ends_with(')'));
	}

	#[test]
	fn client_with_custom_timeout_builds() {
		assert!(new_client_with_timeout(Duration::from_millis(250)).is_ok());
	}
}
