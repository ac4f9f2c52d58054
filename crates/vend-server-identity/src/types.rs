// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity types.

use std::fmt;
use std::str::FromStr;

use vend_common_secret::SecretString;

use crate::error::IdentityError;

/// Longest accepted request id. With a 16 character prefix the generated
/// namespace name still fits a 63 character DNS label.
pub const MAX_REQUEST_ID_LEN: usize = 40;

/// Caller-supplied identifier for a CI run, safe to embed in resource names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
	pub fn parse(raw: &str) -> Result<Self, IdentityError> {
		let invalid = |reason| IdentityError::InvalidRequestId {
			id: raw.to_string(),
			reason,
		};

		if raw.is_empty() {
			return Err(invalid("must not be empty"));
		}
		if raw.len() > MAX_REQUEST_ID_LEN {
			return Err(invalid("must be at most 40 characters"));
		}
		if !raw
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
		{
			return Err(invalid("only lowercase letters, digits and '-' are allowed"));
		}
		if raw.starts_with('-') || raw.ends_with('-') {
			return Err(invalid("must start and end with a letter or digit"));
		}

		Ok(Self(raw.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for RequestId {
	type Err = IdentityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl AsRef<str> for RequestId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// The cluster objects that together make up one vended identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedIdentity {
	pub request_id: RequestId,
	pub namespace: String,
	pub service_account: String,
	pub role: Option<String>,
	pub role_binding: Option<String>,
	/// Explicitly created token secret, if any.
	pub token_secret: Option<String>,
	/// Whether the namespace was created for this identity alone.
	pub owns_namespace: bool,
}

/// What the caller gets back.
#[derive(Debug, Clone)]
pub struct VendedToken {
	pub namespace: String,
	pub token: SecretString,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn accepts_typical_ids() {
		for id in ["pr-123", "a", "0", "release-2025-01-01", "abc123"] {
			assert_eq!(RequestId::parse(id).unwrap().as_str(), id);
		}
	}

	#[test]
	fn rejects_unsafe_ids() {
		for id in ["", "-pr", "pr-", "PR-1", "pr_1", "pr.1", "pr/1", "pr 1", "ünï"] {
			assert!(
				matches!(RequestId::parse(id), Err(IdentityError::InvalidRequestId { .. })),
				"{id:?} should be rejected"
			);
		}
	}

	#[test]
	fn length_limit() {
		assert!(RequestId::parse(&"a".repeat(MAX_REQUEST_ID_LEN)).is_ok());
		assert!(RequestId::parse(&"a".repeat(MAX_REQUEST_ID_LEN + 1)).is_err());
	}

	proptest! {
		#[test]
		fn valid_pattern_always_parses(id in "[a-z0-9]([a-z0-9-]{0,38}[a-z0-9])?") {
			let parsed = RequestId::parse(&id).unwrap();
			prop_assert_eq!(parsed.to_string(), id);
		}

		#[test]
		fn parsed_ids_are_dns_label_safe(id in "\\PC{0,50}") {
			if let Ok(parsed) = RequestId::parse(&id) {
				let s = parsed.as_str();
				prop_assert!(s.len() <= MAX_REQUEST_ID_LEN);
				prop_assert!(s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
				prop_assert!(!s.starts_with('-') && !s.ends_with('-'));
			}
		}
	}
}
