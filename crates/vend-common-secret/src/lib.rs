// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for the two sensitive strings the vending service
//! handles: the caller's GitHub credential and the service-account token
//! handed back to CI.
//!
//! A [`Secret<T>`]:
//!
//! - prints `[REDACTED]` through `Debug` and `Display`, so `tracing` fields
//!   recorded with `%` or `?` never leak the value
//! - serializes as `"[REDACTED]"`
//! - is zeroized on drop
//! - only hands out its value through [`Secret::expose`]
//!
//! ```
//! use vend_common_secret::SecretString;
//!
//! let credential = SecretString::new("ghs_abc123".to_string());
//! assert_eq!(format!("{credential}"), "[REDACTED]");
//! assert_eq!(credential.expose(), "ghs_abc123");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never reach logs or serialized output.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret strings are the only kind this service deals in.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the wrapped value. Every call site is a place the secret
	/// leaves the wrapper, so keep them few and obvious.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Return an owned copy of the value; the wrapper itself is still
	/// zeroized when dropped.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// True when no credential was presented at all.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_hide_the_credential() {
		let credential = SecretString::from("ghs_live_credential");

		let debug = format!("{credential:?}");
		let display = format!("{credential}");

		assert!(!debug.contains("ghs_live_credential"));
		assert!(debug.contains(REDACTED));
		assert_eq!(display, REDACTED);
	}

	#[test]
	fn expose_returns_the_wrapped_value() {
		let token = SecretString::new("eyJhbGciOiJSUzI1NiJ9.payload.sig".to_string());
		assert_eq!(token.expose(), "eyJhbGciOiJSUzI1NiJ9.payload.sig");
		assert_eq!(token.into_inner(), "eyJhbGciOiJSUzI1NiJ9.payload.sig");
	}

	#[test]
	fn empty_credential_is_detected() {
		assert!(SecretString::from("").is_empty());
		assert!(!SecretString::from("x").is_empty());
	}

	#[test]
	fn optional_secret_is_redacted_too() {
		let credential = Some(SecretString::from("ghs_optional"));
		let debug = format!("{credential:?}");
		assert!(!debug.contains("ghs_optional"));
	}

	#[cfg(feature = "serde")]
	#[test]
	fn serialization_is_redacted_but_deserialization_is_not() {
		let json = serde_json::to_string(&SecretString::from("ghs_serialized")).unwrap();
		assert_eq!(json, format!("\"{REDACTED}\""));

		let parsed: SecretString = serde_json::from_str("\"ghs_from_file\"").unwrap();
		assert_eq!(parsed.expose(), "ghs_from_file");
	}

	proptest! {
		#[test]
		fn formatted_output_never_contains_value(inner in "[a-zA-Z0-9_.-]{4,64}") {
			prop_assume!(!inner.contains("REDACTED"));
			prop_assume!(!inner.contains("Secret"));

			let secret = SecretString::new(inner.clone());
			let debug = format!("{secret:?}");
			let display = format!("{secret}");
			prop_assert!(!debug.contains(&inner));
			prop_assert!(!display.contains(&inner));
		}
	}
}
