// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable, all-optional view of the server configuration.

use serde::{Deserialize, Serialize};

use crate::sections::{
	GitHubConfigLayer, HttpConfigLayer, IdentityConfigLayer, LoggingConfigLayer, ResolverConfigLayer,
};

/// One source's contribution to the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigLayer {
	pub http: Option<HttpConfigLayer>,
	pub github: Option<GitHubConfigLayer>,
	pub identity: Option<IdentityConfigLayer>,
	pub resolver: Option<ResolverConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T: Default>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(other) = other {
		merge(base.get_or_insert_with(T::default), other);
	}
}

impl ServerConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.github, other.github, GitHubConfigLayer::merge);
		merge_section(&mut self.identity, other.identity, IdentityConfigLayer::merge);
		merge_section(&mut self.resolver, other.resolver, ResolverConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_combines_sections_fieldwise() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Some("127.0.0.1".to_string()),
				port: Some(7080),
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(9000),
			}),
			resolver: Some(ResolverConfigLayer {
				max_attempts: Some(3),
				..Default::default()
			}),
			..Default::default()
		});

		let http = base.http.unwrap();
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
		assert_eq!(http.port, Some(9000));
		assert_eq!(base.resolver.unwrap().max_attempts, Some(3));
		assert!(base.identity.is_none());
	}
}
