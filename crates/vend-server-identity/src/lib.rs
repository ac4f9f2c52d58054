// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scoped CI identity provisioning for vend.
//!
//! A vended identity is a service account with namespace-scoped RBAC. The
//! [`Provisioner`] creates and removes those objects, the [`SecretResolver`]
//! waits for the cluster to issue the account's token, and the
//! [`InflightRegistry`] collapses concurrent requests for the same id into
//! one operation.

pub mod config;
pub mod error;
pub mod inflight;
pub mod provisioner;
pub mod resolver;
pub mod types;

pub use config::{IdentityConfig, IdentityStrategy, ReadinessPolicy, ResolverConfig, RoleRule};
pub use error::{IdentityError, ProvisionStep};
pub use inflight::InflightRegistry;
pub use provisioner::{
	ownership_selector, IdentityProvisioner, Provisioner, MANAGED_LABEL, REQUEST_ID_LABEL,
};
pub use resolver::SecretResolver;
pub use types::{RequestId, ScopedIdentity, VendedToken, MAX_REQUEST_ID_LEN};
