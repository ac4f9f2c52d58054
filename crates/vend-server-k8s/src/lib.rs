// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for scoped CI identity provisioning.
//!
//! [`K8sClient`] is the seam the provisioner and resolver talk through;
//! [`KubeClient`] is the real implementation and [`MockK8sClient`] an
//! in-memory cluster for tests.

mod client;
mod error;
mod kube_client;
pub mod mock;
pub mod types;

pub use client::K8sClient;
pub use error::K8sError;
pub use kube_client::KubeClient;
pub use mock::{MockK8sClient, MockOperation, TokenController};
pub use types::*;
