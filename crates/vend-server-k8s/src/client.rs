// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{Namespace, Role, RoleBinding, Secret, ServiceAccount};

/// Trait for K8s client operations.
///
/// Covers exactly the objects a scoped CI identity is made of, so the
/// provisioner and resolver can be exercised against an in-memory cluster.
/// Not-found and conflict responses surface as [`K8sError::NotFound`] and
/// [`K8sError::AlreadyExists`].
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a namespace. `metadata.generate_name` is honoured; the returned
	/// object carries the final name.
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError>;

	/// Delete a namespace; the cluster cascades to everything inside it.
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

	/// List namespaces matching a label selector.
	async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, K8sError>;

	async fn create_service_account(
		&self,
		namespace: &str,
		service_account: ServiceAccount,
	) -> Result<ServiceAccount, K8sError>;

	async fn get_service_account(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<ServiceAccount, K8sError>;

	async fn delete_service_account(&self, name: &str, namespace: &str) -> Result<(), K8sError>;

	/// List service-accounts in a namespace matching a label selector.
	async fn list_service_accounts(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ServiceAccount>, K8sError>;

	async fn create_role(&self, namespace: &str, role: Role) -> Result<Role, K8sError>;

	async fn delete_role(&self, name: &str, namespace: &str) -> Result<(), K8sError>;

	async fn create_role_binding(
		&self,
		namespace: &str,
		role_binding: RoleBinding,
	) -> Result<RoleBinding, K8sError>;

	async fn delete_role_binding(&self, name: &str, namespace: &str) -> Result<(), K8sError>;

	async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, K8sError>;

	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError>;

	async fn delete_secret(&self, name: &str, namespace: &str) -> Result<(), K8sError>;
}
