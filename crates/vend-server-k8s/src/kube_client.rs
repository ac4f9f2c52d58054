// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use kube::{
	api::{Api, DeleteParams, ListParams, PostParams},
	Client,
};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{Namespace, ObjectMeta, Role, RoleBinding, Secret, ServiceAccount};

/// Production K8s client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self { client }
	}
}

/// Name used in error messages: the final name if set, otherwise the
/// generate-name prefix.
fn display_name(meta: &ObjectMeta) -> String {
	meta
		.name
		.clone()
		.or_else(|| meta.generate_name.clone())
		.unwrap_or_default()
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, namespace), fields(name = %display_name(&namespace.metadata)))]
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError> {
		let api: Api<Namespace> = Api::all(self.client.clone());
		let name = display_name(&namespace.metadata);
		api
			.create(&PostParams::default(), &namespace)
			.await
			.map_err(|e| K8sError::from_kube(e, "Namespace", &name))
	}

	#[instrument(skip(self))]
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let api: Api<Namespace> = Api::all(self.client.clone());
		api
			.delete(name, &DeleteParams::background())
			.await
			.map(|_| ())
			.map_err(|e| K8sError::from_kube(e, "Namespace", name))
	}

	async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, K8sError> {
		let api: Api<Namespace> = Api::all(self.client.clone());
		let list = api.list(&ListParams::default().labels(label_selector)).await?;
		Ok(list.items)
	}

	#[instrument(skip(self, service_account), fields(name = %display_name(&service_account.metadata)))]
	async fn create_service_account(
		&self,
		namespace: &str,
		service_account: ServiceAccount,
	) -> Result<ServiceAccount, K8sError> {
		let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		let name = display_name(&service_account.metadata);
		api
			.create(&PostParams::default(), &service_account)
			.await
			.map_err(|e| K8sError::from_kube(e, "ServiceAccount", &name))
	}

	async fn get_service_account(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<ServiceAccount, K8sError> {
		let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		api
			.get(name)
			.await
			.map_err(|e| K8sError::from_kube(e, "ServiceAccount", name))
	}

	#[instrument(skip(self))]
	async fn delete_service_account(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		api
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| K8sError::from_kube(e, "ServiceAccount", name))
	}

	async fn list_service_accounts(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ServiceAccount>, K8sError> {
		let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		let list = api.list(&ListParams::default().labels(label_selector)).await?;
		Ok(list.items)
	}

	#[instrument(skip(self, role), fields(name = %display_name(&role.metadata)))]
	async fn create_role(&self, namespace: &str, role: Role) -> Result<Role, K8sError> {
		let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
		let name = display_name(&role.metadata);
		api
			.create(&PostParams::default(), &role)
			.await
			.map_err(|e| K8sError::from_kube(e, "Role", &name))
	}

	#[instrument(skip(self))]
	async fn delete_role(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
		api
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| K8sError::from_kube(e, "Role", name))
	}

	#[instrument(skip(self, role_binding), fields(name = %display_name(&role_binding.metadata)))]
	async fn create_role_binding(
		&self,
		namespace: &str,
		role_binding: RoleBinding,
	) -> Result<RoleBinding, K8sError> {
		let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
		let name = display_name(&role_binding.metadata);
		api
			.create(&PostParams::default(), &role_binding)
			.await
			.map_err(|e| K8sError::from_kube(e, "RoleBinding", &name))
	}

	#[instrument(skip(self))]
	async fn delete_role_binding(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
		api
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| K8sError::from_kube(e, "RoleBinding", name))
	}

	#[instrument(skip(self, secret), fields(name = %display_name(&secret.metadata)))]
	async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, K8sError> {
		let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
		let name = display_name(&secret.metadata);
		api
			.create(&PostParams::default(), &secret)
			.await
			.map_err(|e| K8sError::from_kube(e, "Secret", &name))
	}

	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError> {
		let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
		api
			.get(name)
			.await
			.map_err(|e| K8sError::from_kube(e, "Secret", name))
	}

	#[instrument(skip(self))]
	async fn delete_secret(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
		api
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| K8sError::from_kube(e, "Secret", name))
	}
}
