// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory [`K8sClient`] for tests.
//!
//! The mock keeps a tiny object store, honours `generateName`, cascades
//! namespace deletion, and can simulate the cluster's token controller
//! attaching token secrets a few reads after a service-account appears.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{
	ByteString, Namespace, ObjectMeta, ObjectReference, Role, RoleBinding, Secret, ServiceAccount,
	SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE, TOKEN_DATA_KEY,
};

const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Operations the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
	CreateNamespace,
	DeleteNamespace,
	ListNamespaces,
	CreateServiceAccount,
	GetServiceAccount,
	DeleteServiceAccount,
	ListServiceAccounts,
	CreateRole,
	DeleteRole,
	CreateRoleBinding,
	DeleteRoleBinding,
	CreateSecret,
	GetSecret,
	DeleteSecret,
}

impl MockOperation {
	fn is_mutation(self) -> bool {
		!matches!(
			self,
			MockOperation::ListNamespaces
				| MockOperation::GetServiceAccount
				| MockOperation::ListServiceAccounts
				| MockOperation::GetSecret
		)
	}
}

/// Simulated token controller.
#[derive(Debug, Clone)]
pub struct TokenController {
	/// The read of a service-account on which its token appears (1 = first read).
	pub ready_after_reads: u32,
	/// Token written into every token secret the controller populates.
	pub token: String,
	/// Also attach an image-pull secret, the way older clusters did.
	pub attach_pull_secret: bool,
}

type Key = (String, String);

#[derive(Default)]
struct ClusterState {
	namespaces: BTreeMap<String, Namespace>,
	service_accounts: BTreeMap<Key, ServiceAccount>,
	roles: BTreeMap<Key, Role>,
	role_bindings: BTreeMap<Key, RoleBinding>,
	secrets: BTreeMap<Key, Secret>,
	service_account_reads: HashMap<Key, u32>,
	failures: HashSet<MockOperation>,
	calls: Vec<MockOperation>,
	generated: u64,
}

impl ClusterState {
	fn record(&mut self, op: MockOperation) -> Result<(), K8sError> {
		self.calls.push(op);
		if self.failures.contains(&op) {
			return Err(K8sError::ApiError {
				code: 500,
				message: format!("injected failure for {op:?}"),
			});
		}
		Ok(())
	}

	fn next_suffix(&mut self) -> String {
		self.generated += 1;
		let mut n = self.generated;
		let base = SUFFIX_ALPHABET.len() as u64;
		(0..5)
			.map(|_| {
				let c = SUFFIX_ALPHABET[(n % base) as usize] as char;
				n /= base;
				c
			})
			.collect()
	}

	fn assign_name(&mut self, meta: &mut ObjectMeta) -> String {
		if meta.name.is_none() {
			let prefix = meta.generate_name.clone().unwrap_or_default();
			meta.name = Some(format!("{prefix}{}", self.next_suffix()));
		}
		meta.name.clone().unwrap_or_default()
	}

	fn require_namespace(&self, namespace: &str) -> Result<(), K8sError> {
		if self.namespaces.contains_key(namespace) {
			Ok(())
		} else {
			Err(K8sError::NotFound {
				kind: "Namespace",
				name: namespace.to_string(),
			})
		}
	}

	fn run_token_controller(&mut self, controller: &TokenController, key: &Key) {
		let (namespace, sa_name) = key;

		let mut filled = false;
		for ((ns, _), secret) in self.secrets.iter_mut() {
			let annotated_for_sa = secret
				.metadata
				.annotations
				.as_ref()
				.and_then(|a| a.get(SERVICE_ACCOUNT_NAME_ANNOTATION))
				.is_some_and(|v| v == sa_name);
			if ns == namespace
				&& annotated_for_sa
				&& secret.type_.as_deref() == Some(SERVICE_ACCOUNT_TOKEN_TYPE)
			{
				secret
					.data
					.get_or_insert_with(BTreeMap::new)
					.entry(TOKEN_DATA_KEY.to_string())
					.or_insert_with(|| ByteString(controller.token.clone().into_bytes()));
				filled = true;
			}
		}
		if filled {
			return;
		}

		let already_attached = self
			.service_accounts
			.get(key)
			.and_then(|sa| sa.secrets.as_ref())
			.is_some_and(|refs| !refs.is_empty());
		if already_attached {
			return;
		}

		let mut attach = Vec::new();
		if controller.attach_pull_secret {
			let name = format!("{sa_name}-dockercfg-{}", self.next_suffix());
			self.secrets.insert(
				(namespace.clone(), name.clone()),
				Secret {
					metadata: ObjectMeta {
						name: Some(name.clone()),
						namespace: Some(namespace.clone()),
						..Default::default()
					},
					type_: Some("kubernetes.io/dockercfg".to_string()),
					..Default::default()
				},
			);
			attach.push(name);
		}

		let name = format!("{sa_name}-token-{}", self.next_suffix());
		self.secrets.insert(
			(namespace.clone(), name.clone()),
			token_secret(namespace, &name, &controller.token),
		);
		attach.push(name);

		if let Some(sa) = self.service_accounts.get_mut(key) {
			let refs = sa.secrets.get_or_insert_with(Vec::new);
			refs.extend(attach.into_iter().map(|name| ObjectReference {
				name: Some(name),
				..Default::default()
			}));
		}
	}
}

/// A populated service-account token secret.
pub fn token_secret(namespace: &str, name: &str, token: &str) -> Secret {
	Secret {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some(namespace.to_string()),
			..Default::default()
		},
		type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
		data: Some(BTreeMap::from([(
			TOKEN_DATA_KEY.to_string(),
			ByteString(token.as_bytes().to_vec()),
		)])),
		..Default::default()
	}
}

fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
	selector
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.all(|term| match term.split_once('=') {
			Some((k, v)) => labels.and_then(|l| l.get(k)).is_some_and(|actual| actual == v),
			None => labels.is_some_and(|l| l.contains_key(term)),
		})
}

fn not_found(kind: &'static str, name: &str) -> K8sError {
	K8sError::NotFound {
		kind,
		name: name.to_string(),
	}
}

fn already_exists(kind: &'static str, name: &str) -> K8sError {
	K8sError::AlreadyExists {
		kind,
		name: name.to_string(),
	}
}

/// In-memory cluster used by provisioner, resolver and HTTP tests.
#[derive(Default)]
pub struct MockK8sClient {
	state: Mutex<ClusterState>,
	controller: Option<TokenController>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enable the simulated token controller.
	pub fn with_token_controller(mut self, controller: TokenController) -> Self {
		self.controller = Some(controller);
		self
	}

	fn state(&self) -> MutexGuard<'_, ClusterState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Make every subsequent call of `op` fail with a 500.
	pub fn fail_on(&self, op: MockOperation) {
		self.state().failures.insert(op);
	}

	/// Number of create/delete calls issued so far, including failed ones.
	pub fn mutation_count(&self) -> usize {
		self.state().calls.iter().filter(|op| op.is_mutation()).count()
	}

	pub fn call_count(&self, op: MockOperation) -> usize {
		self.state().calls.iter().filter(|c| **c == op).count()
	}

	/// Seed a namespace, e.g. the shared namespace of a shared strategy.
	pub fn add_namespace(&self, name: &str) {
		self.state().namespaces.insert(
			name.to_string(),
			Namespace {
				metadata: ObjectMeta {
					name: Some(name.to_string()),
					..Default::default()
				},
				..Default::default()
			},
		);
	}

	pub fn namespace_names(&self) -> Vec<String> {
		self.state().namespaces.keys().cloned().collect()
	}

	pub fn namespace(&self, name: &str) -> Option<Namespace> {
		self.state().namespaces.get(name).cloned()
	}

	pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
		self
			.state()
			.service_accounts
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	pub fn service_account_count(&self) -> usize {
		self.state().service_accounts.len()
	}

	pub fn role(&self, namespace: &str, name: &str) -> Option<Role> {
		self
			.state()
			.roles
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	pub fn role_binding(&self, namespace: &str, name: &str) -> Option<RoleBinding> {
		self
			.state()
			.role_bindings
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
		self
			.state()
			.secrets
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	/// Store a secret and attach it to a service-account, bypassing the
	/// controller.
	pub fn attach_secret(&self, namespace: &str, service_account: &str, secret: Secret) {
		let mut state = self.state();
		let name = secret.metadata.name.clone().unwrap_or_default();
		state
			.secrets
			.insert((namespace.to_string(), name.clone()), secret);
		if let Some(sa) = state
			.service_accounts
			.get_mut(&(namespace.to_string(), service_account.to_string()))
		{
			sa.secrets.get_or_insert_with(Vec::new).push(ObjectReference {
				name: Some(name),
				..Default::default()
			});
		}
	}

	/// Attach a reference to a secret that does not exist.
	pub fn attach_dangling_reference(&self, namespace: &str, service_account: &str, name: &str) {
		if let Some(sa) = self
			.state()
			.service_accounts
			.get_mut(&(namespace.to_string(), service_account.to_string()))
		{
			sa.secrets.get_or_insert_with(Vec::new).push(ObjectReference {
				name: Some(name.to_string()),
				..Default::default()
			});
		}
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_namespace(&self, mut namespace: Namespace) -> Result<Namespace, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::CreateNamespace)?;
		let name = state.assign_name(&mut namespace.metadata);
		if state.namespaces.contains_key(&name) {
			return Err(already_exists("Namespace", &name));
		}
		state.namespaces.insert(name, namespace.clone());
		Ok(namespace)
	}

	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let mut state = self.state();
		state.record(MockOperation::DeleteNamespace)?;
		if state.namespaces.remove(name).is_none() {
			return Err(not_found("Namespace", name));
		}
		state.service_accounts.retain(|(ns, _), _| ns != name);
		state.roles.retain(|(ns, _), _| ns != name);
		state.role_bindings.retain(|(ns, _), _| ns != name);
		state.secrets.retain(|(ns, _), _| ns != name);
		Ok(())
	}

	async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::ListNamespaces)?;
		Ok(
			state
				.namespaces
				.values()
				.filter(|ns| matches_selector(ns.metadata.labels.as_ref(), label_selector))
				.cloned()
				.collect(),
		)
	}

	async fn create_service_account(
		&self,
		namespace: &str,
		mut service_account: ServiceAccount,
	) -> Result<ServiceAccount, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::CreateServiceAccount)?;
		state.require_namespace(namespace)?;
		let name = state.assign_name(&mut service_account.metadata);
		service_account.metadata.namespace = Some(namespace.to_string());
		let key = (namespace.to_string(), name.clone());
		if state.service_accounts.contains_key(&key) {
			return Err(already_exists("ServiceAccount", &name));
		}
		state.service_accounts.insert(key, service_account.clone());
		Ok(service_account)
	}

	async fn get_service_account(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<ServiceAccount, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::GetServiceAccount)?;
		let key = (namespace.to_string(), name.to_string());
		if !state.service_accounts.contains_key(&key) {
			return Err(not_found("ServiceAccount", name));
		}

		let reads = {
			let reads = state.service_account_reads.entry(key.clone()).or_insert(0);
			*reads += 1;
			*reads
		};
		if let Some(controller) = &self.controller {
			if reads >= controller.ready_after_reads {
				state.run_token_controller(controller, &key);
			}
		}

		state
			.service_accounts
			.get(&key)
			.cloned()
			.ok_or_else(|| not_found("ServiceAccount", name))
	}

	async fn delete_service_account(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let mut state = self.state();
		state.record(MockOperation::DeleteServiceAccount)?;
		state
			.service_accounts
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| not_found("ServiceAccount", name))
	}

	async fn list_service_accounts(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<ServiceAccount>, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::ListServiceAccounts)?;
		Ok(
			state
				.service_accounts
				.iter()
				.filter(|((ns, _), sa)| {
					ns == namespace && matches_selector(sa.metadata.labels.as_ref(), label_selector)
				})
				.map(|(_, sa)| sa.clone())
				.collect(),
		)
	}

	async fn create_role(&self, namespace: &str, mut role: Role) -> Result<Role, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::CreateRole)?;
		state.require_namespace(namespace)?;
		let name = state.assign_name(&mut role.metadata);
		role.metadata.namespace = Some(namespace.to_string());
		let key = (namespace.to_string(), name.clone());
		if state.roles.contains_key(&key) {
			return Err(already_exists("Role", &name));
		}
		state.roles.insert(key, role.clone());
		Ok(role)
	}

	async fn delete_role(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let mut state = self.state();
		state.record(MockOperation::DeleteRole)?;
		state
			.roles
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| not_found("Role", name))
	}

	async fn create_role_binding(
		&self,
		namespace: &str,
		mut role_binding: RoleBinding,
	) -> Result<RoleBinding, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::CreateRoleBinding)?;
		state.require_namespace(namespace)?;
		let name = state.assign_name(&mut role_binding.metadata);
		role_binding.metadata.namespace = Some(namespace.to_string());
		let key = (namespace.to_string(), name.clone());
		if state.role_bindings.contains_key(&key) {
			return Err(already_exists("RoleBinding", &name));
		}
		state.role_bindings.insert(key, role_binding.clone());
		Ok(role_binding)
	}

	async fn delete_role_binding(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let mut state = self.state();
		state.record(MockOperation::DeleteRoleBinding)?;
		state
			.role_bindings
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| not_found("RoleBinding", name))
	}

	async fn create_secret(&self, namespace: &str, mut secret: Secret) -> Result<Secret, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::CreateSecret)?;
		state.require_namespace(namespace)?;
		let name = state.assign_name(&mut secret.metadata);
		secret.metadata.namespace = Some(namespace.to_string());
		let key = (namespace.to_string(), name.clone());
		if state.secrets.contains_key(&key) {
			return Err(already_exists("Secret", &name));
		}
		state.secrets.insert(key, secret.clone());
		Ok(secret)
	}

	async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, K8sError> {
		let mut state = self.state();
		state.record(MockOperation::GetSecret)?;
		state
			.secrets
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| not_found("Secret", name))
	}

	async fn delete_secret(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let mut state = self.state();
		state.record(MockOperation::DeleteSecret)?;
		state
			.secrets
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| not_found("Secret", name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn generated_namespace(prefix: &str) -> Namespace {
		Namespace {
			metadata: ObjectMeta {
				generate_name: Some(prefix.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn named_service_account(name: &str) -> ServiceAccount {
		ServiceAccount {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[tokio::test]
	async fn generate_name_yields_distinct_names() {
		let mock = MockK8sClient::new();
		let a = mock.create_namespace(generated_namespace("ci-a-")).await.unwrap();
		let b = mock.create_namespace(generated_namespace("ci-a-")).await.unwrap();

		let a = a.metadata.name.unwrap();
		let b = b.metadata.name.unwrap();
		assert!(a.starts_with("ci-a-"));
		assert_eq!(a.len(), "ci-a-".len() + 5);
		assert_ne!(a, b);
	}

	#[tokio::test]
	async fn namespace_delete_cascades() {
		let mock = MockK8sClient::new();
		mock.add_namespace("ns");
		mock
			.create_service_account("ns", named_service_account("sa"))
			.await
			.unwrap();

		mock.delete_namespace("ns").await.unwrap();

		assert!(mock.service_account("ns", "sa").is_none());
		assert!(mock.delete_namespace("ns").await.unwrap_err().is_not_found());
	}

	#[tokio::test]
	async fn namespaced_create_requires_namespace() {
		let mock = MockK8sClient::new();
		let err = mock
			.create_service_account("missing", named_service_account("sa"))
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn token_controller_attaches_on_configured_read() {
		let mock = MockK8sClient::new().with_token_controller(TokenController {
			ready_after_reads: 2,
			token: "tok".to_string(),
			attach_pull_secret: true,
		});
		mock.add_namespace("ns");
		mock
			.create_service_account("ns", named_service_account("sa"))
			.await
			.unwrap();

		let first = mock.get_service_account("sa", "ns").await.unwrap();
		assert!(first.secrets.is_none());

		let second = mock.get_service_account("sa", "ns").await.unwrap();
		assert_eq!(second.secrets.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn injected_failures_are_reported_and_counted() {
		let mock = MockK8sClient::new();
		mock.fail_on(MockOperation::CreateNamespace);

		let err = mock
			.create_namespace(generated_namespace("x-"))
			.await
			.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { code: 500, .. }));
		assert_eq!(mock.mutation_count(), 1);
		assert!(mock.namespace_names().is_empty());
	}

	#[test]
	fn selector_matching() {
		let labels = BTreeMap::from([
			("vend.dev/managed".to_string(), "true".to_string()),
			("vend.dev/request-id".to_string(), "pr-1".to_string()),
		]);
		assert!(matches_selector(
			Some(&labels),
			"vend.dev/managed=true,vend.dev/request-id=pr-1"
		));
		assert!(!matches_selector(Some(&labels), "vend.dev/request-id=pr-2"));
		assert!(!matches_selector(None, "vend.dev/managed=true"));
		assert!(matches_selector(None, ""));
	}
}
