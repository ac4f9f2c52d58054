// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Creates, locates and removes scoped CI identities.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vend_server_k8s::{
	K8sClient, K8sError, Namespace, ObjectMeta, Role, RoleBinding, RoleRef, Secret, ServiceAccount,
	Subject, SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE,
};

use crate::config::{IdentityConfig, IdentityStrategy};
use crate::error::{IdentityError, ProvisionStep};
use crate::types::{RequestId, ScopedIdentity};

pub const MANAGED_LABEL: &str = "vend.dev/managed";
pub const REQUEST_ID_LABEL: &str = "vend.dev/request-id";
const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Label selector matching every object vended for `id`.
pub fn ownership_selector(id: &RequestId) -> String {
	format!("{MANAGED_LABEL}=true,{REQUEST_ID_LABEL}={id}")
}

fn ownership_labels(id: &RequestId) -> BTreeMap<String, String> {
	BTreeMap::from([
		(MANAGED_LABEL.to_string(), "true".to_string()),
		(REQUEST_ID_LABEL.to_string(), id.to_string()),
	])
}

fn created_name(meta: &ObjectMeta) -> String {
	meta.name.clone().unwrap_or_default()
}

fn token_secret_name(service_account: &str) -> String {
	format!("{service_account}-token")
}

/// Provisioning seam used by the request orchestrator.
#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
	/// Create every object making up a new identity. On failure or
	/// cancellation the objects created so far are removed again.
	async fn provision(
		&self,
		id: &RequestId,
		cancel: &CancellationToken,
	) -> Result<ScopedIdentity, IdentityError>;

	/// Remove a previously provisioned identity.
	async fn teardown(&self, identity: &ScopedIdentity) -> Result<(), IdentityError>;

	/// Locate identities previously vended for `id` by their ownership labels.
	async fn find(&self, id: &RequestId) -> Result<Vec<ScopedIdentity>, IdentityError>;
}

/// An object created during provisioning, kept so it can be compensated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
	Namespace(String),
	ServiceAccount { namespace: String, name: String },
	Role { namespace: String, name: String },
	RoleBinding { namespace: String, name: String },
	Secret { namespace: String, name: String },
}

impl Created {
	fn namespace(&self) -> Option<&str> {
		match self {
			Created::Namespace(_) => None,
			Created::ServiceAccount { namespace, .. }
			| Created::Role { namespace, .. }
			| Created::RoleBinding { namespace, .. }
			| Created::Secret { namespace, .. } => Some(namespace),
		}
	}
}

impl fmt::Display for Created {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Created::Namespace(name) => write!(f, "namespace {name}"),
			Created::ServiceAccount { namespace, name } => {
				write!(f, "service account {namespace}/{name}")
			}
			Created::Role { namespace, name } => write!(f, "role {namespace}/{name}"),
			Created::RoleBinding { namespace, name } => write!(f, "role binding {namespace}/{name}"),
			Created::Secret { namespace, name } => write!(f, "secret {namespace}/{name}"),
		}
	}
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), IdentityError> {
	if cancel.is_cancelled() {
		Err(IdentityError::Cancelled)
	} else {
		Ok(())
	}
}

fn failed(step: ProvisionStep) -> impl FnOnce(K8sError) -> IdentityError {
	move |source| IdentityError::ProvisioningFailure { step, source }
}

/// [`IdentityProvisioner`] talking to the cluster through a [`K8sClient`].
pub struct Provisioner {
	client: Arc<dyn K8sClient>,
	config: IdentityConfig,
}

impl Provisioner {
	pub fn new(client: Arc<dyn K8sClient>, config: IdentityConfig) -> Self {
		Self { client, config }
	}

	pub fn config(&self) -> &IdentityConfig {
		&self.config
	}

	/// `<prefix>-<id>`, the stem of every name derived from a request.
	fn base_name(&self, id: &RequestId) -> String {
		format!("{}-{}", self.config.name_prefix, id)
	}

	fn metadata(&self, id: &RequestId, name: Option<String>, generate_name: Option<String>) -> ObjectMeta {
		ObjectMeta {
			name,
			generate_name,
			labels: Some(ownership_labels(id)),
			..Default::default()
		}
	}

	async fn delete(&self, created: &Created) -> Result<(), K8sError> {
		match created {
			Created::Namespace(name) => self.client.delete_namespace(name).await,
			Created::ServiceAccount { namespace, name } => {
				self.client.delete_service_account(name, namespace).await
			}
			Created::Role { namespace, name } => self.client.delete_role(name, namespace).await,
			Created::RoleBinding { namespace, name } => {
				self.client.delete_role_binding(name, namespace).await
			}
			Created::Secret { namespace, name } => self.client.delete_secret(name, namespace).await,
		}
	}

	/// Undo partial provisioning, newest object first. Objects inside a
	/// namespace that is itself being deleted go with it.
	async fn rollback(&self, log: Vec<Created>) {
		let doomed: Vec<String> = log
			.iter()
			.filter_map(|c| match c {
				Created::Namespace(name) => Some(name.clone()),
				_ => None,
			})
			.collect();

		for created in log.iter().rev() {
			if created
				.namespace()
				.is_some_and(|ns| doomed.iter().any(|d| d == ns))
			{
				continue;
			}
			match self.delete(created).await {
				Ok(()) => tracing::debug!(object = %created, "rolled back"),
				Err(e) => tracing::warn!(object = %created, error = %e, "rollback failed"),
			}
		}
	}

	async fn provision_steps(
		&self,
		id: &RequestId,
		cancel: &CancellationToken,
		log: &mut Vec<Created>,
	) -> Result<ScopedIdentity, IdentityError> {
		let base = self.base_name(id);

		let (namespace, owns_namespace) = match &self.config.strategy {
			IdentityStrategy::Dedicated => {
				let ns = Namespace {
					metadata: self.metadata(id, None, Some(format!("{base}-"))),
					..Default::default()
				};
				let ns = self
					.client
					.create_namespace(ns)
					.await
					.map_err(failed(ProvisionStep::Namespace))?;
				let name = created_name(&ns.metadata);
				log.push(Created::Namespace(name.clone()));
				(name, true)
			}
			IdentityStrategy::Shared { namespace }
			| IdentityStrategy::ServiceAccountOnly { namespace } => (namespace.clone(), false),
		};
		check_cancelled(cancel)?;

		let sa_meta = if owns_namespace {
			self.metadata(id, Some(namespace.clone()), None)
		} else {
			self.metadata(id, None, Some(format!("{base}-")))
		};
		let sa = self
			.client
			.create_service_account(
				&namespace,
				ServiceAccount {
					metadata: sa_meta,
					..Default::default()
				},
			)
			.await
			.map_err(failed(ProvisionStep::ServiceAccount))?;
		let service_account = created_name(&sa.metadata);
		log.push(Created::ServiceAccount {
			namespace: namespace.clone(),
			name: service_account.clone(),
		});
		check_cancelled(cancel)?;

		let rbac_name = match &self.config.strategy {
			IdentityStrategy::ServiceAccountOnly { .. } => None,
			IdentityStrategy::Dedicated => Some(base.clone()),
			IdentityStrategy::Shared { .. } => Some(service_account.clone()),
		};
		if let Some(rbac_name) = &rbac_name {
			let role = Role {
				metadata: self.metadata(id, Some(rbac_name.clone()), None),
				rules: Some(self.config.rules.iter().map(|r| r.to_policy_rule()).collect()),
			};
			self
				.client
				.create_role(&namespace, role)
				.await
				.map_err(failed(ProvisionStep::Role))?;
			log.push(Created::Role {
				namespace: namespace.clone(),
				name: rbac_name.clone(),
			});
			check_cancelled(cancel)?;

			let binding = RoleBinding {
				metadata: self.metadata(id, Some(rbac_name.clone()), None),
				role_ref: RoleRef {
					api_group: RBAC_API_GROUP.to_string(),
					kind: "Role".to_string(),
					name: rbac_name.clone(),
				},
				subjects: Some(vec![Subject {
					kind: "ServiceAccount".to_string(),
					name: service_account.clone(),
					namespace: Some(namespace.clone()),
					..Default::default()
				}]),
			};
			self
				.client
				.create_role_binding(&namespace, binding)
				.await
				.map_err(failed(ProvisionStep::RoleBinding))?;
			log.push(Created::RoleBinding {
				namespace: namespace.clone(),
				name: rbac_name.clone(),
			});
			check_cancelled(cancel)?;
		}

		let token_secret = if self.config.create_token_secret {
			let name = token_secret_name(&service_account);
			let mut metadata = self.metadata(id, Some(name.clone()), None);
			metadata.annotations = Some(BTreeMap::from([(
				SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
				service_account.clone(),
			)]));
			let secret = Secret {
				metadata,
				type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
				..Default::default()
			};
			self
				.client
				.create_secret(&namespace, secret)
				.await
				.map_err(failed(ProvisionStep::TokenSecret))?;
			log.push(Created::Secret {
				namespace: namespace.clone(),
				name: name.clone(),
			});
			check_cancelled(cancel)?;
			Some(name)
		} else {
			None
		};

		Ok(ScopedIdentity {
			request_id: id.clone(),
			namespace,
			service_account,
			role: rbac_name.clone(),
			role_binding: rbac_name,
			token_secret,
			owns_namespace,
		})
	}

	fn identity_for(
		&self,
		id: &RequestId,
		namespace: String,
		service_account: String,
		owns_namespace: bool,
	) -> ScopedIdentity {
		let rbac_name = match &self.config.strategy {
			IdentityStrategy::ServiceAccountOnly { .. } => None,
			IdentityStrategy::Dedicated => Some(self.base_name(id)),
			IdentityStrategy::Shared { .. } => Some(service_account.clone()),
		};
		let token_secret = self
			.config
			.create_token_secret
			.then(|| token_secret_name(&service_account));
		ScopedIdentity {
			request_id: id.clone(),
			namespace,
			service_account,
			role: rbac_name.clone(),
			role_binding: rbac_name,
			token_secret,
			owns_namespace,
		}
	}
}

#[async_trait]
impl IdentityProvisioner for Provisioner {
	#[tracing::instrument(skip(self, cancel), fields(request_id = %id, strategy = self.config.strategy.name()))]
	async fn provision(
		&self,
		id: &RequestId,
		cancel: &CancellationToken,
	) -> Result<ScopedIdentity, IdentityError> {
		let mut log = Vec::new();
		match self.provision_steps(id, cancel, &mut log).await {
			Ok(identity) => {
				tracing::info!(
					namespace = %identity.namespace,
					service_account = %identity.service_account,
					"Provisioned scoped identity"
				);
				Ok(identity)
			}
			Err(e) => {
				tracing::warn!(error = %e, created = log.len(), "Provisioning aborted, rolling back");
				self.rollback(log).await;
				Err(e)
			}
		}
	}

	#[tracing::instrument(skip(self, identity), fields(request_id = %identity.request_id, namespace = %identity.namespace))]
	async fn teardown(&self, identity: &ScopedIdentity) -> Result<(), IdentityError> {
		let targets = if identity.owns_namespace {
			vec![Created::Namespace(identity.namespace.clone())]
		} else {
			let ns = || identity.namespace.clone();
			let mut targets = Vec::new();
			if let Some(name) = &identity.role_binding {
				targets.push(Created::RoleBinding {
					namespace: ns(),
					name: name.clone(),
				});
			}
			if let Some(name) = &identity.role {
				targets.push(Created::Role {
					namespace: ns(),
					name: name.clone(),
				});
			}
			if let Some(name) = &identity.token_secret {
				targets.push(Created::Secret {
					namespace: ns(),
					name: name.clone(),
				});
			}
			targets.push(Created::ServiceAccount {
				namespace: ns(),
				name: identity.service_account.clone(),
			});
			targets
		};

		let mut first_error = None;
		for target in targets {
			if let Err(source) = self.delete(&target).await {
				tracing::warn!(object = %target, error = %source, "Teardown step failed");
				first_error.get_or_insert(IdentityError::TeardownFailure {
					target: target.to_string(),
					source,
				});
			}
		}

		match first_error {
			Some(e) => Err(e),
			None => {
				tracing::info!("Tore down scoped identity");
				Ok(())
			}
		}
	}

	#[tracing::instrument(skip(self), fields(request_id = %id))]
	async fn find(&self, id: &RequestId) -> Result<Vec<ScopedIdentity>, IdentityError> {
		let selector = ownership_selector(id);
		let identities = match &self.config.strategy {
			IdentityStrategy::Dedicated => self
				.client
				.list_namespaces(&selector)
				.await?
				.into_iter()
				.filter(|ns| ns.metadata.deletion_timestamp.is_none())
				.map(|ns| {
					let name = created_name(&ns.metadata);
					self.identity_for(id, name.clone(), name, true)
				})
				.collect(),
			IdentityStrategy::Shared { namespace }
			| IdentityStrategy::ServiceAccountOnly { namespace } => self
				.client
				.list_service_accounts(namespace, &selector)
				.await?
				.into_iter()
				.map(|sa| self.identity_for(id, namespace.clone(), created_name(&sa.metadata), false))
				.collect(),
		};
		Ok(identities)
	}
}
