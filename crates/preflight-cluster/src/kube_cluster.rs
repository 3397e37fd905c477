// crates/preflight-cluster/src/kube_cluster.rs
// ============================================================================
// Module: Kubernetes Cluster Backend
// Description: ClusterApi implementation over the kube client.
// Purpose: Translate engine object specs into Kubernetes API calls.
// Dependencies: k8s-openapi, kube, serde
// ============================================================================

//! ## Overview
//! [`KubeCluster`] maps each [`ClusterObject`] to its typed Kubernetes
//! resource and each API response code to a [`ClusterError`]: 404 becomes
//! `NotFound`, 409 becomes `AlreadyExists`, everything else keeps its code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::authentication::v1::TokenRequest;
use k8s_openapi::api::authentication::v1::TokenRequestSpec as KubeTokenRequestSpec;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::EnvVar;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::api::rbac::v1::PolicyRule as KubePolicyRule;
use k8s_openapi::api::rbac::v1::Role;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::api::rbac::v1::RoleRef;
use k8s_openapi::api::rbac::v1::Subject;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::Client;
use kube::Resource;
use kube::api::DeleteParams;
use kube::api::ListParams;
use kube::api::LogParams;
use kube::api::PostParams;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::ClusterApi;
use crate::api::ClusterError;
use crate::api::ClusterObject;
use crate::api::NodeInfo;
use crate::api::PodPhase;
use crate::api::PodTemplate;
use crate::api::PolicyRule;
use crate::api::ResourceKind;
use crate::api::ResourceRef;
use crate::api::StorageClassInfo;
use crate::api::TokenRequestSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// RBAC API group used in role references.
const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
/// Label marking objects created by the engine.
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Value of [`MANAGED_BY_LABEL`].
const MANAGED_BY_VALUE: &str = "preflight";

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Cluster backend over a kube [`Client`].
#[derive(Clone)]
pub struct KubeCluster {
    /// Shared API client.
    client: Client,
}

impl KubeCluster {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
        }
    }

    /// Builds a client from the ambient kubeconfig or in-cluster environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Transport`] when no configuration is usable.
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default().await.map_err(|err| ClusterError::Transport(err.to_string()))?;
        Ok(Self::new(client))
    }

    /// Returns a namespaced API handle.
    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Returns a cluster-wide API handle.
    fn all<K>(&self) -> Api<K>
    where
        K: Resource,
        <K as Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create(&self, object: &ClusterObject) -> Result<(), ClusterError> {
        let resource = object.resource();
        match object {
            ClusterObject::Namespace {
                name,
            } => {
                let namespace = Namespace {
                    metadata: metadata(None, name),
                    ..Namespace::default()
                };
                create_with(&self.all(), &namespace, &resource).await
            }
            ClusterObject::ServiceAccount {
                namespace,
                name,
            } => {
                let account = ServiceAccount {
                    metadata: metadata(Some(namespace), name),
                    ..ServiceAccount::default()
                };
                create_with(&self.namespaced(namespace), &account, &resource).await
            }
            ClusterObject::Role {
                namespace,
                name,
                rules,
            } => {
                let role = Role {
                    metadata: metadata(Some(namespace), name),
                    rules: Some(rules.iter().map(kube_rule).collect()),
                };
                create_with(&self.namespaced(namespace), &role, &resource).await
            }
            ClusterObject::ClusterRole {
                name,
                rules,
            } => {
                let role = ClusterRole {
                    metadata: metadata(None, name),
                    rules: Some(rules.iter().map(kube_rule).collect()),
                    ..ClusterRole::default()
                };
                create_with(&self.all(), &role, &resource).await
            }
            ClusterObject::RoleBinding {
                namespace,
                name,
                role,
                subject_namespace,
                subject_name,
            } => {
                let binding = RoleBinding {
                    metadata: metadata(Some(namespace), name),
                    role_ref: role_ref("Role", role),
                    subjects: Some(vec![service_account_subject(subject_namespace, subject_name)]),
                };
                create_with(&self.namespaced(namespace), &binding, &resource).await
            }
            ClusterObject::ClusterRoleBinding {
                name,
                cluster_role,
                subject_namespace,
                subject_name,
            } => {
                let binding = ClusterRoleBinding {
                    metadata: metadata(None, name),
                    role_ref: role_ref("ClusterRole", cluster_role),
                    subjects: Some(vec![service_account_subject(subject_namespace, subject_name)]),
                };
                create_with(&self.all(), &binding, &resource).await
            }
            ClusterObject::Pod(template) => {
                create_with(&self.namespaced(&template.namespace), &kube_pod(template), &resource).await
            }
        }
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError> {
        let namespace = resource.namespace.as_deref().unwrap_or_default();
        match resource.kind {
            ResourceKind::Namespace => delete_with(&self.all::<Namespace>(), resource).await,
            ResourceKind::ServiceAccount => {
                delete_with(&self.namespaced::<ServiceAccount>(namespace), resource).await
            }
            ResourceKind::Role => delete_with(&self.namespaced::<Role>(namespace), resource).await,
            ResourceKind::ClusterRole => delete_with(&self.all::<ClusterRole>(), resource).await,
            ResourceKind::RoleBinding => delete_with(&self.namespaced::<RoleBinding>(namespace), resource).await,
            ResourceKind::ClusterRoleBinding => delete_with(&self.all::<ClusterRoleBinding>(), resource).await,
            ResourceKind::Pod => delete_with(&self.namespaced::<Pod>(namespace), resource).await,
        }
    }

    async fn exists(&self, resource: &ResourceRef) -> Result<bool, ClusterError> {
        let namespace = resource.namespace.as_deref().unwrap_or_default();
        match resource.kind {
            ResourceKind::Namespace => exists_with(&self.all::<Namespace>(), resource).await,
            ResourceKind::ServiceAccount => {
                exists_with(&self.namespaced::<ServiceAccount>(namespace), resource).await
            }
            ResourceKind::Role => exists_with(&self.namespaced::<Role>(namespace), resource).await,
            ResourceKind::ClusterRole => exists_with(&self.all::<ClusterRole>(), resource).await,
            ResourceKind::RoleBinding => exists_with(&self.namespaced::<RoleBinding>(namespace), resource).await,
            ResourceKind::ClusterRoleBinding => exists_with(&self.all::<ClusterRoleBinding>(), resource).await,
            ResourceKind::Pod => exists_with(&self.namespaced::<Pod>(namespace), resource).await,
        }
    }

    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, ClusterError> {
        let resource = ResourceRef::pod(namespace, name);
        let pod = self.namespaced::<Pod>(namespace).get(name).await.map_err(|err| map_error(&resource, err))?;
        Ok(pod
            .status
            .and_then(|status| status.phase)
            .map_or(PodPhase::Unknown, |phase| PodPhase::parse(&phase)))
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, ClusterError> {
        let resource = ResourceRef::pod(namespace, name);
        self.namespaced::<Pod>(namespace)
            .logs(name, &LogParams::default())
            .await
            .map_err(|err| map_error(&resource, err))
    }

    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<String>, ClusterError> {
        let accounts = self
            .namespaced::<ServiceAccount>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|err| ClusterError::Transport(err.to_string()))?;
        Ok(accounts.items.into_iter().filter_map(|account| account.metadata.name).collect())
    }

    async fn request_token(&self, request: &TokenRequestSpec) -> Result<String, ClusterError> {
        let resource =
            ResourceRef::namespaced(ResourceKind::ServiceAccount, &request.namespace, &request.service_account);
        let body = TokenRequest {
            metadata: ObjectMeta::default(),
            spec: KubeTokenRequestSpec {
                audiences: vec![request.audience.clone()],
                expiration_seconds: Some(request.expiration_seconds),
                bound_object_ref: None,
            },
            status: None,
        };
        let response = self
            .namespaced::<ServiceAccount>(&request.namespace)
            .create_token_request(&request.service_account, &PostParams::default(), &body)
            .await
            .map_err(|err| map_error(&resource, err))?;
        response
            .status
            .map(|status| status.token)
            .ok_or_else(|| ClusterError::Transport(format!("token request for {resource} returned no status")))
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        let classes = self
            .all::<StorageClass>()
            .list(&ListParams::default())
            .await
            .map_err(|err| ClusterError::Transport(err.to_string()))?;
        Ok(classes
            .items
            .into_iter()
            .map(|class| StorageClassInfo {
                name: class.metadata.name.unwrap_or_default(),
                annotations: class.metadata.annotations.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<NodeInfo>, ClusterError> {
        let nodes = self
            .all::<Node>()
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(|err| ClusterError::Transport(err.to_string()))?;
        Ok(nodes
            .items
            .into_iter()
            .map(|node| NodeInfo {
                name: node.metadata.name.unwrap_or_default(),
                labels: node.metadata.labels.unwrap_or_default(),
            })
            .collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Creates an object through a typed handle.
async fn create_with<K>(api: &Api<K>, object: &K, resource: &ResourceRef) -> Result<(), ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    api.create(&PostParams::default(), object).await.map(|_| ()).map_err(|err| map_error(resource, err))
}

/// Deletes an object through a typed handle.
async fn delete_with<K>(api: &Api<K>, resource: &ResourceRef) -> Result<(), ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.delete(&resource.name, &DeleteParams::default()).await.map(|_| ()).map_err(|err| map_error(resource, err))
}

/// Checks existence through a typed handle.
async fn exists_with<K>(api: &Api<K>, resource: &ResourceRef) -> Result<bool, ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.get_opt(&resource.name).await.map(|found| found.is_some()).map_err(|err| map_error(resource, err))
}

/// Maps a kube error onto the backend-agnostic taxonomy.
fn map_error(resource: &ResourceRef, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound(resource.to_string()),
        kube::Error::Api(response) if response.code == 409 => ClusterError::AlreadyExists(resource.to_string()),
        kube::Error::Api(response) => ClusterError::Api {
            code: response.code,
            message: response.message,
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

/// Builds object metadata carrying the managed-by label.
fn metadata(namespace: Option<&String>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.cloned(),
        labels: Some(BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())])),
        ..ObjectMeta::default()
    }
}

/// Converts an engine rule into the RBAC type.
fn kube_rule(rule: &PolicyRule) -> KubePolicyRule {
    KubePolicyRule {
        api_groups: Some(rule.api_groups.clone()),
        resources: Some(rule.resources.clone()),
        verbs: rule.verbs.clone(),
        ..KubePolicyRule::default()
    }
}

/// Builds a role reference.
fn role_ref(kind: &str, name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Builds a ServiceAccount subject.
fn service_account_subject(namespace: &str, name: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        api_group: None,
    }
}

/// Converts a Pod template into a run-to-completion Pod.
fn kube_pod(template: &PodTemplate) -> Pod {
    let env = template
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect::<Vec<_>>();
    Pod {
        metadata: metadata(Some(&template.namespace), &template.name),
        spec: Some(PodSpec {
            service_account_name: Some(template.service_account.clone()),
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: template.name.clone(),
                image: Some(template.image.clone()),
                command: Some(template.command.clone()),
                env: (!env.is_empty()).then_some(env),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    }
}
