// crates/preflight-cluster/src/memory.rs
// ============================================================================
// Module: In-Memory Cluster
// Description: Scriptable ClusterApi implementation for tests and demos.
// Purpose: Exercise executor and lifecycle logic without a live cluster.
// Dependencies: async-trait, crate::api
// ============================================================================

//! ## Overview
//! [`InMemoryCluster`] keeps objects in a map and records every mutating
//! call in an operation log. Pod phases and logs are scripted per Pod name;
//! create, delete and log failures can be injected per resource, and a
//! deletion can be made to hang. Deleted objects can linger for a
//! configurable number of existence checks to mimic graceful termination.
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::api::ClusterApi;
use crate::api::ClusterError;
use crate::api::ClusterObject;
use crate::api::NodeInfo;
use crate::api::PodPhase;
use crate::api::ResourceKind;
use crate::api::ResourceRef;
use crate::api::StorageClassInfo;
use crate::api::TokenRequestSpec;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Scripted behaviour of a Pod created under a given name.
#[derive(Debug, Clone)]
struct PodScript {
    /// Phases returned by successive polls; the last one repeats.
    phases: VecDeque<PodPhase>,
    /// Container log returned once the Pod exists.
    logs: String,
}

/// Mutable fake state.
#[derive(Debug, Default)]
struct State {
    /// Live objects.
    objects: BTreeMap<ResourceRef, ClusterObject>,
    /// Deleted objects still visible to `exists`, with remaining checks.
    terminating: BTreeMap<ResourceRef, u32>,
    /// Existence checks a deleted object stays visible for.
    deletion_lag: u32,
    /// Pod scripts keyed by `namespace/name`.
    scripts: BTreeMap<String, PodScript>,
    /// Active scripts of live Pods keyed by `namespace/name`.
    running: BTreeMap<String, PodScript>,
    /// Tokens keyed by `namespace/service-account`.
    tokens: BTreeMap<String, String>,
    /// Injected create failures.
    create_failures: BTreeMap<ResourceRef, ClusterError>,
    /// Injected delete failures.
    delete_failures: BTreeMap<ResourceRef, ClusterError>,
    /// Resources whose deletion never completes.
    hung_deletes: BTreeSet<ResourceRef>,
    /// Injected log failures keyed by `namespace/name`.
    log_failures: BTreeMap<String, ClusterError>,
    /// StorageClasses.
    storage_classes: Vec<StorageClassInfo>,
    /// Nodes.
    nodes: Vec<NodeInfo>,
    /// Operation log.
    operations: Vec<String>,
}

/// In-memory cluster for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCluster {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<State>>,
}

impl InMemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps deleted objects visible for `checks` existence checks.
    #[must_use]
    pub fn with_deletion_lag(self, checks: u32) -> Self {
        self.update(|state| state.deletion_lag = checks);
        self
    }

    /// Inserts an object without logging an operation.
    pub fn insert(&self, object: ClusterObject) {
        self.update(|state| {
            state.objects.insert(object.resource(), object);
        });
    }

    /// Scripts the phases and log of a Pod created as `namespace/name`.
    pub fn script_pod(&self, namespace: &str, name: &str, phases: &[PodPhase], logs: &str) {
        let script = PodScript {
            phases: phases.iter().copied().collect(),
            logs: logs.to_string(),
        };
        self.update(|state| {
            state.scripts.insert(pod_key(namespace, name), script);
        });
    }

    /// Sets the token returned for a ServiceAccount.
    pub fn set_token(&self, namespace: &str, service_account: &str, token: &str) {
        self.update(|state| {
            state.tokens.insert(pod_key(namespace, service_account), token.to_string());
        });
    }

    /// Makes the next creation of `resource` fail.
    pub fn fail_create(&self, resource: ResourceRef, error: ClusterError) {
        self.update(|state| {
            state.create_failures.insert(resource, error);
        });
    }

    /// Makes every deletion of `resource` fail.
    pub fn fail_delete(&self, resource: ResourceRef, error: ClusterError) {
        self.update(|state| {
            state.delete_failures.insert(resource, error);
        });
    }

    /// Makes every deletion of `resource` hang.
    pub fn hang_delete(&self, resource: ResourceRef) {
        self.update(|state| {
            state.hung_deletes.insert(resource);
        });
    }

    /// Makes log reads of a Pod fail.
    pub fn fail_logs(&self, namespace: &str, name: &str, error: ClusterError) {
        self.update(|state| {
            state.log_failures.insert(pod_key(namespace, name), error);
        });
    }

    /// Adds a StorageClass, optionally marked as the default.
    pub fn add_storage_class(&self, name: &str, default: bool) {
        let mut annotations = BTreeMap::new();
        if default {
            annotations.insert(crate::capability::DEFAULT_CLASS_ANNOTATION.to_string(), "true".to_string());
        }
        self.update(|state| {
            state.storage_classes.push(StorageClassInfo {
                name: name.to_string(),
                annotations,
            });
        });
    }

    /// Adds a Node with labels.
    pub fn add_node(&self, name: &str, labels: &[(&str, &str)]) {
        let labels = labels.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
        self.update(|state| {
            state.nodes.push(NodeInfo {
                name: name.to_string(),
                labels,
            });
        });
    }

    /// Returns true when the object is live.
    #[must_use]
    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.state.lock().is_ok_and(|state| state.objects.contains_key(resource))
    }

    /// Returns the live object for a reference.
    #[must_use]
    pub fn object(&self, resource: &ResourceRef) -> Option<ClusterObject> {
        self.state.lock().ok().and_then(|state| state.objects.get(resource).cloned())
    }

    /// Returns the references of every live object.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceRef> {
        self.state.lock().map(|state| state.objects.keys().cloned().collect()).unwrap_or_default()
    }

    /// Returns the operation log (`create <ref>`, `delete <ref>`, `logs <ref>`).
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().map(|state| state.operations.clone()).unwrap_or_default()
    }

    /// Applies a mutation, ignoring a poisoned lock.
    fn update(&self, mutate: impl FnOnce(&mut State)) {
        if let Ok(mut state) = self.state.lock() {
            mutate(&mut state);
        }
    }

    /// Locks the state for an API call.
    fn lock(&self) -> Result<MutexGuard<'_, State>, ClusterError> {
        self.state.lock().map_err(|_| ClusterError::Transport("in-memory cluster mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn create(&self, object: &ClusterObject) -> Result<(), ClusterError> {
        let resource = object.resource();
        let mut state = self.lock()?;
        state.operations.push(format!("create {resource}"));
        if let Some(error) = state.create_failures.remove(&resource) {
            return Err(error);
        }
        if state.objects.contains_key(&resource) || state.terminating.contains_key(&resource) {
            return Err(ClusterError::AlreadyExists(resource.to_string()));
        }
        if let ClusterObject::Pod(template) = object {
            let key = pod_key(&template.namespace, &template.name);
            let script = state.scripts.get(&key).cloned().unwrap_or_else(|| PodScript {
                phases: VecDeque::from([PodPhase::Succeeded]),
                logs: String::new(),
            });
            state.running.insert(key, script);
        }
        state.objects.insert(resource, object.clone());
        drop(state);
        Ok(())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError> {
        let hung = {
            let mut state = self.lock()?;
            state.operations.push(format!("delete {resource}"));
            if let Some(error) = state.delete_failures.get(resource) {
                return Err(error.clone());
            }
            if state.hung_deletes.contains(resource) {
                drop(state);
                true
            } else {
                if state.objects.remove(resource).is_none() {
                    return Err(ClusterError::NotFound(resource.to_string()));
                }
                if resource.kind == ResourceKind::Pod {
                    let key =
                        pod_key(resource.namespace.as_deref().unwrap_or_default(), &resource.name);
                    state.running.remove(&key);
                }
                let lag = state.deletion_lag;
                if lag > 0 {
                    state.terminating.insert(resource.clone(), lag);
                }
                drop(state);
                false
            }
        };
        if hung {
            return std::future::pending().await;
        }
        Ok(())
    }

    async fn exists(&self, resource: &ResourceRef) -> Result<bool, ClusterError> {
        let mut state = self.lock()?;
        if state.objects.contains_key(resource) {
            return Ok(true);
        }
        let Some(remaining) = state.terminating.get_mut(resource) else {
            return Ok(false);
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            state.terminating.remove(resource);
        }
        drop(state);
        Ok(true)
    }

    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, ClusterError> {
        let mut state = self.lock()?;
        let script = state
            .running
            .get_mut(&pod_key(namespace, name))
            .ok_or_else(|| ClusterError::NotFound(ResourceRef::pod(namespace, name).to_string()))?;
        let phase = if script.phases.len() > 1 {
            script.phases.pop_front()
        } else {
            script.phases.front().copied()
        };
        Ok(phase.unwrap_or(PodPhase::Unknown))
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, ClusterError> {
        let key = pod_key(namespace, name);
        let mut state = self.lock()?;
        state.operations.push(format!("logs {}", ResourceRef::pod(namespace, name)));
        if let Some(error) = state.log_failures.get(&key) {
            return Err(error.clone());
        }
        state
            .running
            .get(&key)
            .map(|script| script.logs.clone())
            .ok_or_else(|| ClusterError::NotFound(ResourceRef::pod(namespace, name).to_string()))
    }

    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<String>, ClusterError> {
        let state = self.lock()?;
        Ok(state
            .objects
            .keys()
            .filter(|resource| {
                resource.kind == ResourceKind::ServiceAccount && resource.namespace.as_deref() == Some(namespace)
            })
            .map(|resource| resource.name.clone())
            .collect())
    }

    async fn request_token(&self, request: &TokenRequestSpec) -> Result<String, ClusterError> {
        let resource =
            ResourceRef::namespaced(ResourceKind::ServiceAccount, &request.namespace, &request.service_account);
        let state = self.lock()?;
        if !state.objects.contains_key(&resource) {
            return Err(ClusterError::NotFound(resource.to_string()));
        }
        Ok(state
            .tokens
            .get(&pod_key(&request.namespace, &request.service_account))
            .cloned()
            .unwrap_or_else(|| format!("token:{}:{}", request.service_account, request.audience)))
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError> {
        Ok(self.lock()?.storage_classes.clone())
    }

    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<NodeInfo>, ClusterError> {
        let (key, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        Ok(self
            .lock()?
            .nodes
            .iter()
            .filter(|node| node.labels.get(key).is_some_and(|label| label == value))
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a `namespace/name` key.
fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}
