// crates/preflight-cluster/src/lifecycle.rs
// ============================================================================
// Module: Resource Lifecycle Manager
// Description: RBAC scaffolding provisioning and reverse-order teardown.
// Purpose: Give the in-cluster checker exactly the access it needs, then remove it.
// Dependencies: crate::api, preflight-core
// ============================================================================

//! ## Overview
//! A [`ScaffoldingPlan`] is derived from the application name. Provisioning
//! creates its objects in dependency order and adopts objects that already
//! exist. Teardown walks the same list in exact reverse, attempts every
//! object, treats absence as success and aggregates the rest.
//!
//! Namespaces are ensured before provisioning and never torn down.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use preflight_core::AuditSink;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CleanupError;
use preflight_core::CleanupFailure;
use preflight_core::NoopAuditSink;
use preflight_core::ResourceAction;
use preflight_core::ResourceAuditEvent;

use crate::api::ClusterApi;
use crate::api::ClusterError;
use crate::api::ClusterObject;
use crate::api::PodTemplate;
use crate::api::PolicyRule;
use crate::api::ResourceRef;
use crate::api::delete_within;

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Namespace whose Role grants the checker access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceGrant {
    /// Target namespace.
    pub namespace: String,
    /// Rules of the namespaced Role.
    pub rules: Vec<PolicyRule>,
}

/// Scaffolding derived from an application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldingPlan {
    /// Application name prefixing every object.
    app_name: String,
    /// Namespace of the ServiceAccount and checker Pod.
    control_namespace: String,
    /// Namespaced grants in provisioning order.
    grants: Vec<NamespaceGrant>,
    /// Cluster-wide rules.
    cluster_rules: Vec<PolicyRule>,
    /// Checker Pod, created by the executor.
    pod: Option<PodTemplate>,
}

impl ScaffoldingPlan {
    /// Builds the default plan: access to provider ServiceAccounts, tokens
    /// and checker Pods in `crossplane`, secrets in `mysql`, and read access
    /// to StorageClasses and Nodes.
    #[must_use]
    pub fn for_application(app_name: impl Into<String>, control_namespace: impl Into<String>) -> Self {
        let crossplane = NamespaceGrant {
            namespace: "crossplane".to_string(),
            rules: vec![
                PolicyRule::new(&[""], &["serviceaccounts"], &["get", "list"]),
                PolicyRule::new(&[""], &["serviceaccounts/token"], &["create"]),
                PolicyRule::new(&[""], &["pods"], &["get", "list", "create", "delete"]),
                PolicyRule::new(&[""], &["pods/log"], &["get"]),
            ],
        };
        let mysql = NamespaceGrant {
            namespace: "mysql".to_string(),
            rules: vec![PolicyRule::new(&[""], &["secrets"], &["get"])],
        };
        Self {
            app_name: app_name.into(),
            control_namespace: control_namespace.into(),
            grants: vec![crossplane, mysql],
            cluster_rules: vec![
                PolicyRule::new(&["storage.k8s.io"], &["storageclasses"], &["get", "list"]),
                PolicyRule::new(&[""], &["nodes"], &["get", "list"]),
            ],
            pod: None,
        }
    }

    /// Replaces the namespaced grants.
    #[must_use]
    pub fn with_grants(mut self, grants: Vec<NamespaceGrant>) -> Self {
        self.grants = grants;
        self
    }

    /// Attaches the checker Pod torn down with the scaffolding.
    #[must_use]
    pub fn with_pod(mut self, pod: PodTemplate) -> Self {
        self.pod = Some(pod);
        self
    }

    /// Returns the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the control namespace.
    #[must_use]
    pub fn control_namespace(&self) -> &str {
        &self.control_namespace
    }

    /// Returns the ServiceAccount name (`<app>-sa`).
    #[must_use]
    pub fn service_account(&self) -> String {
        format!("{}-sa", self.app_name)
    }

    /// Returns the checker Pod, if attached.
    #[must_use]
    pub const fn pod(&self) -> Option<&PodTemplate> {
        self.pod.as_ref()
    }

    /// Returns the namespaces ensured before provisioning, deduplicated.
    #[must_use]
    pub fn required_namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![self.control_namespace.clone()];
        for grant in &self.grants {
            if !namespaces.contains(&grant.namespace) {
                namespaces.push(grant.namespace.clone());
            }
        }
        namespaces
    }

    /// Returns the RBAC objects in provisioning order: ServiceAccount, Roles,
    /// ClusterRole, RoleBindings, ClusterRoleBinding.
    #[must_use]
    pub fn rbac_objects(&self) -> Vec<ClusterObject> {
        let role = format!("{}-role", self.app_name);
        let binding = format!("{}-rolebinding", self.app_name);
        let cluster_role = format!("{}-clusterrole", self.app_name);
        let service_account = self.service_account();

        let mut objects = vec![ClusterObject::ServiceAccount {
            namespace: self.control_namespace.clone(),
            name: service_account.clone(),
        }];
        objects.extend(self.grants.iter().map(|grant| ClusterObject::Role {
            namespace: grant.namespace.clone(),
            name: role.clone(),
            rules: grant.rules.clone(),
        }));
        objects.push(ClusterObject::ClusterRole {
            name: cluster_role.clone(),
            rules: self.cluster_rules.clone(),
        });
        objects.extend(self.grants.iter().map(|grant| ClusterObject::RoleBinding {
            namespace: grant.namespace.clone(),
            name: binding.clone(),
            role: role.clone(),
            subject_namespace: self.control_namespace.clone(),
            subject_name: service_account.clone(),
        }));
        objects.push(ClusterObject::ClusterRoleBinding {
            name: format!("{}-clusterrolebinding", self.app_name),
            cluster_role,
            subject_namespace: self.control_namespace.clone(),
            subject_name: service_account,
        });
        objects
    }

    /// Returns every object the plan owns, Pod last, in provisioning order.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceRef> {
        let mut resources = self.rbac_objects().iter().map(ClusterObject::resource).collect::<Vec<_>>();
        if let Some(pod) = &self.pod {
            resources.push(pod.resource());
        }
        resources
    }
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Default bound on each teardown deletion.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Objects created by this run.
    pub created: Vec<ResourceRef>,
    /// Objects that already existed and were adopted.
    pub adopted: Vec<ResourceRef>,
    /// Namespaces created by this run.
    pub namespaces_created: Vec<String>,
}

/// Provisions and tears down scaffolding.
pub struct ResourceLifecycleManager {
    /// Cluster backend.
    cluster: Arc<dyn ClusterApi>,
    /// Audit sink for resource events.
    audit: Arc<dyn AuditSink>,
    /// Bound on each teardown deletion.
    delete_timeout: Duration,
}

impl ResourceLifecycleManager {
    /// Builds a manager without audit output.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
            audit: Arc::new(NoopAuditSink),
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }

    /// Bounds each teardown deletion by `timeout`.
    #[must_use]
    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    /// Routes resource events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Ensures namespaces, then creates every RBAC object in order.
    ///
    /// Objects that already exist are adopted and later torn down with the
    /// rest of the plan.
    ///
    /// # Errors
    ///
    /// Returns the first creation failure other than "already exists".
    /// Objects created before the failure stay in place for teardown.
    pub async fn provision(&self, ctx: &CheckContext, plan: &ScaffoldingPlan) -> Result<ProvisionReport, CheckError> {
        let mut report = ProvisionReport::default();
        for namespace in plan.required_namespaces() {
            let object = ClusterObject::Namespace {
                name: namespace.clone(),
            };
            if !ctx.run("checking namespace", self.cluster.exists(&object.resource())).await?? {
                match self.create(ctx, &object).await? {
                    CreateOutcome::Created => report.namespaces_created.push(namespace),
                    CreateOutcome::Adopted => {}
                }
            }
        }
        for object in plan.rbac_objects() {
            let resource = object.resource();
            match self.create(ctx, &object).await? {
                CreateOutcome::Created => report.created.push(resource),
                CreateOutcome::Adopted => report.adopted.push(resource),
            }
        }
        Ok(report)
    }

    /// Deletes every object of the plan in exact reverse order.
    ///
    /// Every deletion is attempted; absent objects count as removed. A
    /// deletion that outlasts the delete timeout is recorded as a failure.
    ///
    /// # Errors
    ///
    /// Returns a [`CleanupError`] listing each object that could not be
    /// deleted, in teardown order.
    pub async fn teardown(&self, plan: &ScaffoldingPlan) -> Result<(), CleanupError> {
        let mut failures = Vec::new();
        for resource in plan.resources().iter().rev() {
            let namespace = resource.namespace.as_deref();
            let kind = resource.kind.as_str();
            match delete_within(self.cluster.as_ref(), resource, self.delete_timeout).await {
                Ok(()) => self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Deleted,
                    kind,
                    namespace,
                    &resource.name,
                )),
                Err(ClusterError::NotFound(_)) => self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Absent,
                    kind,
                    namespace,
                    &resource.name,
                )),
                Err(err) => {
                    self.audit.record_resource(
                        &ResourceAuditEvent::new(ResourceAction::DeleteFailed, kind, namespace, &resource.name)
                            .with_error(err.to_string()),
                    );
                    failures.push(CleanupFailure {
                        resource: resource.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError {
                failures,
            })
        }
    }

    /// Creates one object, adopting an existing one.
    async fn create(&self, ctx: &CheckContext, object: &ClusterObject) -> Result<CreateOutcome, CheckError> {
        let resource = object.resource();
        let namespace = resource.namespace.as_deref();
        let kind = resource.kind.as_str();
        match ctx.run("creating scaffolding", self.cluster.create(object)).await? {
            Ok(()) => {
                self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Created,
                    kind,
                    namespace,
                    &resource.name,
                ));
                Ok(CreateOutcome::Created)
            }
            Err(ClusterError::AlreadyExists(_)) => {
                self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Adopted,
                    kind,
                    namespace,
                    &resource.name,
                ));
                Ok(CreateOutcome::Adopted)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Result of a single create call.
enum CreateOutcome {
    /// Newly created.
    Created,
    /// Already present.
    Adopted,
}
