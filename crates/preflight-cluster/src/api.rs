// crates/preflight-cluster/src/api.rs
// ============================================================================
// Module: Cluster API Seam
// Description: Backend-agnostic cluster operations used by the checks.
// Purpose: Keep executor and lifecycle logic independent of the client library.
// Dependencies: async-trait, preflight-core, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`ClusterApi`] is the narrow set of cluster calls the engine needs:
//! create and delete a handful of object kinds, read Pod phase and logs,
//! mint ServiceAccount tokens and list StorageClasses and Nodes. The
//! production backend is [`crate::KubeCluster`]; tests use
//! [`crate::InMemoryCluster`].
//!
//! Backends map "already exists" and "not found" responses to the dedicated
//! [`ClusterError`] variants; callers rely on them for adoption and
//! idempotent teardown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use preflight_core::CheckError;
use thiserror::Error;

// ============================================================================
// SECTION: Resource Identity
// ============================================================================

/// Object kinds managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Namespace.
    Namespace,
    /// ServiceAccount.
    ServiceAccount,
    /// Namespaced Role.
    Role,
    /// ClusterRole.
    ClusterRole,
    /// Namespaced RoleBinding.
    RoleBinding,
    /// ClusterRoleBinding.
    ClusterRoleBinding,
    /// Pod.
    Pod,
}

impl ResourceKind {
    /// Returns the Kubernetes kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::ServiceAccount => "ServiceAccount",
            Self::Role => "Role",
            Self::ClusterRole => "ClusterRole",
            Self::RoleBinding => "RoleBinding",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
            Self::Pod => "Pod",
        }
    }
}

/// Reference to a single cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    /// Object kind.
    pub kind: ResourceKind,
    /// Namespace for namespaced kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl ResourceRef {
    /// References a namespaced object.
    #[must_use]
    pub fn namespaced(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// References a cluster-scoped object.
    #[must_use]
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }

    /// References a Pod.
    #[must_use]
    pub fn pod(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::namespaced(ResourceKind::Pod, namespace, name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {namespace}/{}", self.kind.as_str(), self.name),
            None => write!(f, "{} {}", self.kind.as_str(), self.name),
        }
    }
}

// ============================================================================
// SECTION: Object Specifications
// ============================================================================

/// RBAC rule granting verbs on resources of the given API groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// API groups (`""` is the core group).
    pub api_groups: Vec<String>,
    /// Resource names, including subresources such as `pods/log`.
    pub resources: Vec<String>,
    /// Allowed verbs.
    pub verbs: Vec<String>,
}

impl PolicyRule {
    /// Builds a rule from string slices.
    #[must_use]
    pub fn new(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> Self {
        Self {
            api_groups: api_groups.iter().map(ToString::to_string).collect(),
            resources: resources.iter().map(ToString::to_string).collect(),
            verbs: verbs.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Single-container Pod that runs to completion.
///
/// # Invariants
/// - Restart policy is always `Never`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTemplate {
    /// Pod namespace.
    pub namespace: String,
    /// Reserved Pod name.
    pub name: String,
    /// ServiceAccount the Pod runs as.
    pub service_account: String,
    /// Container image.
    pub image: String,
    /// Container command and arguments.
    pub command: Vec<String>,
    /// Container environment.
    pub env: BTreeMap<String, String>,
}

impl PodTemplate {
    /// Returns the Pod reference.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::pod(&self.namespace, &self.name)
    }
}

/// Object to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterObject {
    /// Namespace.
    Namespace {
        /// Namespace name.
        name: String,
    },
    /// ServiceAccount.
    ServiceAccount {
        /// Namespace.
        namespace: String,
        /// Name.
        name: String,
    },
    /// Namespaced Role.
    Role {
        /// Namespace.
        namespace: String,
        /// Name.
        name: String,
        /// Granted rules.
        rules: Vec<PolicyRule>,
    },
    /// ClusterRole.
    ClusterRole {
        /// Name.
        name: String,
        /// Granted rules.
        rules: Vec<PolicyRule>,
    },
    /// RoleBinding of a Role to a ServiceAccount.
    RoleBinding {
        /// Namespace.
        namespace: String,
        /// Name.
        name: String,
        /// Bound Role name.
        role: String,
        /// Subject ServiceAccount namespace.
        subject_namespace: String,
        /// Subject ServiceAccount name.
        subject_name: String,
    },
    /// ClusterRoleBinding of a ClusterRole to a ServiceAccount.
    ClusterRoleBinding {
        /// Name.
        name: String,
        /// Bound ClusterRole name.
        cluster_role: String,
        /// Subject ServiceAccount namespace.
        subject_namespace: String,
        /// Subject ServiceAccount name.
        subject_name: String,
    },
    /// Run-to-completion Pod.
    Pod(PodTemplate),
}

impl ClusterObject {
    /// Returns the reference identifying this object.
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        match self {
            Self::Namespace {
                name,
            } => ResourceRef::cluster(ResourceKind::Namespace, name),
            Self::ServiceAccount {
                namespace,
                name,
            } => ResourceRef::namespaced(ResourceKind::ServiceAccount, namespace, name),
            Self::Role {
                namespace,
                name,
                ..
            } => ResourceRef::namespaced(ResourceKind::Role, namespace, name),
            Self::ClusterRole {
                name, ..
            } => ResourceRef::cluster(ResourceKind::ClusterRole, name),
            Self::RoleBinding {
                namespace,
                name,
                ..
            } => ResourceRef::namespaced(ResourceKind::RoleBinding, namespace, name),
            Self::ClusterRoleBinding {
                name, ..
            } => ResourceRef::cluster(ResourceKind::ClusterRoleBinding, name),
            Self::Pod(pod) => pod.resource(),
        }
    }
}

/// Pod lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not all containers started.
    Pending,
    /// At least one container running.
    Running,
    /// All containers exited zero.
    Succeeded,
    /// A container exited non-zero.
    Failed,
    /// Phase not reported.
    Unknown,
}

impl PodPhase {
    /// Parses the phase string reported by the API server.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Returns the phase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Bound ServiceAccount token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequestSpec {
    /// ServiceAccount namespace.
    pub namespace: String,
    /// ServiceAccount name.
    pub service_account: String,
    /// Requested audience.
    pub audience: String,
    /// Requested lifetime in seconds.
    pub expiration_seconds: i64,
}

/// StorageClass summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassInfo {
    /// StorageClass name.
    pub name: String,
    /// Metadata annotations.
    pub annotations: BTreeMap<String, String>,
}

/// Node summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Node name.
    pub name: String,
    /// Metadata labels.
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cluster API failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Object does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// Object already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// API server rejected the request.
    #[error("cluster api error ({code}): {message}")]
    Api {
        /// HTTP status code.
        code: u16,
        /// Server message.
        message: String,
    },
    /// Client or transport failure.
    #[error("cluster transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    /// Returns true for [`ClusterError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ClusterError> for CheckError {
    fn from(err: ClusterError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Cluster operations used by the engine.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Creates an object.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::AlreadyExists`] when the name is taken.
    async fn create(&self, object: &ClusterObject) -> Result<(), ClusterError>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] when the object is absent.
    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError>;

    /// Returns true when the object exists (including while terminating).
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] on API failure.
    async fn exists(&self, resource: &ResourceRef) -> Result<bool, ClusterError>;

    /// Returns the current Pod phase.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] when the Pod is absent.
    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, ClusterError>;

    /// Returns the complete container log of a Pod.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] when logs cannot be read.
    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String, ClusterError>;

    /// Lists ServiceAccount names in a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] on API failure.
    async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<String>, ClusterError>;

    /// Requests a bound token for a ServiceAccount.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] when the ServiceAccount is absent.
    async fn request_token(&self, request: &TokenRequestSpec) -> Result<String, ClusterError>;

    /// Lists StorageClasses.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] on API failure.
    async fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ClusterError>;

    /// Lists Nodes matching a label selector.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] on API failure.
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<NodeInfo>, ClusterError>;
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Deletes `resource`, giving up after `timeout`.
///
/// Cleanup runs outside the check deadline, so each deletion carries its
/// own bound.
///
/// # Errors
///
/// Returns the backend error, or [`ClusterError::Transport`] when the call
/// did not finish within `timeout`.
pub async fn delete_within(
    cluster: &dyn ClusterApi,
    resource: &ResourceRef,
    timeout: Duration,
) -> Result<(), ClusterError> {
    tokio::time::timeout(timeout, cluster.delete(resource)).await.unwrap_or_else(|_| {
        Err(ClusterError::Transport(format!("deleting {resource} did not finish within {}s", timeout.as_secs())))
    })
}
