// crates/preflight-cluster/src/capability.rs
// ============================================================================
// Module: Cluster Capability Checks
// Description: Default StorageClass and GPU node group presence checks.
// Purpose: Fail early when the cluster cannot host the workload.
// Dependencies: crate::api, preflight-core
// ============================================================================

//! ## Overview
//! Read-only checks against cluster-scoped objects. A missing capability is
//! reported as a protocol violation: the environment does not match what
//! the rollout expects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preflight_core::CheckContext;
use preflight_core::CheckError;

use crate::api::ClusterApi;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Annotation marking the default StorageClass.
pub const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Returns the name of the default StorageClass.
///
/// # Errors
///
/// Returns [`CheckError::Protocol`] when no class carries the default
/// annotation, or the cluster error when listing fails.
pub async fn default_storage_class(cluster: &dyn ClusterApi, ctx: &CheckContext) -> Result<String, CheckError> {
    let classes = ctx.run("listing storage classes", cluster.list_storage_classes()).await??;
    classes
        .into_iter()
        .find(|class| class.annotations.get(DEFAULT_CLASS_ANNOTATION).is_some_and(|value| value == "true"))
        .map(|class| class.name)
        .ok_or_else(|| CheckError::Protocol("no default storage class found".to_string()))
}

/// Returns the names of nodes matching `label_selector`.
///
/// # Errors
///
/// Returns [`CheckError::Protocol`] when no node matches.
pub async fn gpu_nodes(
    cluster: &dyn ClusterApi,
    ctx: &CheckContext,
    label_selector: &str,
) -> Result<Vec<String>, CheckError> {
    let nodes = ctx.run("listing gpu nodes", cluster.list_nodes(label_selector)).await??;
    if nodes.is_empty() {
        return Err(CheckError::Protocol("no nodes with GPU label found".to_string()));
    }
    Ok(nodes.into_iter().map(|node| node.name).collect())
}
