// crates/preflight-cluster/src/lib.rs
// ============================================================================
// Module: Preflight Cluster Library
// Description: Cluster access, ephemeral execution and scaffolding lifecycle.
// Purpose: Own every cluster-side effect of a preflight run.
// Dependencies: crate::{api, capability, executor, kube_cluster, lifecycle, memory}
// ============================================================================

//! ## Overview
//! Everything that touches the cluster goes through [`ClusterApi`]. On top
//! of it sit the [`EphemeralExecutor`] (run-to-completion checker Pods) and
//! the [`ResourceLifecycleManager`] (RBAC scaffolding with reverse-order
//! teardown), plus read-only capability checks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod capability;
pub mod executor;
pub mod kube_cluster;
pub mod lifecycle;
pub mod memory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::ClusterApi;
pub use api::ClusterError;
pub use api::ClusterObject;
pub use api::NodeInfo;
pub use api::PodPhase;
pub use api::PodTemplate;
pub use api::PolicyRule;
pub use api::ResourceKind;
pub use api::ResourceRef;
pub use api::StorageClassInfo;
pub use api::TokenRequestSpec;
pub use executor::EphemeralExecutor;
pub use executor::ExecutorTiming;
pub use kube_cluster::KubeCluster;
pub use lifecycle::NamespaceGrant;
pub use lifecycle::ProvisionReport;
pub use lifecycle::ResourceLifecycleManager;
pub use lifecycle::ScaffoldingPlan;
pub use memory::InMemoryCluster;
