// crates/preflight-cluster/tests/common/mod.rs
// =============================================================================
// Module: Cluster Test Helpers
// Description: Shared fixtures for executor and lifecycle tests.
// Purpose: Reduce duplication across integration tests for preflight-cluster.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use preflight_cluster::EphemeralExecutor;
use preflight_cluster::ExecutorTiming;
use preflight_cluster::InMemoryCluster;
use preflight_cluster::PodTemplate;

/// Namespace of checker Pods in these tests.
pub const NAMESPACE: &str = "crossplane";
/// Reserved checker Pod name.
pub const POD: &str = "checker";

/// Returns a checker Pod template.
pub fn pod() -> PodTemplate {
    PodTemplate {
        namespace: NAMESPACE.to_string(),
        name: POD.to_string(),
        service_account: "gcp-provider-sa".to_string(),
        image: "google/cloud-sdk:latest".to_string(),
        command: vec!["/bin/bash".to_string(), "-c".to_string(), "echo ok".to_string()],
        env: BTreeMap::new(),
    }
}

/// Returns short test timings.
pub const fn timing() -> ExecutorTiming {
    ExecutorTiming {
        poll_interval: Duration::from_secs(1),
        job_timeout: Duration::from_secs(10),
        removal_timeout: Duration::from_secs(10),
    }
}

/// Builds an executor over a shared in-memory cluster.
pub fn executor(cluster: &InMemoryCluster) -> EphemeralExecutor {
    EphemeralExecutor::new(Arc::new(cluster.clone()), timing())
}

/// Returns the operation log entries starting with `prefix`.
pub fn operations_with(cluster: &InMemoryCluster, prefix: &str) -> Vec<String> {
    cluster.operations().into_iter().filter(|operation| operation.starts_with(prefix)).collect()
}
