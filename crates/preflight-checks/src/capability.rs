// crates/preflight-checks/src/capability.rs
// ============================================================================
// Module: Capability Stages
// Description: Storage class and GPU node group checks.
// Purpose: Run optional cluster capability checks inside a pipeline.
// Dependencies: async-trait, preflight-cluster, preflight-core
// ============================================================================

//! ## Overview
//! Capability stages ignore their inputs and forward them untouched, so
//! they can sit anywhere after the provider stages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use preflight_cluster::ClusterApi;
use preflight_cluster::capability;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::Stage;
use preflight_core::StageId;
use preflight_core::StageInputs;
use preflight_core::StageOutputs;

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Requires a default StorageClass.
pub struct StorageClassStage {
    /// Cluster backend.
    cluster: Arc<dyn ClusterApi>,
}

impl StorageClassStage {
    /// Builds the stage.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
        }
    }
}

#[async_trait]
impl Stage for StorageClassStage {
    fn id(&self) -> StageId {
        StageId::StorageClass
    }

    async fn handle(&self, ctx: &CheckContext, _inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        capability::default_storage_class(self.cluster.as_ref(), ctx).await?;
        Ok(StageOutputs::none())
    }
}

/// Requires at least one node matching the GPU label selector.
pub struct NodeGroupStage {
    /// Cluster backend.
    cluster: Arc<dyn ClusterApi>,
    /// `key=value` node label selector.
    selector: String,
}

impl NodeGroupStage {
    /// Builds the stage.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>, selector: impl Into<String>) -> Self {
        Self {
            cluster,
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Stage for NodeGroupStage {
    fn id(&self) -> StageId {
        StageId::NodeGroup
    }

    async fn handle(&self, ctx: &CheckContext, _inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        capability::gpu_nodes(self.cluster.as_ref(), ctx, &self.selector).await?;
        Ok(StageOutputs::none())
    }
}
