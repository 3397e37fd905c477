// crates/preflight-checks/src/azure.rs
// ============================================================================
// Module: Azure Stages
// Description: Client-assertion exchange and role permission stages.
// Purpose: Verify the provider role grants every expected action.
// Dependencies: async-trait, preflight-core, preflight-identity
// ============================================================================

//! ## Overview
//! Only the first minted token is exchanged; a single ServiceAccount backs
//! the Azure provider.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudCredentials;
use preflight_core::CloudProvider;
use preflight_core::ExpectedPolicyRegistry;
use preflight_core::Stage;
use preflight_core::StageId;
use preflight_core::StageInputs;
use preflight_core::StageOutputs;
use preflight_core::StageValue;
use preflight_identity::AzureTrustPath;

use crate::compare::require_contains;

// ============================================================================
// SECTION: Target
// ============================================================================

/// Tenant, subscription and cluster of the provider role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureTarget {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Workload identity client id.
    pub client_id: String,
    /// Subscription id.
    pub subscription_id: String,
    /// Resource group holding the cluster.
    pub resource_group: String,
    /// Cluster name used in the role name.
    pub cluster: String,
}

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Exchanges the first federated token for a resource-manager token.
pub struct AzureExchangeStage {
    /// Trust path.
    trust: AzureTrustPath,
    /// Role owner.
    target: AzureTarget,
}

impl AzureExchangeStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(trust: AzureTrustPath, target: AzureTarget) -> Self {
        Self {
            trust,
            target,
        }
    }
}

#[async_trait]
impl Stage for AzureExchangeStage {
    fn id(&self) -> StageId {
        StageId::CredentialExchange
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let tokens = inputs.take_tokens()?;
        let token = tokens.first().ok_or_else(|| CheckError::Protocol("no JWTs retrieved".to_string()))?;
        let credentials = self.trust.exchange(ctx, &self.target.tenant_id, &self.target.client_id, token).await?;
        Ok(StageOutputs::none().with(StageValue::Credentials(CloudCredentials::Azure(credentials))))
    }
}

/// Checks the provider role holds every expected action.
pub struct AzureRolePermissionsStage {
    /// Trust path.
    trust: AzureTrustPath,
    /// Role owner.
    target: AzureTarget,
    /// Expected listings.
    registry: Arc<ExpectedPolicyRegistry>,
}

impl AzureRolePermissionsStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(trust: AzureTrustPath, target: AzureTarget, registry: Arc<ExpectedPolicyRegistry>) -> Self {
        Self {
            trust,
            target,
            registry,
        }
    }
}

#[async_trait]
impl Stage for AzureRolePermissionsStage {
    fn id(&self) -> StageId {
        StageId::RolePermissions
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let credentials = match inputs.take_credentials()? {
            CloudCredentials::Azure(credentials) => credentials,
            CloudCredentials::Aws(_) => {
                return Err(CheckError::Contract("expected Azure credentials, received AWS".to_string()));
            }
        };
        let observed = self
            .trust
            .role_permissions(
                ctx,
                &credentials,
                &self.target.subscription_id,
                &self.target.resource_group,
                &self.target.cluster,
            )
            .await?;
        require_contains(&self.registry, CloudProvider::Azure, &observed)?;
        Ok(StageOutputs::none())
    }
}
