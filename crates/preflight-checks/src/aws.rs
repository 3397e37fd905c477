// crates/preflight-checks/src/aws.rs
// ============================================================================
// Module: AWS Stages
// Description: STS exchange and IAM policy comparison stages.
// Purpose: Verify the provider role trust and boundary policies.
// Dependencies: async-trait, preflight-core, preflight-identity
// ============================================================================

//! ## Overview
//! Every minted token is exchanged so a rejected ServiceAccount fails the
//! check; the first token's credentials are forwarded to the policy stages.
//! Policy stages re-emit the credentials for the stage after them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use preflight_core::AwsCredentials;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudCredentials;
use preflight_core::CloudProvider;
use preflight_core::ExpectedPolicyRegistry;
use preflight_core::PolicyEquivalenceEngine;
use preflight_core::PolicyKind;
use preflight_core::Stage;
use preflight_core::StageId;
use preflight_core::StageInputs;
use preflight_core::StageOutputs;
use preflight_core::StageValue;
use preflight_identity::AwsTrustPath;

use crate::compare::require_equivalent;

// ============================================================================
// SECTION: Target
// ============================================================================

/// Account and cluster the provider role belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsTarget {
    /// AWS account identifier.
    pub account_id: String,
    /// Cluster name used in role and policy names.
    pub cluster: String,
}

/// Takes AWS credentials from the stage inputs.
fn take_aws_credentials(inputs: &mut StageInputs) -> Result<AwsCredentials, CheckError> {
    match inputs.take_credentials()? {
        CloudCredentials::Aws(credentials) => Ok(credentials),
        CloudCredentials::Azure(_) => Err(CheckError::Contract("expected AWS credentials, received Azure".to_string())),
    }
}

/// Wraps credentials as a stage output.
fn forward(credentials: AwsCredentials) -> StageOutputs {
    StageOutputs::none().with(StageValue::Credentials(CloudCredentials::Aws(credentials)))
}

// ============================================================================
// SECTION: Exchange
// ============================================================================

/// Exchanges every federated token through STS.
pub struct AwsExchangeStage {
    /// Trust path.
    trust: AwsTrustPath,
    /// Role owner.
    target: AwsTarget,
}

impl AwsExchangeStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(trust: AwsTrustPath, target: AwsTarget) -> Self {
        Self {
            trust,
            target,
        }
    }
}

#[async_trait]
impl Stage for AwsExchangeStage {
    fn id(&self) -> StageId {
        StageId::CredentialExchange
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let tokens = inputs.take_tokens()?;
        let mut first = None;
        for token in &tokens {
            ctx.ensure_active("exchanging federated tokens")?;
            let credentials = self.trust.exchange(ctx, &self.target.account_id, &self.target.cluster, token).await?;
            if first.is_none() {
                first = Some(credentials);
            }
        }
        let credentials = first.ok_or_else(|| CheckError::Protocol("no JWTs retrieved".to_string()))?;
        Ok(forward(credentials))
    }
}

// ============================================================================
// SECTION: Policies
// ============================================================================

/// Compares the provider role's trust policy with the expected template.
pub struct AwsTrustPolicyStage {
    /// Trust path.
    trust: AwsTrustPath,
    /// Role owner.
    target: AwsTarget,
    /// Equivalence engine with placeholders bound.
    engine: PolicyEquivalenceEngine,
    /// Expected templates.
    registry: Arc<ExpectedPolicyRegistry>,
}

impl AwsTrustPolicyStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(
        trust: AwsTrustPath,
        target: AwsTarget,
        engine: PolicyEquivalenceEngine,
        registry: Arc<ExpectedPolicyRegistry>,
    ) -> Self {
        Self {
            trust,
            target,
            engine,
            registry,
        }
    }
}

#[async_trait]
impl Stage for AwsTrustPolicyStage {
    fn id(&self) -> StageId {
        StageId::TrustPolicy
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let credentials = take_aws_credentials(&mut inputs)?;
        let observed = self.trust.trust_policy(ctx, &credentials, &self.target.cluster).await?;
        require_equivalent(&self.engine, &self.registry, CloudProvider::Aws, PolicyKind::AssumeRoleTrust, &observed)?;
        Ok(forward(credentials))
    }
}

/// Compares the default version of the permission boundary.
pub struct AwsBoundaryPolicyStage {
    /// Trust path.
    trust: AwsTrustPath,
    /// Policy owner.
    target: AwsTarget,
    /// Equivalence engine with placeholders bound.
    engine: PolicyEquivalenceEngine,
    /// Expected templates.
    registry: Arc<ExpectedPolicyRegistry>,
}

impl AwsBoundaryPolicyStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(
        trust: AwsTrustPath,
        target: AwsTarget,
        engine: PolicyEquivalenceEngine,
        registry: Arc<ExpectedPolicyRegistry>,
    ) -> Self {
        Self {
            trust,
            target,
            engine,
            registry,
        }
    }
}

#[async_trait]
impl Stage for AwsBoundaryPolicyStage {
    fn id(&self) -> StageId {
        StageId::BoundaryPolicy
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let credentials = take_aws_credentials(&mut inputs)?;
        let observed = self
            .trust
            .boundary_policy(ctx, &credentials, &self.target.account_id, &self.target.cluster)
            .await?;
        require_equivalent(
            &self.engine,
            &self.registry,
            CloudProvider::Aws,
            PolicyKind::PermissionBoundary,
            &observed,
        )?;
        Ok(forward(credentials))
    }
}
