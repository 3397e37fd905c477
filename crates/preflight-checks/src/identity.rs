// crates/preflight-checks/src/identity.rs
// ============================================================================
// Module: Identity Stages
// Description: Issuer, discovery, token issuance and verification stages.
// Purpose: Run the federated identity gates as pipeline stages.
// Dependencies: async-trait, preflight-core, preflight-identity
// ============================================================================

//! ## Overview
//! Four stages run in order and hand values forward:
//! - issuer shape: no inputs, no outputs
//! - discovery: emits the JWKS URI
//! - issuance: forwards the JWKS URI and adds the minted tokens
//! - verification: consumes both and forwards the tokens

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::Stage;
use preflight_core::StageId;
use preflight_core::StageInputs;
use preflight_core::StageOutputs;
use preflight_core::StageValue;
use preflight_identity::JwksVerifier;
use preflight_identity::OidcDiscovery;
use preflight_identity::TokenMinter;
use preflight_identity::TokenPolicy;
use preflight_identity::validate_issuer;

// ============================================================================
// SECTION: Issuer
// ============================================================================

/// Configured OIDC issuer and the document field it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerTarget {
    /// Provider whose issuer shape applies.
    pub provider: CloudProvider,
    /// Environment document field, used in configuration errors.
    pub field: String,
    /// Issuer URL as configured.
    pub issuer: String,
}

impl IssuerTarget {
    /// Returns the environment document field of a provider's issuer.
    #[must_use]
    pub fn field_for(provider: CloudProvider) -> String {
        format!("spec.cloudSpec.{provider}.oidcUrl")
    }
}

/// Validates the issuer URL shape without network access.
pub struct OidcIssuerStage {
    /// Issuer to validate.
    target: IssuerTarget,
}

impl OidcIssuerStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(target: IssuerTarget) -> Self {
        Self {
            target,
        }
    }
}

#[async_trait]
impl Stage for OidcIssuerStage {
    fn id(&self) -> StageId {
        StageId::OidcIssuer
    }

    async fn handle(&self, _ctx: &CheckContext, _inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        validate_issuer(self.target.provider, &self.target.field, &self.target.issuer)?;
        Ok(StageOutputs::none())
    }
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Discovers the issuer's JWKS URI.
pub struct JwksDiscoveryStage {
    /// Discovery client.
    discovery: OidcDiscovery,
    /// Issuer to query.
    target: IssuerTarget,
}

impl JwksDiscoveryStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(discovery: OidcDiscovery, target: IssuerTarget) -> Self {
        Self {
            discovery,
            target,
        }
    }
}

#[async_trait]
impl Stage for JwksDiscoveryStage {
    fn id(&self) -> StageId {
        StageId::JwksDiscovery
    }

    async fn handle(&self, ctx: &CheckContext, _inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let uri = self.discovery.jwks_uri(ctx, &self.target.field, &self.target.issuer).await?;
        Ok(StageOutputs::none().with(StageValue::JwksUri(uri)))
    }
}

// ============================================================================
// SECTION: Issuance
// ============================================================================

/// Mints federated tokens for the provider ServiceAccounts.
pub struct TokenIssuanceStage {
    /// Token minter.
    minter: TokenMinter,
    /// Issuance parameters.
    policy: TokenPolicy,
}

impl TokenIssuanceStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(minter: TokenMinter, policy: TokenPolicy) -> Self {
        Self {
            minter,
            policy,
        }
    }
}

#[async_trait]
impl Stage for TokenIssuanceStage {
    fn id(&self) -> StageId {
        StageId::TokenIssuance
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let jwks_uri = inputs.take_jwks_uri()?;
        let tokens = self.minter.mint(ctx, &self.policy).await?;
        Ok(StageOutputs::none().with(StageValue::JwksUri(jwks_uri)).with(StageValue::Tokens(tokens)))
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies every minted token against the discovered key set.
pub struct TokenVerificationStage {
    /// JWKS verifier.
    verifier: JwksVerifier,
}

impl TokenVerificationStage {
    /// Builds the stage.
    #[must_use]
    pub const fn new(verifier: JwksVerifier) -> Self {
        Self {
            verifier,
        }
    }
}

#[async_trait]
impl Stage for TokenVerificationStage {
    fn id(&self) -> StageId {
        StageId::TokenVerification
    }

    async fn handle(&self, ctx: &CheckContext, mut inputs: StageInputs) -> Result<StageOutputs, CheckError> {
        let jwks_uri = inputs.take_jwks_uri()?;
        let tokens = inputs.take_tokens()?;
        self.verifier.verify_all(ctx, &jwks_uri, &tokens).await?;
        Ok(StageOutputs::none().with(StageValue::Tokens(tokens)))
    }
}
