// crates/preflight-identity/src/tokens.rs
// ============================================================================
// Module: Federated Token Minting
// Description: Short-lived ServiceAccount tokens for provider audiences.
// Purpose: Produce the tokens the JWKS and exchange gates consume.
// Dependencies: preflight-cluster, preflight-config, preflight-core
// ============================================================================

//! ## Overview
//! A [`TokenPolicy`] fixes the namespace, ServiceAccount selection,
//! audience and lifetime for one provider. [`TokenMinter`] requests one
//! token per selected ServiceAccount through the cluster token API. Tokens
//! are never renewed; a stage that needs a fresh token mints a new one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use preflight_cluster::ClusterApi;
use preflight_cluster::TokenRequestSpec;
use preflight_config::TokenSettings;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::FederatedToken;

use crate::error::IdentityError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix of AWS provider ServiceAccounts.
pub const AWS_SERVICE_ACCOUNT_PREFIX: &str = "aws-";
/// Audience of tokens exchanged with AWS STS.
pub const AWS_AUDIENCE: &str = "amazonaws.com";
/// Azure provider ServiceAccount.
pub const AZURE_SERVICE_ACCOUNT: &str = "azure-provider-sa";
/// Audience of tokens exchanged with Azure AD.
pub const AZURE_AUDIENCE: &str = "api://AzureADTokenExchange";
/// GCP provider ServiceAccount, used by the in-cluster role checker.
pub const GCP_SERVICE_ACCOUNT: &str = "gcp-provider-sa";

// ============================================================================
// SECTION: Policy
// ============================================================================

/// ServiceAccounts a policy mints tokens for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
    /// Every ServiceAccount whose name starts with the prefix.
    Prefix(String),
    /// One named ServiceAccount.
    Named(String),
}

/// Token issuance parameters for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Namespace holding the provider ServiceAccounts.
    pub namespace: String,
    /// ServiceAccount selection.
    pub accounts: AccountSelector,
    /// Token audience.
    pub audience: String,
    /// Requested lifetime in seconds.
    pub expiration_seconds: i64,
}

impl TokenPolicy {
    /// Returns the policy for a federating provider; GCP does not federate.
    #[must_use]
    pub fn for_provider(provider: CloudProvider, settings: &TokenSettings) -> Option<Self> {
        let (accounts, audience) = match provider {
            CloudProvider::Aws => (AccountSelector::Prefix(AWS_SERVICE_ACCOUNT_PREFIX.to_string()), AWS_AUDIENCE),
            CloudProvider::Azure => (AccountSelector::Named(AZURE_SERVICE_ACCOUNT.to_string()), AZURE_AUDIENCE),
            CloudProvider::Gcp => return None,
        };
        Some(Self {
            namespace: settings.namespace.clone(),
            accounts,
            audience: audience.to_string(),
            expiration_seconds: settings.expiration_seconds,
        })
    }
}

// ============================================================================
// SECTION: Minter
// ============================================================================

/// Mints federated tokens through the cluster.
pub struct TokenMinter {
    /// Cluster backend.
    cluster: Arc<dyn ClusterApi>,
}

impl TokenMinter {
    /// Builds a minter.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
        }
    }

    /// Mints one token per selected ServiceAccount.
    ///
    /// Empty tokens returned by the cluster are skipped.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error when listing or issuance fails, and
    /// [`IdentityError::NoTokens`] when nothing was minted.
    pub async fn mint(&self, ctx: &CheckContext, policy: &TokenPolicy) -> Result<Vec<FederatedToken>, CheckError> {
        let accounts = match &policy.accounts {
            AccountSelector::Named(name) => vec![name.clone()],
            AccountSelector::Prefix(prefix) => ctx
                .run("listing service accounts", self.cluster.list_service_accounts(&policy.namespace))
                .await??
                .into_iter()
                .filter(|name| name.starts_with(prefix.as_str()))
                .collect(),
        };

        let mut tokens = Vec::with_capacity(accounts.len());
        for account in accounts {
            let request = TokenRequestSpec {
                namespace: policy.namespace.clone(),
                service_account: account.clone(),
                audience: policy.audience.clone(),
                expiration_seconds: policy.expiration_seconds,
            };
            let token = ctx.run("requesting service account token", self.cluster.request_token(&request)).await??;
            if token.is_empty() {
                continue;
            }
            tokens.push(FederatedToken::new(
                &policy.namespace,
                account,
                &policy.audience,
                policy.expiration_seconds,
                token,
            ));
        }
        if tokens.is_empty() {
            return Err(IdentityError::NoTokens.into());
        }
        Ok(tokens)
    }
}
