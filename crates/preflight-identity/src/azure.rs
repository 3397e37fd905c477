// crates/preflight-identity/src/azure.rs
// ============================================================================
// Module: Azure Federation
// Description: Client-assertion exchange and role definition retrieval.
// Purpose: Prove the AKS trust path and read the provider role's actions.
// Dependencies: async-trait, serde, crate::{error, http}
// ============================================================================

//! ## Overview
//! A federated token is exchanged for a resource-manager bearer token with
//! the client-assertion grant. Role definitions at the resource-group scope
//! are listed (following `nextLink`), the provider role is located by name,
//! fetched by id, and its actions are flattened into a permission set.
//! Duplicate actions are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use preflight_config::AzureSettings;
use preflight_core::AzureCredentials;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::FederatedToken;
use preflight_core::PermissionSet;
use serde::Deserialize;
use serde::Serialize;

use crate::error::IdentityError;
use crate::http::HttpFetcher;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suffix of the provider role name.
const ROLE_NAME_SUFFIX: &str = "crossplane-provider";

/// Client assertion type for federated credentials.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Upper bound on role definition pages followed.
const MAX_PAGES: usize = 100;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Role definition as returned by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Fully qualified resource id.
    pub id: String,
    /// Definition body.
    #[serde(default)]
    pub properties: RoleDefinitionProperties,
}

/// Role definition body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinitionProperties {
    /// Display name.
    #[serde(rename = "roleName", default)]
    pub role_name: String,
    /// Permission blocks.
    #[serde(default)]
    pub permissions: Vec<RolePermission>,
}

/// One permission block of a role definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Allowed actions.
    #[serde(default)]
    pub actions: Vec<String>,
}

/// One page of a role definition listing.
#[derive(Debug, Deserialize)]
struct RoleDefinitionPage {
    /// Definitions on this page.
    #[serde(default)]
    value: Vec<RoleDefinition>,
    /// Next page URL.
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

/// Token endpoint answer.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Bearer token.
    access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<u64>,
}

// ============================================================================
// SECTION: Naming
// ============================================================================

/// Returns the provider role name for a cluster.
#[must_use]
pub fn role_name(cluster: &str) -> String {
    format!("{cluster}-{ROLE_NAME_SUFFIX}")
}

/// Returns the resource-group scope.
#[must_use]
pub fn scope(subscription_id: &str, resource_group: &str) -> String {
    format!("subscriptions/{subscription_id}/resourceGroups/{resource_group}")
}

/// Returns the last path segment of a resource id.
#[must_use]
pub fn role_id(resource_id: &str) -> &str {
    resource_id.rsplit('/').next().unwrap_or(resource_id)
}

/// Finds the id of the definition named `name`.
///
/// # Errors
///
/// Returns "role ID not found" when no definition carries the name.
pub fn find_role_id(definitions: &[RoleDefinition], name: &str) -> Result<String, IdentityError> {
    definitions
        .iter()
        .find(|definition| definition.properties.role_name == name)
        .map(|definition| role_id(&definition.id).to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| IdentityError::Inconsistent("role ID not found".to_string()))
}

/// Flattens every action of a definition into a set.
///
/// # Errors
///
/// Returns "duplicate permission: X" when an action repeats.
pub fn flatten_actions(definition: &RoleDefinition) -> Result<PermissionSet, IdentityError> {
    let actions = definition.properties.permissions.iter().flat_map(|block| block.actions.iter().cloned());
    PermissionSet::from_unique(actions).map_err(|err| IdentityError::Inconsistent(err.to_string()))
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Token exchange with the identity platform.
#[async_trait]
pub trait AzureFederation: Send + Sync {
    /// Exchanges a federated token for a resource-manager bearer token.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] when the exchange is rejected.
    async fn exchange_assertion(
        &self,
        tenant_id: &str,
        client_id: &str,
        assertion: &str,
    ) -> Result<AzureCredentials, IdentityError>;
}

/// Role definition reads.
#[async_trait]
pub trait RoleDefinitionReader: Send + Sync {
    /// Lists every role definition at `scope`.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] when a page cannot be read.
    async fn list_role_definitions(
        &self,
        credentials: &AzureCredentials,
        scope: &str,
    ) -> Result<Vec<RoleDefinition>, IdentityError>;

    /// Fetches one role definition by id.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] when the definition cannot be read.
    async fn get_role_definition(
        &self,
        credentials: &AzureCredentials,
        scope: &str,
        role_id: &str,
    ) -> Result<RoleDefinition, IdentityError>;
}

// ============================================================================
// SECTION: Trust Path
// ============================================================================

/// Exchanges tokens and reads the provider role.
#[derive(Clone)]
pub struct AzureTrustPath {
    /// Token exchange.
    federation: Arc<dyn AzureFederation>,
    /// Role definition reads.
    roles: Arc<dyn RoleDefinitionReader>,
}

impl AzureTrustPath {
    /// Builds a trust path.
    #[must_use]
    pub fn new(federation: Arc<dyn AzureFederation>, roles: Arc<dyn RoleDefinitionReader>) -> Self {
        Self {
            federation,
            roles,
        }
    }

    /// Exchanges a token for a resource-manager bearer token.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error when the exchange is rejected.
    pub async fn exchange(
        &self,
        ctx: &CheckContext,
        tenant_id: &str,
        client_id: &str,
        token: &FederatedToken,
    ) -> Result<AzureCredentials, CheckError> {
        let exchange = self.federation.exchange_assertion(tenant_id, client_id, token.secret());
        Ok(ctx.run("exchanging client assertion", exchange).await??)
    }

    /// Returns the flattened actions of the cluster's provider role.
    ///
    /// # Errors
    ///
    /// Returns "role ID not found" or "duplicate permission: X" as protocol
    /// violations, or an infrastructure error on API failure.
    pub async fn role_permissions(
        &self,
        ctx: &CheckContext,
        credentials: &AzureCredentials,
        subscription_id: &str,
        resource_group: &str,
        cluster: &str,
    ) -> Result<PermissionSet, CheckError> {
        let scope = scope(subscription_id, resource_group);
        let definitions =
            ctx.run("listing role definitions", self.roles.list_role_definitions(credentials, &scope)).await??;
        let id = find_role_id(&definitions, &role_name(cluster))?;
        let definition =
            ctx.run("reading role definition", self.roles.get_role_definition(credentials, &scope, &id)).await??;
        Ok(flatten_actions(&definition)?)
    }
}

// ============================================================================
// SECTION: REST Client
// ============================================================================

/// Identity platform and resource manager over REST.
#[derive(Debug, Clone)]
pub struct AzureRestClient {
    /// Shared HTTP client.
    http: HttpFetcher,
    /// Endpoints and API version.
    settings: AzureSettings,
}

impl AzureRestClient {
    /// Builds a client.
    #[must_use]
    pub const fn new(http: HttpFetcher, settings: AzureSettings) -> Self {
        Self {
            http,
            settings,
        }
    }

    /// Builds a role definitions URL below `scope`.
    fn role_definitions_url(&self, scope: &str, role_id: Option<&str>) -> String {
        let base = self.settings.management_endpoint.trim_end_matches('/');
        let suffix = role_id.map(|id| format!("/{id}")).unwrap_or_default();
        format!(
            "{base}/{scope}/providers/Microsoft.Authorization/roleDefinitions{suffix}?api-version={}",
            self.settings.api_version
        )
    }
}

#[async_trait]
impl AzureFederation for AzureRestClient {
    async fn exchange_assertion(
        &self,
        tenant_id: &str,
        client_id: &str,
        assertion: &str,
    ) -> Result<AzureCredentials, IdentityError> {
        let authority = self.settings.authority_host.trim_end_matches('/');
        let url = self.http.parse_url("azure.authority_host", &format!("{authority}/{tenant_id}/oauth2/v2.0/token"))?;
        let scope = self.settings.management_scope();
        let fields = [
            ("client_id", client_id),
            ("scope", scope.as_str()),
            ("grant_type", "client_credentials"),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion),
        ];
        let response: TokenResponse = self.http.post_form(&url, &fields).await?;
        Ok(AzureCredentials {
            access_token: response.access_token,
            expires_in_secs: response.expires_in,
        })
    }
}

#[async_trait]
impl RoleDefinitionReader for AzureRestClient {
    async fn list_role_definitions(
        &self,
        credentials: &AzureCredentials,
        scope: &str,
    ) -> Result<Vec<RoleDefinition>, IdentityError> {
        let mut definitions = Vec::new();
        let mut next = Some(self.role_definitions_url(scope, None));
        let mut pages = 0_usize;
        while let Some(link) = next {
            if pages == MAX_PAGES {
                return Err(IdentityError::Inconsistent(format!(
                    "role definition listing exceeded {MAX_PAGES} pages"
                )));
            }
            pages += 1;
            let url = self.http.parse_url("nextLink", &link)?;
            let page: RoleDefinitionPage = self.http.get_json(&url, Some(&credentials.access_token)).await?;
            definitions.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(definitions)
    }

    async fn get_role_definition(
        &self,
        credentials: &AzureCredentials,
        scope: &str,
        role_id: &str,
    ) -> Result<RoleDefinition, IdentityError> {
        let url = self.http.parse_url("azure.management_endpoint", &self.role_definitions_url(scope, Some(role_id)))?;
        self.http.get_json(&url, Some(&credentials.access_token)).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    /// Builds a definition with the given actions.
    fn definition(name: &str, id: &str, blocks: &[&[&str]]) -> RoleDefinition {
        RoleDefinition {
            id: id.to_string(),
            properties: RoleDefinitionProperties {
                role_name: name.to_string(),
                permissions: blocks
                    .iter()
                    .map(|actions| RolePermission {
                        actions: actions.iter().map(|action| (*action).to_string()).collect(),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn role_id_is_the_last_path_segment() {
        let id = "/subscriptions/s/providers/Microsoft.Authorization/roleDefinitions/1f2e-uuid";
        assert_eq!(role_id(id), "1f2e-uuid");
        let definitions = vec![definition("other", "/x/aaa", &[]), definition("prod-crossplane-provider", id, &[])];
        assert_eq!(find_role_id(&definitions, &role_name("prod")).unwrap(), "1f2e-uuid");
    }

    #[test]
    fn missing_role_is_reported() {
        let err = find_role_id(&[definition("other", "/x/aaa", &[])], "prod-crossplane-provider").unwrap_err();
        assert_eq!(err.to_string(), "role ID not found");
    }

    #[test]
    fn actions_flatten_across_blocks_and_reject_duplicates() {
        let ok = definition("r", "/x/1", &[&["a/read", "b/write"], &["c/delete"]]);
        assert_eq!(flatten_actions(&ok).unwrap().len(), 3);
        let dup = definition("r", "/x/1", &[&["a/read"], &["a/read"]]);
        assert_eq!(flatten_actions(&dup).unwrap_err().to_string(), "duplicate permission: a/read");
    }
}
