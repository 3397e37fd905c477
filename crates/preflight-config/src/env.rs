// crates/preflight-config/src/env.rs
// ============================================================================
// Module: Environment Document
// Description: Read contract for the multi-document environment YAML.
// Purpose: Extract cluster and cloud identifiers consumed by the checks.
// Dependencies: preflight-core, serde, serde_yaml
// ============================================================================

//! ## Overview
//! The environment file is a multi-document YAML stream. The first document
//! whose `kind` is `EnvConfig` is the one the checks read; every other
//! document is skipped. Only the fields below are part of the contract.
//!
//! Validation names the offending field with its YAML path, for example
//! `spec.cloudSpec.aws.accountID`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use preflight_core::CloudProvider;
use preflight_core::PlaceholderContext;
use serde::Deserialize;
use serde::Serialize;

use crate::settings::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Document kind carrying the environment configuration.
pub const ENV_CONFIG_KIND: &str = "EnvConfig";
/// Maximum accepted environment document size in bytes.
pub const MAX_ENV_DOCUMENT_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Environment configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvConfig {
    /// Document kind; always `EnvConfig` once selected.
    #[serde(default)]
    pub kind: String,
    /// API version of the document.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Environment specification.
    #[serde(default)]
    pub spec: EnvSpec,
}

/// `spec` block of the environment document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSpec {
    /// Target cluster name.
    #[serde(default)]
    pub cluster_name: String,
    /// Cloud placement.
    #[serde(default)]
    pub cloud_spec: CloudSpec,
}

/// `spec.cloudSpec` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CloudSpec {
    /// Provider identifier (`aws`, `azure` or `gcp`).
    #[serde(default)]
    pub provider: String,
    /// AWS account details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpec>,
    /// Azure subscription details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureSpec>,
    /// GCP project details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpSpec>,
}

/// `spec.cloudSpec.aws` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AwsSpec {
    /// Twelve-digit AWS account identifier.
    #[serde(default, rename = "accountID")]
    pub account_id: String,
    /// EKS OIDC issuer without scheme.
    #[serde(default, rename = "oidcUrl")]
    pub oidc_url: String,
}

/// `spec.cloudSpec.azure` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AzureSpec {
    /// Workload identity client id.
    #[serde(default, rename = "clientID")]
    pub client_id: String,
    /// Directory (tenant) id.
    #[serde(default, rename = "tenantID")]
    pub tenant_id: String,
    /// Subscription id.
    #[serde(default, rename = "subscriptionID")]
    pub subscription_id: String,
    /// Resource group holding the cluster.
    #[serde(default, rename = "resourceGroup")]
    pub resource_group: String,
    /// AKS OIDC issuer URL.
    #[serde(default, rename = "oidcUrl")]
    pub oidc_url: String,
}

/// `spec.cloudSpec.gcp` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GcpSpec {
    /// Project id.
    #[serde(default, rename = "projectID")]
    pub project_id: String,
    /// Project number.
    #[serde(default, rename = "projectNumber")]
    pub project_number: String,
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

impl EnvConfig {
    /// Parses the first `EnvConfig` document of a YAML stream and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML,
    /// [`ConfigError::Invalid`] when no `EnvConfig` document exists or a
    /// required field is missing.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_ENV_DOCUMENT_SIZE {
            return Err(ConfigError::Invalid("environment document exceeds size limit".to_string()));
        }
        for document in serde_yaml::Deserializer::from_str(content) {
            let value =
                serde_yaml::Value::deserialize(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
            if value.get("kind").and_then(serde_yaml::Value::as_str) != Some(ENV_CONFIG_KIND) {
                continue;
            }
            let config: Self =
                serde_yaml::from_value(value).map_err(|err| ConfigError::Parse(err.to_string()))?;
            config.validate()?;
            return Ok(config);
        }
        Err(ConfigError::Invalid("no environment configuration kind found in the YAML file".to_string()))
    }

    /// Serializes the document back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when serialization fails.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the parsed provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown provider identifier.
    pub fn provider(&self) -> Result<CloudProvider, ConfigError> {
        CloudProvider::from_str(&self.spec.cloud_spec.provider)
            .map_err(|err| ConfigError::Invalid(format!("spec.cloudSpec.provider: {err}")))
    }

    /// Returns the target cluster name.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.spec.cluster_name
    }

    /// Returns the AWS block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the block is absent.
    pub fn aws(&self) -> Result<&AwsSpec, ConfigError> {
        self.spec.cloud_spec.aws.as_ref().ok_or_else(|| missing("spec.cloudSpec.aws"))
    }

    /// Returns the Azure block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the block is absent.
    pub fn azure(&self) -> Result<&AzureSpec, ConfigError> {
        self.spec.cloud_spec.azure.as_ref().ok_or_else(|| missing("spec.cloudSpec.azure"))
    }

    /// Returns the GCP block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the block is absent.
    pub fn gcp(&self) -> Result<&GcpSpec, ConfigError> {
        self.spec.cloud_spec.gcp.as_ref().ok_or_else(|| missing("spec.cloudSpec.gcp"))
    }

    /// Returns the OIDC issuer for federated providers; `None` for GCP.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the provider block is absent.
    pub fn oidc_url(&self) -> Result<Option<&str>, ConfigError> {
        match self.provider()? {
            CloudProvider::Aws => Ok(Some(self.aws()?.oidc_url.as_str())),
            CloudProvider::Azure => Ok(Some(self.azure()?.oidc_url.as_str())),
            CloudProvider::Gcp => Ok(None),
        }
    }

    /// Builds the placeholder values used to materialize expected policies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the provider block is absent.
    pub fn placeholder_context(&self) -> Result<PlaceholderContext, ConfigError> {
        let (account, issuer) = match self.provider()? {
            CloudProvider::Aws => {
                let aws = self.aws()?;
                (aws.account_id.as_str(), aws.oidc_url.as_str())
            }
            CloudProvider::Azure => {
                let azure = self.azure()?;
                (azure.subscription_id.as_str(), azure.oidc_url.as_str())
            }
            CloudProvider::Gcp => (self.gcp()?.project_id.as_str(), ""),
        };
        Ok(PlaceholderContext::new(self.cluster_name(), account, issuer))
    }

    /// Validates required fields for the selected provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first missing field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("spec.clusterName", &self.spec.cluster_name)?;
        match self.provider()? {
            CloudProvider::Aws => {
                let aws = self.aws()?;
                require("spec.cloudSpec.aws.accountID", &aws.account_id)?;
                require("spec.cloudSpec.aws.oidcUrl", &aws.oidc_url)?;
            }
            CloudProvider::Azure => {
                let azure = self.azure()?;
                require("spec.cloudSpec.azure.clientID", &azure.client_id)?;
                require("spec.cloudSpec.azure.tenantID", &azure.tenant_id)?;
                require("spec.cloudSpec.azure.subscriptionID", &azure.subscription_id)?;
                require("spec.cloudSpec.azure.resourceGroup", &azure.resource_group)?;
                require("spec.cloudSpec.azure.oidcUrl", &azure.oidc_url)?;
            }
            CloudProvider::Gcp => {
                let gcp = self.gcp()?;
                require("spec.cloudSpec.gcp.projectID", &gcp.project_id)?;
                require("spec.cloudSpec.gcp.projectNumber", &gcp.project_number)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects a blank required field.
fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    Ok(())
}

/// Builds the missing-field error.
fn missing(field: &str) -> ConfigError {
    ConfigError::Invalid(format!("{field} must be set"))
}
