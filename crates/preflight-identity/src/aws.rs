// crates/preflight-identity/src/aws.rs
// ============================================================================
// Module: AWS Federation
// Description: Web-identity exchange and IAM policy retrieval.
// Purpose: Prove the EKS trust path and fetch the provider role's policies.
// Dependencies: async-trait, aws-config, aws-sdk-iam, aws-sdk-sts, percent-encoding
// ============================================================================

//! ## Overview
//! [`AwsFederation`] exchanges a federated token for temporary credentials
//! through `AssumeRoleWithWebIdentity`. [`IamPolicyReader`] reads, with those
//! credentials, the provider role's trust policy and the default version of
//! its permission boundary. [`AwsTrustPath`] composes both and decodes the
//! URL-encoded policy documents IAM returns.
//!
//! [`AwsSdkClient`] is the production implementation of both traits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::SdkConfig;
use aws_sdk_iam::config::Credentials;
use percent_encoding::percent_decode_str;
use preflight_config::AwsSettings;
use preflight_core::AwsCredentials;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::FederatedToken;
use preflight_core::PermissionDocument;

use crate::error::IdentityError;

// ============================================================================
// SECTION: Naming
// ============================================================================

/// Fixed part of the provider role name.
const ROLE_NAME_PREFIX: &str = "crossplane-provider";

/// Returns the provider role name for a cluster.
#[must_use]
pub fn role_name(cluster: &str) -> String {
    format!("{ROLE_NAME_PREFIX}-{cluster}")
}

/// Returns the provider role ARN.
#[must_use]
pub fn role_arn(account_id: &str, cluster: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/web-identity/{cluster}/{}", role_name(cluster))
}

/// Returns the permission boundary policy ARN.
#[must_use]
pub fn boundary_policy_arn(account_id: &str, cluster: &str) -> String {
    format!("arn:aws:iam::{account_id}:policy/web-identity/{cluster}/{}-boundary", role_name(cluster))
}

/// Decodes a URL-encoded policy document as IAM returns it.
///
/// # Errors
///
/// Returns [`IdentityError::Inconsistent`] when the decoded bytes are not
/// UTF-8.
pub fn decode_policy_document(encoded: &str) -> Result<String, IdentityError> {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|err| IdentityError::Inconsistent(format!("policy document is not valid UTF-8: {err}")))
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Token exchange with AWS STS.
#[async_trait]
pub trait AwsFederation: Send + Sync {
    /// Assumes `role_arn` with a web-identity token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Cloud`] when STS rejects the exchange.
    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        web_identity_token: &str,
    ) -> Result<AwsCredentials, IdentityError>;
}

/// Version entry of a managed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVersionInfo {
    /// Version identifier (`v1`, `v2`, ...).
    pub version_id: String,
    /// True for the default version.
    pub is_default: bool,
}

/// IAM reads performed with exchanged credentials.
#[async_trait]
pub trait IamPolicyReader: Send + Sync {
    /// Returns the URL-encoded trust policy of a role.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Cloud`] on API failure.
    async fn role_trust_policy(&self, credentials: &AwsCredentials, role_name: &str) -> Result<String, IdentityError>;

    /// Lists the versions of a managed policy.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Cloud`] on API failure.
    async fn policy_versions(
        &self,
        credentials: &AwsCredentials,
        policy_arn: &str,
    ) -> Result<Vec<PolicyVersionInfo>, IdentityError>;

    /// Returns the URL-encoded document of one policy version.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Cloud`] on API failure.
    async fn policy_version_document(
        &self,
        credentials: &AwsCredentials,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<String, IdentityError>;
}

// ============================================================================
// SECTION: Trust Path
// ============================================================================

/// Exchanges tokens and retrieves the provider role's policies.
#[derive(Clone)]
pub struct AwsTrustPath {
    /// STS exchange.
    federation: Arc<dyn AwsFederation>,
    /// IAM reads.
    iam: Arc<dyn IamPolicyReader>,
    /// Role session name.
    session_name: String,
}

impl AwsTrustPath {
    /// Builds a trust path.
    #[must_use]
    pub fn new(
        federation: Arc<dyn AwsFederation>,
        iam: Arc<dyn IamPolicyReader>,
        session_name: impl Into<String>,
    ) -> Self {
        Self {
            federation,
            iam,
            session_name: session_name.into(),
        }
    }

    /// Exchanges one token for credentials on the provider role.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error when STS rejects the token.
    pub async fn exchange(
        &self,
        ctx: &CheckContext,
        account_id: &str,
        cluster: &str,
        token: &FederatedToken,
    ) -> Result<AwsCredentials, CheckError> {
        let arn = role_arn(account_id, cluster);
        let exchange = self.federation.assume_role_with_web_identity(&arn, &self.session_name, token.secret());
        Ok(ctx.run("assuming role with web identity", exchange).await??)
    }

    /// Reads and parses the provider role's trust policy.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error on API failure and a protocol
    /// violation for an undecodable document.
    pub async fn trust_policy(
        &self,
        ctx: &CheckContext,
        credentials: &AwsCredentials,
        cluster: &str,
    ) -> Result<PermissionDocument, CheckError> {
        let name = role_name(cluster);
        let encoded = ctx.run("reading role trust policy", self.iam.role_trust_policy(credentials, &name)).await??;
        Ok(PermissionDocument::from_json(&decode_policy_document(&encoded)?)?)
    }

    /// Reads and parses the default version of the permission boundary.
    ///
    /// # Errors
    ///
    /// Returns a protocol violation "no default policy version" when no
    /// version is marked default.
    pub async fn boundary_policy(
        &self,
        ctx: &CheckContext,
        credentials: &AwsCredentials,
        account_id: &str,
        cluster: &str,
    ) -> Result<PermissionDocument, CheckError> {
        let arn = boundary_policy_arn(account_id, cluster);
        let versions = ctx.run("listing policy versions", self.iam.policy_versions(credentials, &arn)).await??;
        let default = versions
            .into_iter()
            .find(|version| version.is_default)
            .ok_or_else(|| IdentityError::Inconsistent("no default policy version".to_string()))?;
        let encoded = ctx
            .run("reading policy version", self.iam.policy_version_document(credentials, &arn, &default.version_id))
            .await??;
        Ok(PermissionDocument::from_json(&decode_policy_document(&encoded)?)?)
    }
}

// ============================================================================
// SECTION: SDK Client
// ============================================================================

/// STS and IAM through the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsSdkClient {
    /// Shared SDK configuration.
    config: SdkConfig,
    /// Endpoint overrides.
    settings: AwsSettings,
}

impl AwsSdkClient {
    /// Loads the SDK configuration for the configured region.
    pub async fn load(settings: &AwsSettings) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;
        Self {
            config,
            settings: settings.clone(),
        }
    }

    /// Builds an STS client.
    fn sts(&self) -> aws_sdk_sts::Client {
        let mut builder = aws_sdk_sts::config::Builder::from(&self.config);
        if let Some(endpoint) = &self.settings.sts_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }

    /// Builds an IAM client signing with exchanged credentials.
    fn iam(&self, credentials: &AwsCredentials) -> aws_sdk_iam::Client {
        let static_credentials = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            "preflight-web-identity",
        );
        let mut builder = aws_sdk_iam::config::Builder::from(&self.config).credentials_provider(static_credentials);
        if let Some(endpoint) = &self.settings.iam_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_iam::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl AwsFederation for AwsSdkClient {
    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        web_identity_token: &str,
    ) -> Result<AwsCredentials, IdentityError> {
        let output = self
            .sts()
            .assume_role_with_web_identity()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .web_identity_token(web_identity_token)
            .send()
            .await
            .map_err(|err| IdentityError::cloud("sts", aws_sdk_sts::error::DisplayErrorContext(&err)))?;
        let credentials = output
            .credentials()
            .ok_or_else(|| IdentityError::Inconsistent("STS returned no credentials".to_string()))?;
        Ok(AwsCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expires_at_unix: Some(credentials.expiration().secs()),
        })
    }
}

#[async_trait]
impl IamPolicyReader for AwsSdkClient {
    async fn role_trust_policy(&self, credentials: &AwsCredentials, role_name: &str) -> Result<String, IdentityError> {
        let output = self
            .iam(credentials)
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| IdentityError::cloud("iam", aws_sdk_iam::error::DisplayErrorContext(&err)))?;
        output
            .role()
            .and_then(|role| role.assume_role_policy_document())
            .map(str::to_string)
            .ok_or_else(|| IdentityError::Inconsistent(format!("role {role_name} has no trust policy")))
    }

    async fn policy_versions(
        &self,
        credentials: &AwsCredentials,
        policy_arn: &str,
    ) -> Result<Vec<PolicyVersionInfo>, IdentityError> {
        let output = self
            .iam(credentials)
            .list_policy_versions()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|err| IdentityError::cloud("iam", aws_sdk_iam::error::DisplayErrorContext(&err)))?;
        Ok(output
            .versions()
            .iter()
            .filter_map(|version| {
                version.version_id().map(|id| PolicyVersionInfo {
                    version_id: id.to_string(),
                    is_default: version.is_default_version(),
                })
            })
            .collect())
    }

    async fn policy_version_document(
        &self,
        credentials: &AwsCredentials,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<String, IdentityError> {
        let output = self
            .iam(credentials)
            .get_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|err| IdentityError::cloud("iam", aws_sdk_iam::error::DisplayErrorContext(&err)))?;
        output
            .policy_version()
            .and_then(|version| version.document())
            .map(str::to_string)
            .ok_or_else(|| IdentityError::Inconsistent(format!("policy {policy_arn} {version_id} has no document")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
