// crates/preflight-checks/src/engine.rs
// ============================================================================
// Module: Preflight Engine
// Description: Per-provider pipeline assembly over shared clients.
// Purpose: Turn settings and an environment document into a runnable pipeline.
// Dependencies: preflight-cluster, preflight-config, preflight-core, preflight-identity
// ============================================================================

//! ## Overview
//! [`ProviderClients`] bundles the cluster and cloud backends;
//! [`PreflightEngine`] resolves every environment value up front and then
//! assembles the fixed stage order of the selected provider:
//!
//! - AWS: issuer, discovery, issuance, verification, exchange, trust policy,
//!   boundary policy
//! - Azure: issuer, discovery, issuance, verification, exchange, role
//!   permissions
//! - GCP: role permissions
//!
//! Enabled capability checks follow the provider stages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use preflight_cluster::ClusterApi;
use preflight_cluster::EphemeralExecutor;
use preflight_cluster::ExecutorTiming;
use preflight_cluster::KubeCluster;
use preflight_config::AuditSettings;
use preflight_config::ConfigError;
use preflight_config::EnvConfig;
use preflight_config::ExecutorSettings;
use preflight_config::PreflightConfig;
use preflight_core::AuditSink;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::ExpectedPolicyRegistry;
use preflight_core::FileAuditSink;
use preflight_core::NoopAuditSink;
use preflight_core::Pipeline;
use preflight_core::PipelineBuilder;
use preflight_core::PolicyEquivalenceEngine;
use preflight_core::StageError;
use preflight_core::StageOutputs;
use preflight_core::StderrAuditSink;
use preflight_identity::AwsSdkClient;
use preflight_identity::AwsTrustPath;
use preflight_identity::AzureRestClient;
use preflight_identity::AzureTrustPath;
use preflight_identity::HttpFetcher;
use preflight_identity::JwksVerifier;
use preflight_identity::OidcDiscovery;
use preflight_identity::TokenMinter;
use preflight_identity::TokenPolicy;

use crate::aws::AwsBoundaryPolicyStage;
use crate::aws::AwsExchangeStage;
use crate::aws::AwsTarget;
use crate::aws::AwsTrustPolicyStage;
use crate::azure::AzureExchangeStage;
use crate::azure::AzureRolePermissionsStage;
use crate::azure::AzureTarget;
use crate::capability::NodeGroupStage;
use crate::capability::StorageClassStage;
use crate::gcp::GcpRolePermissionsStage;
use crate::gcp::role_checker_pod;
use crate::identity::IssuerTarget;
use crate::identity::JwksDiscoveryStage;
use crate::identity::OidcIssuerStage;
use crate::identity::TokenIssuanceStage;
use crate::identity::TokenVerificationStage;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts executor settings into executor timing.
#[must_use]
pub const fn executor_timing(settings: &ExecutorSettings) -> ExecutorTiming {
    ExecutorTiming {
        poll_interval: settings.poll_interval(),
        job_timeout: settings.job_timeout(),
        removal_timeout: settings.removal_timeout(),
    }
}

/// Selects the audit sink described by `settings`.
///
/// # Errors
///
/// Returns a configuration error naming `audit.path` when the file cannot
/// be opened.
pub fn audit_sink(settings: &AuditSettings) -> Result<Arc<dyn AuditSink>, CheckError> {
    if !settings.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &settings.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| CheckError::config("audit.path", err.to_string()))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Maps an environment or settings error to a configuration failure.
fn config_error(err: ConfigError) -> CheckError {
    match err {
        ConfigError::Invalid(reason) => CheckError::config("environment", reason),
        ConfigError::Io(reason) | ConfigError::Parse(reason) => CheckError::config("config", reason),
    }
}

// ============================================================================
// SECTION: Clients
// ============================================================================

/// Cluster and cloud backends shared by every stage.
#[derive(Clone)]
pub struct ProviderClients {
    /// Cluster backend.
    pub cluster: Arc<dyn ClusterApi>,
    /// HTTP client for discovery and key sets.
    pub http: HttpFetcher,
    /// AWS trust path, for AWS environments.
    pub aws: Option<AwsTrustPath>,
    /// Azure trust path, for Azure environments.
    pub azure: Option<AzureTrustPath>,
}

impl ProviderClients {
    /// Builds clients without cloud trust paths.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>, http: HttpFetcher) -> Self {
        Self {
            cluster,
            http,
            aws: None,
            azure: None,
        }
    }

    /// Sets the AWS trust path.
    #[must_use]
    pub fn with_aws(mut self, trust: AwsTrustPath) -> Self {
        self.aws = Some(trust);
        self
    }

    /// Sets the Azure trust path.
    #[must_use]
    pub fn with_azure(mut self, trust: AzureTrustPath) -> Self {
        self.azure = Some(trust);
        self
    }

    /// Connects to the ambient cluster and the cloud of `provider`.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error when no cluster configuration is
    /// available, or a configuration error for invalid HTTP settings.
    pub async fn connect(settings: &PreflightConfig, provider: CloudProvider) -> Result<Self, CheckError> {
        let cluster: Arc<dyn ClusterApi> = Arc::new(KubeCluster::try_default().await?);
        let http = HttpFetcher::from_settings(&settings.http)?;
        let clients = Self::new(cluster, http.clone());
        match provider {
            CloudProvider::Aws => {
                let sdk = Arc::new(AwsSdkClient::load(&settings.aws).await);
                let session =
                    settings.aws.session_name.clone().unwrap_or_else(|| settings.scaffold.app_name.clone());
                Ok(clients.with_aws(AwsTrustPath::new(Arc::<AwsSdkClient>::clone(&sdk), sdk, session)))
            }
            CloudProvider::Azure => {
                let rest = Arc::new(AzureRestClient::new(http, settings.azure.clone()));
                Ok(clients.with_azure(AzureTrustPath::new(Arc::<AzureRestClient>::clone(&rest), rest)))
            }
            CloudProvider::Gcp => Ok(clients),
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Provider values resolved from the environment document.
enum ProviderPlan {
    /// AWS federation and policy checks.
    Aws {
        /// Configured issuer.
        issuer: IssuerTarget,
        /// Role owner.
        target: AwsTarget,
        /// STS and IAM access.
        trust: AwsTrustPath,
    },
    /// Azure federation and role checks.
    Azure {
        /// Configured issuer.
        issuer: IssuerTarget,
        /// Role owner.
        target: AzureTarget,
        /// Token exchange and role reads.
        trust: AzureTrustPath,
    },
    /// GCP in-cluster role check.
    Gcp,
}

/// Assembles and runs the preflight pipeline of one environment.
pub struct PreflightEngine {
    /// Selected provider.
    provider: CloudProvider,
    /// Resolved provider values.
    plan: ProviderPlan,
    /// Engine settings.
    settings: PreflightConfig,
    /// Shared backends.
    clients: ProviderClients,
    /// Expected templates.
    registry: Arc<ExpectedPolicyRegistry>,
    /// Equivalence engine with environment placeholders bound.
    equivalence: PolicyEquivalenceEngine,
    /// Audit sink for stages and resources.
    audit: Arc<dyn AuditSink>,
}

impl PreflightEngine {
    /// Validates the inputs and resolves the provider plan.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid environment or missing
    /// cloud clients, and a protocol violation when the built-in registry
    /// cannot be loaded.
    pub fn new(env: &EnvConfig, settings: PreflightConfig, clients: ProviderClients) -> Result<Self, CheckError> {
        settings.validate().map_err(config_error)?;
        env.validate().map_err(config_error)?;
        let provider = env.provider().map_err(config_error)?;
        let equivalence = PolicyEquivalenceEngine::new(env.placeholder_context().map_err(config_error)?);
        let registry =
            Arc::new(ExpectedPolicyRegistry::builtin().map_err(|err| CheckError::Protocol(err.to_string()))?);
        let plan = match provider {
            CloudProvider::Aws => {
                let aws = env.aws().map_err(config_error)?;
                let trust = clients
                    .aws
                    .clone()
                    .ok_or_else(|| CheckError::config("aws", "AWS clients are not configured"))?;
                ProviderPlan::Aws {
                    issuer: IssuerTarget {
                        provider,
                        field: IssuerTarget::field_for(provider),
                        issuer: aws.oidc_url.clone(),
                    },
                    target: AwsTarget {
                        account_id: aws.account_id.clone(),
                        cluster: env.cluster_name().to_string(),
                    },
                    trust,
                }
            }
            CloudProvider::Azure => {
                let azure = env.azure().map_err(config_error)?;
                let trust = clients
                    .azure
                    .clone()
                    .ok_or_else(|| CheckError::config("azure", "Azure clients are not configured"))?;
                ProviderPlan::Azure {
                    issuer: IssuerTarget {
                        provider,
                        field: IssuerTarget::field_for(provider),
                        issuer: azure.oidc_url.clone(),
                    },
                    target: AzureTarget {
                        tenant_id: azure.tenant_id.clone(),
                        client_id: azure.client_id.clone(),
                        subscription_id: azure.subscription_id.clone(),
                        resource_group: azure.resource_group.clone(),
                        cluster: env.cluster_name().to_string(),
                    },
                    trust,
                }
            }
            CloudProvider::Gcp => ProviderPlan::Gcp,
        };
        Ok(Self {
            provider,
            plan,
            settings,
            clients,
            registry,
            equivalence,
            audit: Arc::new(NoopAuditSink),
        })
    }

    /// Routes stage and resource events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the selected provider.
    #[must_use]
    pub const fn provider(&self) -> CloudProvider {
        self.provider
    }

    /// Assembles the provider pipeline.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        let builder = Pipeline::builder(format!("{}-preflight", self.provider)).audit(Arc::clone(&self.audit));
        let builder = match &self.plan {
            ProviderPlan::Aws {
                issuer,
                target,
                trust,
            } => self
                .identity_stages(builder, issuer)
                .stage(AwsExchangeStage::new(trust.clone(), target.clone()))
                .stage(AwsTrustPolicyStage::new(
                    trust.clone(),
                    target.clone(),
                    self.equivalence.clone(),
                    Arc::clone(&self.registry),
                ))
                .stage(AwsBoundaryPolicyStage::new(
                    trust.clone(),
                    target.clone(),
                    self.equivalence.clone(),
                    Arc::clone(&self.registry),
                )),
            ProviderPlan::Azure {
                issuer,
                target,
                trust,
            } => self
                .identity_stages(builder, issuer)
                .stage(AzureExchangeStage::new(trust.clone(), target.clone()))
                .stage(AzureRolePermissionsStage::new(trust.clone(), target.clone(), Arc::clone(&self.registry))),
            ProviderPlan::Gcp => {
                let executor =
                    EphemeralExecutor::new(Arc::clone(&self.clients.cluster), executor_timing(&self.settings.executor))
                        .with_audit(Arc::clone(&self.audit));
                builder.stage(GcpRolePermissionsStage::new(
                    executor,
                    role_checker_pod(&self.settings.tokens.namespace),
                    Arc::clone(&self.registry),
                ))
            }
        };
        self.capability_stages(builder).build()
    }

    /// Runs the provider pipeline.
    ///
    /// # Errors
    ///
    /// Returns the [`StageError`] of the first failing stage.
    pub async fn run(&self, ctx: &CheckContext) -> Result<StageOutputs, StageError> {
        self.pipeline().run(ctx).await
    }

    /// Appends the federated identity stages.
    fn identity_stages(&self, builder: PipelineBuilder, issuer: &IssuerTarget) -> PipelineBuilder {
        let builder = builder
            .stage(OidcIssuerStage::new(issuer.clone()))
            .stage(JwksDiscoveryStage::new(OidcDiscovery::new(self.clients.http.clone()), issuer.clone()));
        match TokenPolicy::for_provider(self.provider, &self.settings.tokens) {
            Some(policy) => builder
                .stage(TokenIssuanceStage::new(TokenMinter::new(Arc::clone(&self.clients.cluster)), policy))
                .stage(TokenVerificationStage::new(JwksVerifier::new(self.clients.http.clone()))),
            None => builder,
        }
    }

    /// Appends the enabled capability checks.
    fn capability_stages(&self, builder: PipelineBuilder) -> PipelineBuilder {
        let capabilities = &self.settings.capabilities;
        let builder = if capabilities.storage_class {
            builder.stage(StorageClassStage::new(Arc::clone(&self.clients.cluster)))
        } else {
            builder
        };
        if capabilities.gpu_nodes {
            builder.stage(NodeGroupStage::new(
                Arc::clone(&self.clients.cluster),
                capabilities.gpu_label_selector.clone(),
            ))
        } else {
            builder
        }
    }
}
