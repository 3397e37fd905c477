// crates/preflight-checks/src/scaffold.rs
// ============================================================================
// Module: Scaffolded Run
// Description: Provision, run the in-cluster checker, always tear down.
// Purpose: Execute the preflight pipeline from inside the target cluster.
// Dependencies: base64, preflight-cluster, preflight-config, preflight-core
// ============================================================================

//! ## Overview
//! The outer process provisions RBAC scaffolding, launches a checker Pod
//! that receives the environment document base64-encoded in
//! [`ENV_CONFIG_VAR`], and consumes the Pod's single result line through
//! the [`EphemeralExecutor`]. Teardown always runs, except after
//! cancellation; the primary failure wins and teardown failures are
//! attached to it.
//!
//! The in-cluster side reads the document back with
//! [`env_config_from_process`] and reports with [`result_line`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use preflight_cluster::ClusterApi;
use preflight_cluster::EphemeralExecutor;
use preflight_cluster::PodTemplate;
use preflight_cluster::ResourceLifecycleManager;
use preflight_cluster::ScaffoldingPlan;
use preflight_config::EnvConfig;
use preflight_config::PreflightConfig;
use preflight_core::AuditSink;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::StageError;
use preflight_core::StageId;
use preflight_core::StageOutputs;

use crate::engine::executor_timing;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable carrying the encoded environment document.
pub const ENV_CONFIG_VAR: &str = "ENVCONFIG";
/// Result line printed by a passing in-cluster run.
pub const PASSED_LINE: &str = "preflight checks passed";

// ============================================================================
// SECTION: Environment Transport
// ============================================================================

/// Encodes the environment document for the checker Pod.
///
/// # Errors
///
/// Returns a configuration error when the document cannot be serialized.
pub fn encode_env_config(env: &EnvConfig) -> Result<String, CheckError> {
    let yaml = env.to_yaml_string().map_err(|err| CheckError::config(ENV_CONFIG_VAR, err.to_string()))?;
    Ok(STANDARD.encode(yaml))
}

/// Decodes and validates an encoded environment document.
///
/// # Errors
///
/// Returns a configuration error naming [`ENV_CONFIG_VAR`] for invalid
/// base64, non-UTF-8 content or an invalid document.
pub fn decode_env_config(encoded: &str) -> Result<EnvConfig, CheckError> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|err| CheckError::config(ENV_CONFIG_VAR, err.to_string()))?;
    let yaml = String::from_utf8(bytes).map_err(|err| CheckError::config(ENV_CONFIG_VAR, err.to_string()))?;
    EnvConfig::from_yaml_str(&yaml).map_err(|err| CheckError::config(ENV_CONFIG_VAR, err.to_string()))
}

/// Reads the environment document passed to the checker Pod.
///
/// # Errors
///
/// Returns a configuration error when the variable is unset or invalid.
pub fn env_config_from_process() -> Result<EnvConfig, CheckError> {
    let encoded = std::env::var(ENV_CONFIG_VAR).map_err(|err| CheckError::config(ENV_CONFIG_VAR, err.to_string()))?;
    decode_env_config(&encoded)
}

/// Renders a pipeline outcome as the checker's single output line.
#[must_use]
pub fn result_line(outcome: &Result<StageOutputs, StageError>) -> String {
    match outcome {
        Ok(_) => PASSED_LINE.to_string(),
        Err(err) => err.to_string().split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

// ============================================================================
// SECTION: Pod
// ============================================================================

/// Builds the checker Pod for `plan`.
///
/// # Errors
///
/// Returns a configuration error naming `scaffold.image` when no image is
/// configured.
pub fn checker_pod(
    plan: &ScaffoldingPlan,
    settings: &PreflightConfig,
    env: &EnvConfig,
) -> Result<PodTemplate, CheckError> {
    let image = settings
        .scaffold
        .image
        .clone()
        .ok_or_else(|| CheckError::config("scaffold.image", "required for scaffolded runs"))?;
    let mut variables = BTreeMap::new();
    variables.insert(ENV_CONFIG_VAR.to_string(), encode_env_config(env)?);
    Ok(PodTemplate {
        namespace: plan.control_namespace().to_string(),
        name: plan.app_name().to_string(),
        service_account: plan.service_account(),
        image,
        command: settings.scaffold.command.clone(),
        env: variables,
    })
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Scaffolded in-cluster execution of the preflight pipeline.
pub struct ScaffoldedRun {
    /// Scaffolding owner.
    lifecycle: ResourceLifecycleManager,
    /// Checker Pod executor.
    executor: EphemeralExecutor,
    /// Objects to provision, checker Pod included.
    plan: ScaffoldingPlan,
}

impl ScaffoldedRun {
    /// Builds the run for one environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the checker Pod cannot be built.
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        settings: &PreflightConfig,
        env: &EnvConfig,
    ) -> Result<Self, CheckError> {
        let plan = ScaffoldingPlan::for_application(&settings.scaffold.app_name, &settings.scaffold.control_namespace);
        let pod = checker_pod(&plan, settings, env)?;
        Ok(Self {
            lifecycle: ResourceLifecycleManager::new(Arc::clone(&cluster))
                .with_delete_timeout(settings.executor.removal_timeout()),
            executor: EphemeralExecutor::new(cluster, executor_timing(&settings.executor)),
            plan: plan.with_pod(pod),
        })
    }

    /// Routes resource and Pod events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.lifecycle = self.lifecycle.with_audit(Arc::clone(&audit));
        self.executor = self.executor.with_audit(audit);
        self
    }

    /// Returns the scaffolding plan.
    #[must_use]
    pub const fn plan(&self) -> &ScaffoldingPlan {
        &self.plan
    }

    /// Provisions, runs the checker and tears everything down.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] for [`StageId::Scaffolding`] when
    /// provisioning fails and [`StageId::EphemeralCheck`] when the checker
    /// fails; teardown failures are attached to the primary error.
    pub async fn run(&self, ctx: &CheckContext) -> Result<String, StageError> {
        let pod = self.plan.pod().ok_or_else(|| {
            StageError::new(StageId::Scaffolding, CheckError::Contract("plan has no checker pod".to_string()))
        })?;
        if let Err(err) = self.lifecycle.provision(ctx, &self.plan).await {
            if matches!(err, CheckError::Cancelled) {
                return Err(StageError::new(StageId::Scaffolding, err));
            }
            let cleanup = self.lifecycle.teardown(&self.plan).await.err();
            return Err(StageError::new(StageId::Scaffolding, err.with_cleanup(cleanup)));
        }
        let outcome = self.executor.run(ctx, pod).await;
        if matches!(outcome, Err(CheckError::Cancelled)) {
            return outcome.map_err(|err| StageError::new(StageId::EphemeralCheck, err));
        }
        let cleanup = self.lifecycle.teardown(&self.plan).await;
        CheckError::settle(outcome, cleanup).map_err(|err| StageError::new(StageId::EphemeralCheck, err))
    }

    /// Tears down scaffolding left by an earlier run.
    ///
    /// Absent objects count as removed, so repeated calls succeed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Cleanup`] listing objects that could not be
    /// deleted.
    pub async fn cleanup_only(&self) -> Result<(), CheckError> {
        self.lifecycle.teardown(&self.plan).await.map_err(CheckError::Cleanup)
    }
}
