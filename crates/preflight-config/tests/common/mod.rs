// crates/preflight-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared fixtures for settings and environment document tests.
// Purpose: Reduce duplication across integration tests for preflight-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use preflight_config::EnvConfig;
use preflight_config::PreflightConfig;
use preflight_config::settings::ConfigError;

/// Multi-document stream with an unrelated document ahead of the AWS `EnvConfig`.
pub const AWS_ENV: &str = r"
apiVersion: v1
kind: ConfigMap
metadata:
  name: unrelated
---
apiVersion: installer.example.com/v1
kind: EnvConfig
spec:
  clusterName: prod-eu
  cloudSpec:
    provider: aws
    aws:
      accountID: '123456789012'
      oidcUrl: oidc.eks.eu-west-1.amazonaws.com/id/ABCDEF0123
";

/// Azure `EnvConfig` document.
pub const AZURE_ENV: &str = r"
kind: EnvConfig
spec:
  clusterName: westeurope-1
  cloudSpec:
    provider: azure
    azure:
      clientID: 00000000-0000-0000-0000-000000000001
      tenantID: 00000000-0000-0000-0000-000000000002
      subscriptionID: 00000000-0000-0000-0000-000000000003
      resourceGroup: rg-preflight
      oidcUrl: https://westeurope.oic.prod-aks.azure.com/tenant-id/issuer-id/
";

/// GCP `EnvConfig` document.
pub const GCP_ENV: &str = r"
kind: EnvConfig
spec:
  clusterName: gke-1
  cloudSpec:
    provider: gcp
    gcp:
      projectID: my-project
      projectNumber: '123456'
";

/// Parses a YAML stream into an `EnvConfig`.
pub fn env(yaml: &str) -> Result<EnvConfig, ConfigError> {
    EnvConfig::from_yaml_str(yaml)
}

/// Parses a TOML string into validated settings.
pub fn settings(toml_str: &str) -> Result<PreflightConfig, ConfigError> {
    PreflightConfig::from_toml_str(toml_str)
}
