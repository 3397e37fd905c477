// crates/preflight-config/tests/env_validation.rs
// ============================================================================
// Module: Environment Document Tests
// Description: Selection, field validation and placeholder extraction.
// Purpose: Ensure the read contract fails closed and names offending fields.
// Dependencies: preflight-config, preflight-core
// ============================================================================
//! ## Overview
//! Parses AWS, Azure and GCP environment documents and checks every
//! required-field failure path.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use preflight_config::ConfigError;
use preflight_core::CloudProvider;

#[test]
fn selects_the_env_config_document_from_a_stream() {
    let config = common::env(common::AWS_ENV).unwrap();
    assert_eq!(config.provider().unwrap(), CloudProvider::Aws);
    assert_eq!(config.cluster_name(), "prod-eu");
    assert_eq!(config.aws().unwrap().account_id, "123456789012");
    assert_eq!(config.oidc_url().unwrap(), Some("oidc.eks.eu-west-1.amazonaws.com/id/ABCDEF0123"));

    let placeholders = config.placeholder_context().unwrap();
    assert_eq!(placeholders.cluster_name(), "prod-eu");
    assert_eq!(placeholders.account_id(), "123456789012");
    assert_eq!(placeholders.issuer_id(), "oidc.eks.eu-west-1.amazonaws.com/id/ABCDEF0123");
}

#[test]
fn azure_and_gcp_documents_parse() {
    let azure = common::env(common::AZURE_ENV).unwrap();
    assert_eq!(azure.provider().unwrap(), CloudProvider::Azure);
    assert_eq!(azure.azure().unwrap().resource_group, "rg-preflight");

    let gcp = common::env(common::GCP_ENV).unwrap();
    assert_eq!(gcp.provider().unwrap(), CloudProvider::Gcp);
    assert_eq!(gcp.oidc_url().unwrap(), None);
    assert_eq!(gcp.gcp().unwrap().project_number, "123456");
}

#[test]
fn stream_without_env_config_is_rejected() {
    let err = common::env("kind: ConfigMap\n---\nkind: Secret\n").unwrap_err();
    assert_eq!(
        err,
        ConfigError::Invalid("no environment configuration kind found in the YAML file".to_string())
    );
}

#[test]
fn unknown_provider_is_rejected() {
    let yaml = common::AWS_ENV.replace("provider: aws", "provider: oracle");
    let err = common::env(&yaml).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Invalid("spec.cloudSpec.provider: unsupported cloud type: oracle".to_string())
    );
}

#[test]
fn missing_fields_are_named() {
    let cases = [
        (common::AWS_ENV.replace("clusterName: prod-eu", "clusterName: ''"), "spec.clusterName"),
        (common::AWS_ENV.replace("accountID: '123456789012'", "accountID: ''"), "spec.cloudSpec.aws.accountID"),
        (common::AZURE_ENV.replace("resourceGroup: rg-preflight", "resourceGroup: ' '"), "spec.cloudSpec.azure.resourceGroup"),
        (common::GCP_ENV.replace("projectID: my-project", "projectID: ''"), "spec.cloudSpec.gcp.projectID"),
    ];
    for (yaml, field) in cases {
        let err = common::env(&yaml).unwrap_err();
        assert_eq!(err, ConfigError::Invalid(format!("{field} must be set")), "case {field}");
    }
}

#[test]
fn missing_provider_block_is_named() {
    let yaml = "kind: EnvConfig\nspec:\n  clusterName: c\n  cloudSpec:\n    provider: azure\n";
    let err = common::env(yaml).unwrap_err();
    assert_eq!(err, ConfigError::Invalid("spec.cloudSpec.azure must be set".to_string()));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = common::env("kind: EnvConfig\nspec: [unterminated\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn document_survives_a_yaml_round_trip() {
    let config = common::env(common::AZURE_ENV).unwrap();
    let encoded = config.to_yaml_string().unwrap();
    assert_eq!(common::env(&encoded).unwrap(), config);
}
