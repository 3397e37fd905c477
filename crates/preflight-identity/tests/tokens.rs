// crates/preflight-identity/tests/tokens.rs
// ============================================================================
// Module: Token Minting Tests
// Description: ServiceAccount selection and token issuance per provider.
// Purpose: Cover prefix selection, empty tokens and missing accounts.
// Dependencies: preflight-cluster, preflight-identity, tokio
// ============================================================================
//! ## Overview
//! Mints tokens against an in-memory cluster.

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

use std::sync::Arc;

use preflight_cluster::ClusterObject;
use preflight_cluster::InMemoryCluster;
use preflight_config::TokenSettings;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_identity::AccountSelector;
use preflight_identity::TokenMinter;
use preflight_identity::TokenPolicy;

/// Adds a ServiceAccount in the provider namespace.
fn service_account(cluster: &InMemoryCluster, name: &str) {
    cluster.insert(ClusterObject::ServiceAccount {
        namespace: "crossplane".to_string(),
        name: name.to_string(),
    });
}

/// Builds a minter over `cluster`.
fn minter(cluster: &InMemoryCluster) -> TokenMinter {
    TokenMinter::new(Arc::new(cluster.clone()))
}

#[tokio::test]
async fn aws_mints_for_every_prefixed_service_account() {
    let cluster = InMemoryCluster::new();
    for name in ["aws-s3", "aws-rds", "azure-provider-sa", "default"] {
        service_account(&cluster, name);
    }
    let policy = TokenPolicy::for_provider(CloudProvider::Aws, &TokenSettings::default()).unwrap();

    let tokens = minter(&cluster).mint(&CheckContext::new(), &policy).await.unwrap();

    let mut accounts: Vec<_> = tokens.iter().map(|token| token.service_account.as_str()).collect();
    accounts.sort_unstable();
    assert_eq!(accounts, ["aws-rds", "aws-s3"]);
    assert!(tokens.iter().all(|token| token.audience == "amazonaws.com"));
    assert!(tokens.iter().all(|token| token.namespace == "crossplane"));
}

#[tokio::test]
async fn empty_tokens_are_skipped() {
    let cluster = InMemoryCluster::new();
    service_account(&cluster, "aws-s3");
    service_account(&cluster, "aws-rds");
    cluster.set_token("crossplane", "aws-rds", "");
    cluster.set_token("crossplane", "aws-s3", "signed-jwt");
    let policy = TokenPolicy::for_provider(CloudProvider::Aws, &TokenSettings::default()).unwrap();

    let tokens = minter(&cluster).mint(&CheckContext::new(), &policy).await.unwrap();

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].secret(), "signed-jwt");
}

#[tokio::test]
async fn no_matching_accounts_yield_no_tokens() {
    let cluster = InMemoryCluster::new();
    service_account(&cluster, "default");
    let policy = TokenPolicy::for_provider(CloudProvider::Aws, &TokenSettings::default()).unwrap();

    let err = minter(&cluster).mint(&CheckContext::new(), &policy).await.unwrap_err();

    assert!(matches!(err, CheckError::Protocol(ref message) if message == "no JWTs retrieved"));
}

#[tokio::test]
async fn azure_uses_the_named_account_and_exchange_audience() {
    let cluster = InMemoryCluster::new();
    service_account(&cluster, "azure-provider-sa");
    let policy = TokenPolicy::for_provider(CloudProvider::Azure, &TokenSettings::default()).unwrap();
    assert_eq!(policy.accounts, AccountSelector::Named("azure-provider-sa".to_string()));

    let tokens = minter(&cluster).mint(&CheckContext::new(), &policy).await.unwrap();

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].audience, "api://AzureADTokenExchange");
}

#[tokio::test]
async fn missing_named_account_is_an_infrastructure_failure() {
    let cluster = InMemoryCluster::new();
    let policy = TokenPolicy::for_provider(CloudProvider::Azure, &TokenSettings::default()).unwrap();

    let err = minter(&cluster).mint(&CheckContext::new(), &policy).await.unwrap_err();

    assert!(matches!(err, CheckError::Infrastructure(ref message) if message.contains("azure-provider-sa")));
}

#[test]
fn gcp_does_not_federate() {
    assert!(TokenPolicy::for_provider(CloudProvider::Gcp, &TokenSettings::default()).is_none());
}

#[test]
fn lifetime_and_namespace_come_from_settings() {
    let settings = TokenSettings {
        namespace: "upbound-system".to_string(),
        expiration_seconds: 900,
    };

    let policy = TokenPolicy::for_provider(CloudProvider::Aws, &settings).unwrap();

    assert_eq!(policy.namespace, "upbound-system");
    assert_eq!(policy.expiration_seconds, 900);
}
