// crates/preflight-checks/tests/identity_stages.rs
// ============================================================================
// Module: Identity Stage Tests
// Description: Issuer, issuance and verification stages in sequence.
// Purpose: Ensure identity values flow between stages as declared.
// Dependencies: axum, preflight-checks, preflight-cluster, tokio
// ============================================================================
//! ## Overview
//! Mints tokens from an in-memory cluster and verifies them against a
//! loopback JWKS endpoint.

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

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::get;
use preflight_checks::IssuerTarget;
use preflight_checks::OidcIssuerStage;
use preflight_checks::TokenIssuanceStage;
use preflight_checks::TokenVerificationStage;
use preflight_cluster::InMemoryCluster;
use preflight_config::TokenSettings;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::ErrorClass;
use preflight_core::Stage;
use preflight_core::StageInputs;
use preflight_core::StageValue;
use preflight_identity::JwksVerifier;
use preflight_identity::TokenMinter;
use preflight_identity::TokenPolicy;
use tokio::net::TcpListener;

/// Serves the published key set on a loopback port.
async fn serve_jwks() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/keys", get(|| async { Json(common::jwks_json()) }));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Builds the AWS issuance stage over `cluster`.
fn issuance(cluster: &InMemoryCluster) -> TokenIssuanceStage {
    let policy = TokenPolicy::for_provider(CloudProvider::Aws, &TokenSettings::default()).unwrap();
    TokenIssuanceStage::new(TokenMinter::new(Arc::new(cluster.clone())), policy)
}

/// Seeds two AWS provider accounts with tokens for `audience`.
fn seeded_cluster(audience: &str) -> InMemoryCluster {
    let cluster = InMemoryCluster::new();
    for name in ["aws-s3", "aws-rds"] {
        common::service_account(&cluster, name);
        cluster.set_token("crossplane", name, &common::signed(audience));
    }
    cluster
}

#[tokio::test]
async fn malformed_issuer_names_the_field() {
    let target = IssuerTarget {
        provider: CloudProvider::Aws,
        field: IssuerTarget::field_for(CloudProvider::Aws),
        issuer: "https://example.com/issuer".to_string(),
    };

    let err = OidcIssuerStage::new(target).handle(&CheckContext::new(), StageInputs::default()).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(err.to_string().contains("spec.cloudSpec.aws.oidcUrl"), "{err}");
}

#[tokio::test]
async fn issuance_forwards_the_key_set_location_with_the_tokens() {
    let cluster = seeded_cluster("amazonaws.com");
    let inputs = StageInputs::new(vec![StageValue::JwksUri("https://issuer.test/keys".to_string())]);

    let outputs = issuance(&cluster).handle(&CheckContext::new(), inputs).await.unwrap();

    match outputs.values() {
        [StageValue::JwksUri(uri), StageValue::Tokens(tokens)] => {
            assert_eq!(uri, "https://issuer.test/keys");
            assert_eq!(tokens.len(), 2);
        }
        other => panic!("unexpected outputs {other:?}"),
    }
}

#[tokio::test]
async fn issuance_without_a_key_set_location_is_a_contract_error() {
    let cluster = seeded_cluster("amazonaws.com");

    let err = issuance(&cluster).handle(&CheckContext::new(), StageInputs::default()).await.unwrap_err();

    assert!(matches!(err, CheckError::Contract(ref message) if message.contains("jwks_uri")));
}

#[tokio::test]
async fn issued_tokens_verify_against_the_served_key_set() {
    let addr = serve_jwks().await;
    let cluster = seeded_cluster("amazonaws.com");
    let first = StageInputs::new(vec![StageValue::JwksUri(format!("http://{addr}/keys"))]);

    let outputs = issuance(&cluster).handle(&CheckContext::new(), first).await.unwrap();
    let verified = TokenVerificationStage::new(JwksVerifier::new(common::fetcher()))
        .handle(&CheckContext::new(), StageInputs::from(outputs))
        .await
        .unwrap();

    assert!(matches!(verified.values(), [StageValue::Tokens(tokens)] if tokens.len() == 2));
}

#[tokio::test]
async fn tokens_for_the_wrong_audience_fail_verification() {
    let addr = serve_jwks().await;
    let cluster = seeded_cluster("sts.amazonaws.com");
    let first = StageInputs::new(vec![StageValue::JwksUri(format!("http://{addr}/keys"))]);

    let outputs = issuance(&cluster).handle(&CheckContext::new(), first).await.unwrap();
    let err = TokenVerificationStage::new(JwksVerifier::new(common::fetcher()))
        .handle(&CheckContext::new(), StageInputs::from(outputs))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    assert!(err.to_string().contains("InvalidAudience"), "{err}");
}
