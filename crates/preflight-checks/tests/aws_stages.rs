// crates/preflight-checks/tests/aws_stages.rs
// ============================================================================
// Module: AWS Stage Tests
// Description: Token exchange, trust policy and boundary policy stages.
// Purpose: Ensure AWS stages compare live policies with the baselines.
// Dependencies: preflight-checks, preflight-core, tokio
// ============================================================================
//! ## Overview
//! Runs each AWS stage against in-memory STS and IAM fakes.

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

use std::sync::Arc;

use preflight_checks::AwsBoundaryPolicyStage;
use preflight_checks::AwsExchangeStage;
use preflight_checks::AwsTarget;
use preflight_checks::AwsTrustPolicyStage;
use preflight_core::AzureCredentials;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudCredentials;
use preflight_core::ErrorClass;
use preflight_core::FederatedToken;
use preflight_core::Mismatch;
use preflight_core::PolicyEquivalenceEngine;
use preflight_core::PolicyKind;
use preflight_core::Stage;
use preflight_core::StageInputs;
use preflight_core::StageValue;
use serde_json::json;

/// Returns the role owner of the AWS fixture.
fn target() -> AwsTarget {
    AwsTarget {
        account_id: "123456789012".to_string(),
        cluster: "prod-eu".to_string(),
    }
}

/// Returns the equivalence engine bound to the AWS fixture.
fn engine() -> PolicyEquivalenceEngine {
    PolicyEquivalenceEngine::new(common::env(common::AWS_ENV).placeholder_context().unwrap())
}

/// Wraps raw token strings.
fn tokens(secrets: &[&str]) -> StageInputs {
    let tokens = secrets
        .iter()
        .enumerate()
        .map(|(index, secret)| {
            FederatedToken::new("crossplane", format!("aws-{index}"), "amazonaws.com", 3600, *secret)
        })
        .collect();
    StageInputs::new(vec![StageValue::Tokens(tokens)])
}

/// Wraps credentials for exchanged `token`.
fn credentials(token: &str) -> StageInputs {
    StageInputs::new(vec![StageValue::Credentials(CloudCredentials::Aws(common::aws_credentials(token)))])
}

#[tokio::test]
async fn exchange_tries_every_token_and_forwards_the_first() {
    let sts = Arc::new(common::FakeSts::default());
    let stage = AwsExchangeStage::new(common::aws_trust(Arc::clone(&sts), common::FakeIam::matching()), target());

    let outputs = stage.handle(&CheckContext::new(), tokens(&["jwt-a", "jwt-b", "jwt-c"])).await.unwrap();

    assert_eq!(*sts.tokens.lock().unwrap(), ["jwt-a", "jwt-b", "jwt-c"]);
    assert_eq!(
        outputs.values(),
        [StageValue::Credentials(CloudCredentials::Aws(common::aws_credentials("jwt-a")))]
    );
}

#[tokio::test]
async fn one_rejected_token_fails_the_exchange() {
    let sts = Arc::new(common::FakeSts::default());
    let stage = AwsExchangeStage::new(common::aws_trust(Arc::clone(&sts), common::FakeIam::matching()), target());

    let err = stage.handle(&CheckContext::new(), tokens(&["jwt-a", "rejected", "jwt-c"])).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Transient);
    assert_eq!(sts.tokens.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn exchange_without_tokens_is_a_contract_error() {
    let stage = AwsExchangeStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), common::FakeIam::matching()),
        target(),
    );

    let err = stage.handle(&CheckContext::new(), StageInputs::default()).await.unwrap_err();

    assert!(matches!(err, CheckError::Contract(_)));
}

#[tokio::test]
async fn matching_trust_policy_passes_and_forwards_credentials() {
    let stage = AwsTrustPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), common::FakeIam::matching()),
        target(),
        engine(),
        common::registry(),
    );

    let outputs = stage.handle(&CheckContext::new(), credentials("jwt-a")).await.unwrap();

    assert_eq!(
        outputs.values(),
        [StageValue::Credentials(CloudCredentials::Aws(common::aws_credentials("jwt-a")))]
    );
}

#[tokio::test]
async fn extra_trust_condition_is_tolerated() {
    let mut trust = common::materialized(PolicyKind::AssumeRoleTrust);
    trust["Statement"][0]["Condition"]["StringEquals"] = json!({ "aud": "sts.amazonaws.com" });
    let iam = common::FakeIam {
        trust: trust.to_string(),
        ..common::FakeIam::matching()
    };
    let stage = AwsTrustPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), iam),
        target(),
        engine(),
        common::registry(),
    );

    stage.handle(&CheckContext::new(), credentials("jwt-a")).await.unwrap();
}

#[tokio::test]
async fn trust_policy_for_another_issuer_is_a_mismatch() {
    let mut trust = common::materialized(PolicyKind::AssumeRoleTrust);
    trust["Statement"][0]["Principal"]["Federated"] =
        json!("arn:aws:iam::123456789012:oidc-provider/oidc.eks.eu-west-1.amazonaws.com/id/OTHER");
    let iam = common::FakeIam {
        trust: trust.to_string(),
        ..common::FakeIam::matching()
    };
    let stage = AwsTrustPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), iam),
        target(),
        engine(),
        common::registry(),
    );

    let err = stage.handle(&CheckContext::new(), credentials("jwt-a")).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::PermissionMismatch);
    assert!(matches!(err.mismatch(), Some(Mismatch::Changelog(records)) if !records.is_empty()));
}

#[tokio::test]
async fn trust_policy_stage_rejects_azure_credentials() {
    let stage = AwsTrustPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), common::FakeIam::matching()),
        target(),
        engine(),
        common::registry(),
    );
    let inputs = StageInputs::new(vec![StageValue::Credentials(CloudCredentials::Azure(AzureCredentials {
        access_token: "arm".to_string(),
        expires_in_secs: None,
    }))]);

    let err = stage.handle(&CheckContext::new(), inputs).await.unwrap_err();

    assert!(matches!(err, CheckError::Contract(ref message) if message.contains("AWS")));
}

#[tokio::test]
async fn matching_boundary_policy_passes() {
    let stage = AwsBoundaryPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), common::FakeIam::matching()),
        target(),
        engine(),
        common::registry(),
    );

    stage.handle(&CheckContext::new(), credentials("jwt-a")).await.unwrap();
}

#[tokio::test]
async fn boundary_with_fewer_exclusions_is_a_mismatch() {
    let mut boundary = common::materialized(PolicyKind::PermissionBoundary);
    let not_action = boundary["Statement"][0]["NotAction"].as_array_mut().unwrap();
    not_action.pop();
    let iam = common::FakeIam {
        boundary: boundary.to_string(),
        ..common::FakeIam::matching()
    };
    let stage = AwsBoundaryPolicyStage::new(
        common::aws_trust(Arc::new(common::FakeSts::default()), iam),
        target(),
        engine(),
        common::registry(),
    );

    let err = stage.handle(&CheckContext::new(), credentials("jwt-a")).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::PermissionMismatch);
    assert!(err.to_string().contains("NotAction"), "{err}");
}
