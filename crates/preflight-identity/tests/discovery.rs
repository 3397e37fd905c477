// crates/preflight-identity/tests/discovery.rs
// ============================================================================
// Module: OIDC Discovery Tests
// Description: JWKS URI discovery against loopback issuers.
// Purpose: Keep network, status and missing-field failures distinct.
// Dependencies: axum, preflight-identity, tokio
// ============================================================================
//! ## Overview
//! Serves OIDC metadata from a loopback axum server and checks every
//! discovery outcome.

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

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::ErrorClass;
use preflight_identity::OidcDiscovery;
use serde_json::json;

/// Issuer field name used in errors.
const FIELD: &str = "spec.cloudSpec.aws.oidcUrl";

#[tokio::test]
async fn discovery_returns_the_jwks_uri() {
    let (listener, addr) = common::listener().await;
    let jwks_uri = format!("http://{addr}/keys");
    let metadata = json!({ "issuer": format!("http://{addr}/id/ABC"), "jwks_uri": jwks_uri });
    let router = Router::new().route(
        "/id/ABC/.well-known/openid-configuration",
        get(move || {
            let metadata = metadata.clone();
            async move { Json(metadata) }
        }),
    );
    common::serve(listener, router);

    let discovery = OidcDiscovery::new(common::fetcher());
    let uri = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}/id/ABC/")).await.unwrap();

    assert_eq!(uri, jwks_uri);
}

#[tokio::test]
async fn non_success_status_is_an_infrastructure_failure() {
    let (listener, addr) = common::listener().await;
    common::serve(listener, Router::new());

    let discovery = OidcDiscovery::new(common::fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}")).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(err.to_string().ends_with("returned HTTP 404"), "{err}");
}

#[tokio::test]
async fn accepted_status_with_metadata_is_still_rejected() {
    let (listener, addr) = common::listener().await;
    let jwks_uri = format!("http://{addr}/keys");
    let router = Router::new().route(
        "/.well-known/openid-configuration",
        get(move || {
            let body = json!({ "issuer": "x", "jwks_uri": jwks_uri.clone() });
            async move { (StatusCode::ACCEPTED, Json(body)) }
        }),
    );
    common::serve(listener, router);

    let discovery = OidcDiscovery::new(common::fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}")).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(err.to_string().ends_with("returned HTTP 202"), "{err}");
}

#[tokio::test]
async fn missing_jwks_uri_is_a_protocol_violation() {
    let (listener, addr) = common::listener().await;
    let router = Router::new().route(
        "/.well-known/openid-configuration",
        get(|| async { Json(json!({ "issuer": "x", "jwks_uri": "" })) }),
    );
    common::serve(listener, router);

    let discovery = OidcDiscovery::new(common::fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}")).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    assert!(err.to_string().contains("jwks_uri missing"));
}

#[tokio::test]
async fn unreachable_issuer_is_a_network_failure() {
    let addr = common::closed_addr().await;

    let discovery = OidcDiscovery::new(common::fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}")).await.unwrap_err();

    assert!(matches!(err, CheckError::Infrastructure(ref message) if message.starts_with("request to")));
}

#[tokio::test]
async fn plain_http_is_refused_by_default() {
    let discovery = OidcDiscovery::new(common::strict_fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, "http://127.0.0.1:1").await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(err.to_string().contains("plain http is not allowed"));
}

#[tokio::test]
async fn oversized_metadata_is_rejected() {
    let (listener, addr) = common::listener().await;
    let router = Router::new().route(
        "/.well-known/openid-configuration",
        get(|| async { (StatusCode::OK, "x".repeat(2 * 1024 * 1024)) }),
    );
    common::serve(listener, router);

    let discovery = OidcDiscovery::new(common::fetcher());
    let err = discovery.jwks_uri(&CheckContext::new(), FIELD, &format!("http://{addr}")).await.unwrap_err();

    assert!(err.to_string().contains("response exceeds"), "{err}");
}
