// crates/preflight-identity/src/lib.rs
// ============================================================================
// Module: Preflight Identity Library
// Description: Federated identity verification gates.
// Purpose: Verify the cluster-to-cloud trust path end to end.
// Dependencies: crate::{aws, azure, error, http, jwks, oidc, tokens}
// ============================================================================

//! ## Overview
//! The identity gates run in a fixed order: issuer shape, discovery of the
//! JWKS URI, token minting, JWKS verification and, for AWS and Azure, the
//! exchange of a verified token for cloud credentials. Every network call
//! goes through one shared [`HttpFetcher`] or a provider trait, so each gate
//! can be exercised against loopback servers or in-memory fakes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aws;
pub mod azure;
pub mod error;
pub mod http;
pub mod jwks;
pub mod oidc;
pub mod tokens;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aws::AwsFederation;
pub use aws::AwsSdkClient;
pub use aws::AwsTrustPath;
pub use aws::IamPolicyReader;
pub use aws::PolicyVersionInfo;
pub use azure::AzureFederation;
pub use azure::AzureRestClient;
pub use azure::AzureTrustPath;
pub use azure::RoleDefinition;
pub use azure::RoleDefinitionReader;
pub use error::IdentityError;
pub use http::HttpFetcher;
pub use jwks::JwksVerifier;
pub use oidc::OidcDiscovery;
pub use oidc::validate_issuer;
pub use tokens::AccountSelector;
pub use tokens::TokenMinter;
pub use tokens::TokenPolicy;
