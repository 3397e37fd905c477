// crates/preflight-checks/src/lib.rs
// ============================================================================
// Module: Preflight Checks Library
// Description: Provider checkers composed as pipeline stages.
// Purpose: Assemble and run the per-provider admission pipelines.
// Dependencies: crate::{aws, azure, capability, compare, engine, gcp, identity, scaffold}
// ============================================================================

//! ## Overview
//! Each provider check is a [`preflight_core::Stage`]. The
//! [`PreflightEngine`] wires them into the fixed order of the selected
//! cloud and appends the enabled capability checks. [`ScaffoldedRun`]
//! executes the same pipeline from inside the cluster behind temporary RBAC
//! scaffolding, and can run teardown alone for cleanup.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aws;
pub mod azure;
pub mod capability;
pub mod compare;
pub mod engine;
pub mod gcp;
pub mod identity;
pub mod scaffold;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aws::AwsBoundaryPolicyStage;
pub use aws::AwsExchangeStage;
pub use aws::AwsTarget;
pub use aws::AwsTrustPolicyStage;
pub use azure::AzureExchangeStage;
pub use azure::AzureRolePermissionsStage;
pub use azure::AzureTarget;
pub use capability::NodeGroupStage;
pub use capability::StorageClassStage;
pub use engine::PreflightEngine;
pub use engine::ProviderClients;
pub use engine::audit_sink;
pub use engine::executor_timing;
pub use gcp::GcpRolePermissionsStage;
pub use gcp::role_checker_pod;
pub use identity::IssuerTarget;
pub use identity::JwksDiscoveryStage;
pub use identity::OidcIssuerStage;
pub use identity::TokenIssuanceStage;
pub use identity::TokenVerificationStage;
pub use scaffold::ScaffoldedRun;
pub use scaffold::decode_env_config;
pub use scaffold::encode_env_config;
pub use scaffold::result_line;
