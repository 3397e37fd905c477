// crates/preflight-core/src/lib.rs
// ============================================================================
// Module: Preflight Core Library
// Description: Public API surface for the Preflight verification engine.
// Purpose: Expose the pipeline contract, policy engine and error taxonomy.
// Dependencies: crate::{audit, cloud, context, error, identity, permissions, pipeline, policy, registry}
// ============================================================================

//! ## Overview
//! Preflight core holds the provider-independent pieces of the admission
//! engine: the stage/pipeline contract, the superset-tolerant permission
//! equivalence engine, flat permission sets, the expected-policy registry
//! and the classified error model. Cluster and cloud access live in the
//! sibling crates and plug in through stages.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod cloud;
pub mod context;
pub mod error;
pub mod identity;
pub mod permissions;
pub mod pipeline;
pub mod policy;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::ResourceAction;
pub use audit::ResourceAuditEvent;
pub use audit::StderrAuditSink;
pub use cloud::CloudProvider;
pub use cloud::UnsupportedCloud;
pub use context::CheckContext;
pub use error::CheckError;
pub use error::CleanupError;
pub use error::CleanupFailure;
pub use error::ErrorClass;
pub use error::Mismatch;
pub use error::StageError;
pub use error::StageId;
pub use identity::AwsCredentials;
pub use identity::AzureCredentials;
pub use identity::CloudCredentials;
pub use identity::FederatedToken;
pub use permissions::PermissionSet;
pub use permissions::PermissionSetError;
pub use pipeline::Pipeline;
pub use pipeline::PipelineBuilder;
pub use pipeline::Stage;
pub use pipeline::StageInputs;
pub use pipeline::StageOutputs;
pub use pipeline::StageValue;
pub use policy::ChangeRecord;
pub use policy::EquivalenceReport;
pub use policy::PermissionDocument;
pub use policy::PermissionStatement;
pub use policy::PlaceholderContext;
pub use policy::PolicyEquivalenceEngine;
pub use policy::PolicyError;
pub use registry::ExpectedPolicyRegistry;
pub use registry::PolicyKind;
pub use registry::RegistryError;
