// crates/preflight-config/src/lib.rs
// ============================================================================
// Module: Preflight Config Library
// Description: Environment document contract and engine settings.
// Purpose: Expose fail-closed loaders for everything the checks read.
// Dependencies: crate::{env, settings}
// ============================================================================

//! ## Overview
//! Two inputs configure a preflight run: the environment document (which
//! cluster and cloud account to verify) and the engine settings (timeouts,
//! endpoints, scaffolding names, audit routing). Both validate on load and
//! name the offending field on failure.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod env;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use env::AwsSpec;
pub use env::AzureSpec;
pub use env::CloudSpec;
pub use env::EnvConfig;
pub use env::EnvSpec;
pub use env::GcpSpec;
pub use settings::AuditSettings;
pub use settings::AwsSettings;
pub use settings::AzureSettings;
pub use settings::CapabilitySettings;
pub use settings::ConfigError;
pub use settings::ExecutorSettings;
pub use settings::HttpSettings;
pub use settings::PreflightConfig;
pub use settings::ScaffoldSettings;
pub use settings::TokenSettings;
