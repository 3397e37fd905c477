// crates/preflight-checks/src/compare.rs
// ============================================================================
// Module: Expected Policy Comparison
// Description: Turns equivalence and containment results into check errors.
// Purpose: Share the mismatch mapping across provider stages.
// Dependencies: preflight-core
// ============================================================================

//! ## Overview
//! Structured documents go through the [`PolicyEquivalenceEngine`]; flat
//! permission listings are compared by set containment. Both raise
//! [`CheckError::PermissionMismatch`] carrying the diagnostic payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preflight_core::CheckError;
use preflight_core::CloudProvider;
use preflight_core::ExpectedPolicyRegistry;
use preflight_core::Mismatch;
use preflight_core::PermissionDocument;
use preflight_core::PermissionSet;
use preflight_core::PolicyEquivalenceEngine;
use preflight_core::PolicyKind;
use preflight_core::RegistryError;

// ============================================================================
// SECTION: Comparison
// ============================================================================

/// Fails unless `observed` satisfies the registry template for `kind`.
///
/// # Errors
///
/// Returns [`CheckError::PermissionMismatch`] with the filtered changelog,
/// or a protocol violation when a document is invalid or the template is
/// missing.
pub fn require_equivalent(
    engine: &PolicyEquivalenceEngine,
    registry: &ExpectedPolicyRegistry,
    provider: CloudProvider,
    kind: PolicyKind,
    observed: &PermissionDocument,
) -> Result<(), CheckError> {
    let expected = registry.document(provider, kind).map_err(registry_error)?;
    let report = engine.evaluate(expected, observed)?;
    if report.is_equivalent() {
        Ok(())
    } else {
        Err(CheckError::PermissionMismatch(Mismatch::Changelog(report.into_changelog())))
    }
}

/// Fails unless `observed` contains every expected permission for `provider`.
///
/// # Errors
///
/// Returns [`CheckError::PermissionMismatch`] naming absent permissions.
pub fn require_contains(
    registry: &ExpectedPolicyRegistry,
    provider: CloudProvider,
    observed: &PermissionSet,
) -> Result<(), CheckError> {
    let expected = expected_permissions(registry, provider)?;
    let missing = expected.missing_from(observed);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CheckError::PermissionMismatch(Mismatch::MissingPermissions(missing)))
    }
}

/// Returns the expected role permissions of `provider`.
///
/// # Errors
///
/// Returns a protocol violation when the registry has no listing.
pub fn expected_permissions(
    registry: &ExpectedPolicyRegistry,
    provider: CloudProvider,
) -> Result<&PermissionSet, CheckError> {
    registry.permissions(provider, PolicyKind::RolePermissions).map_err(registry_error)
}

/// Maps a registry lookup failure.
fn registry_error(err: RegistryError) -> CheckError {
    CheckError::Protocol(err.to_string())
}
