// crates/preflight-core/src/policy/mod.rs
// ============================================================================
// Module: Permission Policy
// Description: Permission document model, diff and equivalence engine.
// Purpose: Decide whether observed IAM/RBAC documents satisfy expectations.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The policy module reconciles structurally different permission documents:
//! [`codec`] canonicalizes scalar-or-list fields, [`placeholder`] fills
//! expected templates, [`diff`] produces change records and [`equivalence`]
//! filters them into a verdict.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod diff;
pub mod document;
pub mod equivalence;
pub mod placeholder;


// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codec::OneOrMany;
pub use diff::ChangeKind;
pub use diff::ChangePath;
pub use diff::ChangeRecord;
pub use diff::PathSegment;
pub use document::ActionList;
pub use document::ConditionBlock;
pub use document::Effect;
pub use document::PermissionDocument;
pub use document::PermissionStatement;
pub use document::Principal;
pub use equivalence::EquivalenceReport;
pub use equivalence::PolicyEquivalenceEngine;
pub use placeholder::PlaceholderContext;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Permission document errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Document could not be decoded or encoded.
    #[error("malformed permission document: {0}")]
    Malformed(String),
    /// Document has no statements.
    #[error("permission document has no statements")]
    Empty,
    /// Statement has neither Action nor NotAction.
    #[error("statement {index} has neither Action nor NotAction")]
    MissingAction {
        /// Statement index.
        index: usize,
    },
    /// Statement has both Action and NotAction.
    #[error("statement {index} has both Action and NotAction")]
    ConflictingAction {
        /// Statement index.
        index: usize,
    },
}
