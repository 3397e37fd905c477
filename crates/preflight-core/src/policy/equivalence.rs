// crates/preflight-core/src/policy/equivalence.rs
// ============================================================================
// Module: Policy Equivalence Engine
// Description: Superset-tolerant comparison of permission documents.
// Purpose: Accept monotonic widening while catching any narrowing.
// Dependencies: crate::policy
// ============================================================================

//! ## Overview
//! The engine materializes the expected template, diffs it against the
//! observed document and filters the changelog:
//! - `create` records inside a statement's `Action`, `NotAction` or
//!   `Condition` are dropped (tolerated supersets);
//! - every other record is retained.
//!
//! An empty filtered changelog means the observed document satisfies the
//! expected one. Documents violating the Action/NotAction invariant are
//! rejected before any diffing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::policy::PolicyError;
use crate::policy::diff::ChangeKind;
use crate::policy::diff::ChangeRecord;
use crate::policy::diff::PathSegment;
use crate::policy::diff::created;
use crate::policy::diff::deleted;
use crate::policy::diff::diff_values_at;
use crate::policy::diff::updated;
use crate::policy::document::FIELD_ACTION;
use crate::policy::document::FIELD_CONDITION;
use crate::policy::document::FIELD_NOT_ACTION;
use crate::policy::document::FIELD_STATEMENT;
use crate::policy::document::FIELD_VERSION;
use crate::policy::document::PermissionDocument;
use crate::policy::placeholder::PlaceholderContext;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of an equivalence evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquivalenceReport {
    /// Filtered changelog; empty when equivalent.
    changelog: Vec<ChangeRecord>,
}

impl EquivalenceReport {
    /// Returns true when no retained change remains.
    #[must_use]
    pub const fn is_equivalent(&self) -> bool {
        self.changelog.is_empty()
    }

    /// Returns the retained changes.
    #[must_use]
    pub fn changelog(&self) -> &[ChangeRecord] {
        &self.changelog
    }

    /// Consumes the report and returns the retained changes.
    #[must_use]
    pub fn into_changelog(self) -> Vec<ChangeRecord> {
        self.changelog
    }
}

/// Compares observed permission documents with expected templates.
///
/// # Invariants
/// - Placeholder substitution always precedes diffing.
#[derive(Debug, Clone)]
pub struct PolicyEquivalenceEngine {
    /// Values substituted into expected templates.
    context: PlaceholderContext,
}

impl PolicyEquivalenceEngine {
    /// Builds an engine for one environment.
    #[must_use]
    pub const fn new(context: PlaceholderContext) -> Self {
        Self {
            context,
        }
    }

    /// Returns the placeholder context.
    #[must_use]
    pub const fn context(&self) -> &PlaceholderContext {
        &self.context
    }

    /// Evaluates `observed` against the `expected` template.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when either document violates the statement
    /// invariants.
    pub fn evaluate(
        &self,
        expected: &PermissionDocument,
        observed: &PermissionDocument,
    ) -> Result<EquivalenceReport, PolicyError> {
        expected.validate()?;
        observed.validate()?;
        let baseline = self.context.materialize(expected);
        let changelog = diff_documents(&baseline, observed)
            .into_iter()
            .filter(|record| !is_tolerated_addition(record))
            .collect();
        Ok(EquivalenceReport {
            changelog,
        })
    }

    /// Returns true when `observed` satisfies `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when either document is invalid.
    pub fn equivalent(
        &self,
        expected: &PermissionDocument,
        observed: &PermissionDocument,
    ) -> Result<bool, PolicyError> {
        self.evaluate(expected, observed).map(|report| report.is_equivalent())
    }
}

// ============================================================================
// SECTION: Document Diff
// ============================================================================

/// Diffs two documents statement by statement.
///
/// An expected statement with a `Sid` pairs with the observed statement of
/// the same `Sid`; otherwise it pairs by position. Observed statements left
/// unpaired become `create` records at their own index.
#[must_use]
pub fn diff_documents(baseline: &PermissionDocument, target: &PermissionDocument) -> Vec<ChangeRecord> {
    let mut out = Vec::new();
    if baseline.version != target.version {
        out.push(updated(
            &[PathSegment::Key(FIELD_VERSION.to_string())],
            &Value::String(baseline.version.clone()),
            &Value::String(target.version.clone()),
        ));
    }

    let mut paired = vec![false; target.statements.len()];
    for (index, expected) in baseline.statements.iter().enumerate() {
        let by_sid = expected
            .sid
            .as_deref()
            .and_then(|sid| target.statement_by_sid(sid))
            .map(|(position, _)| position)
            .filter(|position| !paired.get(*position).copied().unwrap_or(true));
        let partner = by_sid.or_else(|| {
            (index < target.statements.len() && !paired.get(index).copied().unwrap_or(true))
                .then_some(index)
        });
        let prefix = [PathSegment::Key(FIELD_STATEMENT.to_string()), PathSegment::Index(index)];
        match partner.and_then(|position| target.statements.get(position).map(|stmt| (position, stmt))) {
            Some((position, observed)) => {
                if let Some(flag) = paired.get_mut(position) {
                    *flag = true;
                }
                out.extend(diff_values_at(&prefix, &expected.canonical(), &observed.canonical()));
            }
            None => out.push(deleted(&prefix, &expected.canonical())),
        }
    }

    for (position, observed) in target.statements.iter().enumerate() {
        if !paired.get(position).copied().unwrap_or(false) {
            let prefix = [PathSegment::Key(FIELD_STATEMENT.to_string()), PathSegment::Index(position)];
            out.push(created(&prefix, &observed.canonical()));
        }
    }
    out
}

// ============================================================================
// SECTION: Filtering
// ============================================================================

/// Returns true for additions the comparator tolerates.
///
/// Paths have the shape `Statement.<i>.<field>...`; an addition is tolerated
/// when it sits inside an action list (an entry, not the field itself) or
/// anywhere within a condition block.
#[must_use]
pub fn is_tolerated_addition(record: &ChangeRecord) -> bool {
    if record.kind != ChangeKind::Create {
        return false;
    }
    let segments = record.path.segments();
    let in_statement = matches!(
        segments,
        [PathSegment::Key(root), PathSegment::Index(_), ..] if root == FIELD_STATEMENT
    );
    if !in_statement {
        return false;
    }
    match segments.get(2).and_then(PathSegment::as_key) {
        Some(field) if field == FIELD_ACTION || field == FIELD_NOT_ACTION => segments.len() >= 4,
        Some(field) if field == FIELD_CONDITION => true,
        _ => false,
    }
}
