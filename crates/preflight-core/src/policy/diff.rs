// crates/preflight-core/src/policy/diff.rs
// ============================================================================
// Module: Structural Diff
// Description: Field-level change records between two JSON values.
// Purpose: Produce the changelog the equivalence engine filters.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`diff_values`] walks a baseline and a target value and emits one
//! [`ChangeRecord`] per differing field:
//! - objects diff by key (`delete` for baseline-only keys, `create` for
//!   target-only keys);
//! - lists made only of scalars diff as sets, ignoring order;
//! - other lists diff by index;
//! - anything else that differs is an `update`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One step of a structural path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// List index.
    Index(usize),
}

impl PathSegment {
    /// Returns the key when this segment is an object key.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Ordered field path, displayed dotted (`Statement.0.Action.1`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ChangePath(Vec<PathSegment>);

impl ChangePath {
    /// Builds a path from segments.
    #[must_use]
    pub const fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChangePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the target.
    Create,
    /// Present in both with different values.
    Update,
    /// Present only in the baseline.
    Delete,
}

impl ChangeKind {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A single field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// Change kind.
    pub kind: ChangeKind,
    /// Field path.
    pub path: ChangePath,
    /// Baseline value (absent for `create`).
    pub from: Option<Value>,
    /// Target value (absent for `delete`).
    pub to: Option<Value>,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.path)?;
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => write!(f, " ({from} -> {to})"),
            (Some(value), None) | (None, Some(value)) => write!(f, " ({value})"),
            (None, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Diffs `baseline` against `target` starting at `prefix`.
#[must_use]
pub fn diff_values_at(prefix: &[PathSegment], baseline: &Value, target: &Value) -> Vec<ChangeRecord> {
    let mut path = prefix.to_vec();
    let mut out = Vec::new();
    diff_into(&mut path, baseline, target, &mut out);
    out
}

/// Diffs `baseline` against `target` from the root.
#[must_use]
pub fn diff_values(baseline: &Value, target: &Value) -> Vec<ChangeRecord> {
    diff_values_at(&[], baseline, target)
}

/// Builds a `create` record at `path`.
pub(crate) fn created(path: &[PathSegment], value: &Value) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Create,
        path: ChangePath::new(path.to_vec()),
        from: None,
        to: Some(value.clone()),
    }
}

/// Builds a `delete` record at `path`.
pub(crate) fn deleted(path: &[PathSegment], value: &Value) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Delete,
        path: ChangePath::new(path.to_vec()),
        from: Some(value.clone()),
        to: None,
    }
}

/// Builds an `update` record at `path`.
pub(crate) fn updated(path: &[PathSegment], from: &Value, to: &Value) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Update,
        path: ChangePath::new(path.to_vec()),
        from: Some(from.clone()),
        to: Some(to.clone()),
    }
}

/// Recursive worker.
fn diff_into(path: &mut Vec<PathSegment>, baseline: &Value, target: &Value, out: &mut Vec<ChangeRecord>) {
    match (baseline, target) {
        (Value::Object(base), Value::Object(tgt)) => {
            for (key, base_value) in base {
                path.push(PathSegment::Key(key.clone()));
                match tgt.get(key) {
                    Some(tgt_value) => diff_into(path, base_value, tgt_value, out),
                    None => out.push(deleted(path, base_value)),
                }
                path.pop();
            }
            for (key, tgt_value) in tgt {
                if !base.contains_key(key) {
                    path.push(PathSegment::Key(key.clone()));
                    out.push(created(path, tgt_value));
                    path.pop();
                }
            }
        }
        (Value::Array(base), Value::Array(tgt)) => {
            if base.iter().chain(tgt.iter()).all(is_scalar) {
                diff_scalar_set(path, base, tgt, out);
            } else {
                diff_indexed(path, base, tgt, out);
            }
        }
        _ if baseline == target => {}
        _ => out.push(updated(path, baseline, target)),
    }
}

/// Order-insensitive diff of two scalar lists.
fn diff_scalar_set(path: &mut Vec<PathSegment>, base: &[Value], tgt: &[Value], out: &mut Vec<ChangeRecord>) {
    for (index, value) in base.iter().enumerate() {
        if !tgt.contains(value) {
            path.push(PathSegment::Index(index));
            out.push(deleted(path, value));
            path.pop();
        }
    }
    for (index, value) in tgt.iter().enumerate() {
        if !base.contains(value) {
            path.push(PathSegment::Index(index));
            out.push(created(path, value));
            path.pop();
        }
    }
}

/// Positional diff of two lists.
fn diff_indexed(path: &mut Vec<PathSegment>, base: &[Value], tgt: &[Value], out: &mut Vec<ChangeRecord>) {
    let longest = base.len().max(tgt.len());
    for index in 0 .. longest {
        path.push(PathSegment::Index(index));
        match (base.get(index), tgt.get(index)) {
            (Some(base_value), Some(tgt_value)) => diff_into(path, base_value, tgt_value, out),
            (Some(base_value), None) => out.push(deleted(path, base_value)),
            (None, Some(tgt_value)) => out.push(created(path, tgt_value)),
            (None, None) => {}
        }
        path.pop();
    }
}

/// Returns true for values with no nested structure.
const fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
