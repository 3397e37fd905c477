// crates/preflight-core/src/permissions.rs
// ============================================================================
// Module: Flat Permission Sets
// Description: Unstructured permission listings and containment checks.
// Purpose: Compare role permission listings by simple set containment.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Some providers expose a role only as a flat list of permission names.
//! Those listings are checked by containment: every expected permission must
//! be present; extra observed permissions are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ordered set of permission names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

/// Errors raised while building a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionSetError {
    /// The same permission was listed twice.
    #[error("duplicate permission: {0}")]
    Duplicate(String),
}

impl PermissionSet {
    /// Parses a delimiter-separated listing, ignoring blank entries.
    #[must_use]
    pub fn from_delimited(line: &str, delimiter: char) -> Self {
        line.split(delimiter).map(str::trim).filter(|entry| !entry.is_empty()).collect()
    }

    /// Builds a set, rejecting repeated entries.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionSetError::Duplicate`] naming the first repeat.
    pub fn from_unique<I, S>(entries: I) -> Result<Self, PermissionSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for entry in entries {
            let entry = entry.into();
            if set.contains(&entry) {
                return Err(PermissionSetError::Duplicate(entry));
            }
            set.insert(entry);
        }
        Ok(Self(set))
    }

    /// Returns true when `permission` is in the set.
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Returns the number of permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for an empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates permissions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the expected permissions (`self`) absent from `observed`, sorted.
    #[must_use]
    pub fn missing_from(&self, observed: &Self) -> Vec<String> {
        self.0.difference(&observed.0).cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
