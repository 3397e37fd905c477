// crates/preflight-core/src/policy/codec.rs
// ============================================================================
// Module: One-Or-Many Codec
// Description: Scalar-or-list wire encoding for permission document fields.
// Purpose: Keep one list representation internally regardless of wire form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! IAM documents encode multi-valued fields either as a bare scalar or as a
//! list. [`OneOrMany`] always stores a list and re-encodes a singleton list
//! as a scalar, so the comparator never special-cases the wire form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

// ============================================================================
// SECTION: Types
// ============================================================================

/// List value that accepts a bare scalar on the wire.
///
/// # Invariants
/// - Internally always a list; a scalar decodes to a one-element list.
/// - Encodes a one-element list as the bare element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OneOrMany<T>(Vec<T>);

impl<T> OneOrMany<T> {
    /// Wraps an existing list.
    #[must_use]
    pub const fn new(values: Vec<T>) -> Self {
        Self(values)
    }

    /// Builds a one-element list.
    #[must_use]
    pub fn one(value: T) -> Self {
        Self(vec![value])
    }

    /// Returns the values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    /// Returns a mutable handle to the underlying list.
    pub const fn as_mut_vec(&mut self) -> &mut Vec<T> {
        &mut self.0
    }

    /// Consumes the wrapper and returns the list.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }

    /// Returns the number of values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the list holds no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the values.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

impl<T> FromIterator<T> for OneOrMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Accepted wire forms. List first so a sequence never binds to `One`.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireForm<T> {
    /// Sequence form.
    Many(Vec<T>),
    /// Bare scalar or object form.
    One(T),
}

impl<T> From<WireForm<T>> for Vec<T> {
    fn from(form: WireForm<T>) -> Self {
        match form {
            WireForm::Many(values) => values,
            WireForm::One(value) => vec![value],
        }
    }
}

impl<T: Serialize> Serialize for OneOrMany<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.as_slice() {
            [single] => single.serialize(serializer),
            values => values.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        WireForm::deserialize(deserializer).map(|form| Self(form.into()))
    }
}

// ============================================================================
// SECTION: Field Helpers
// ============================================================================

/// Deserializes a plain `Vec<T>` that may appear as a single element on the wire.
///
/// Used for fields (such as `Statement`) that always re-encode as a list.
///
/// # Errors
///
/// Returns the deserializer error when neither form matches.
pub fn one_or_many_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    WireForm::deserialize(deserializer).map(Vec::from)
}
