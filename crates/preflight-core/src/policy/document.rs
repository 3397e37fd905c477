// crates/preflight-core/src/policy/document.rs
// ============================================================================
// Module: Permission Documents
// Description: IAM-style permission statements and documents.
// Purpose: Typed model for expected and observed permission documents.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`PermissionDocument`] is a version tag plus an ordered list of
//! [`PermissionStatement`]s. Multi-valued fields use [`OneOrMany`] so both
//! wire forms decode to the same value.
//!
//! Invariants:
//! - Exactly one of `Action` / `NotAction` is populated per statement.
//! - An empty list counts as unpopulated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::policy::PolicyError;
use crate::policy::codec::OneOrMany;
use crate::policy::codec::one_or_many_vec;

// ============================================================================
// SECTION: Field Names
// ============================================================================

/// Wire name of the statement identifier field.
pub const FIELD_SID: &str = "Sid";
/// Wire name of the effect field.
pub const FIELD_EFFECT: &str = "Effect";
/// Wire name of the granted action list.
pub const FIELD_ACTION: &str = "Action";
/// Wire name of the excluded action list.
pub const FIELD_NOT_ACTION: &str = "NotAction";
/// Wire name of the resource field.
pub const FIELD_RESOURCE: &str = "Resource";
/// Wire name of the principal field.
pub const FIELD_PRINCIPAL: &str = "Principal";
/// Wire name of the condition block.
pub const FIELD_CONDITION: &str = "Condition";
/// Wire name of the document version.
pub const FIELD_VERSION: &str = "Version";
/// Wire name of the statement list.
pub const FIELD_STATEMENT: &str = "Statement";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grants the listed actions.
    Allow,
    /// Denies the listed actions.
    Deny,
}

impl Effect {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// Action pattern list.
pub type ActionList = OneOrMany<String>;

/// Condition block: operator name to key/value matchers.
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, OneOrMany<String>>>;

/// Statement principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    /// Bare principal string such as `"*"`.
    Wildcard(String),
    /// Principal type (`Federated`, `AWS`, `Service`) to identifiers.
    Typed(BTreeMap<String, OneOrMany<String>>),
}

/// One permission statement.
///
/// # Invariants
/// - Valid only when exactly one of `action` / `not_action` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatement {
    /// Optional statement identifier.
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Statement effect.
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Granted action patterns.
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionList>,
    /// Excluded action patterns.
    #[serde(rename = "NotAction", default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<ActionList>,
    /// Resource patterns.
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,
    /// Principal the statement applies to.
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Condition block.
    #[serde(rename = "Condition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionBlock>,
}

impl PermissionStatement {
    /// Builds an empty statement with the given effect.
    #[must_use]
    pub const fn new(effect: Effect) -> Self {
        Self {
            sid: None,
            effect,
            action: None,
            not_action: None,
            resource: None,
            principal: None,
            condition: None,
        }
    }

    /// Checks the Action/NotAction invariant.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MissingAction`] when neither list is populated and
    /// [`PolicyError::ConflictingAction`] when both are.
    pub fn validate(&self, index: usize) -> Result<(), PolicyError> {
        let has_action = self.action.as_ref().is_some_and(|list| !list.is_empty());
        let has_not_action = self.not_action.as_ref().is_some_and(|list| !list.is_empty());
        match (has_action, has_not_action) {
            (true, false) | (false, true) => Ok(()),
            (false, false) => Err(PolicyError::MissingAction {
                index,
            }),
            (true, true) => Err(PolicyError::ConflictingAction {
                index,
            }),
        }
    }

    /// Returns the canonical JSON form: every multi-valued field as a list.
    #[must_use]
    pub fn canonical(&self) -> Value {
        let mut object = Map::new();
        if let Some(sid) = &self.sid {
            object.insert(FIELD_SID.to_string(), Value::String(sid.clone()));
        }
        object.insert(FIELD_EFFECT.to_string(), Value::String(self.effect.as_str().to_string()));
        if let Some(action) = &self.action {
            object.insert(FIELD_ACTION.to_string(), list_value(action));
        }
        if let Some(not_action) = &self.not_action {
            object.insert(FIELD_NOT_ACTION.to_string(), list_value(not_action));
        }
        if let Some(resource) = &self.resource {
            object.insert(FIELD_RESOURCE.to_string(), list_value(resource));
        }
        if let Some(principal) = &self.principal {
            let value = match principal {
                Principal::Wildcard(raw) => Value::String(raw.clone()),
                Principal::Typed(entries) => Value::Object(
                    entries.iter().map(|(kind, ids)| (kind.clone(), list_value(ids))).collect(),
                ),
            };
            object.insert(FIELD_PRINCIPAL.to_string(), value);
        }
        if let Some(condition) = &self.condition {
            let value = condition
                .iter()
                .map(|(operator, matchers)| {
                    let inner = matchers
                        .iter()
                        .map(|(key, values)| (key.clone(), list_value(values)))
                        .collect::<Map<String, Value>>();
                    (operator.clone(), Value::Object(inner))
                })
                .collect::<Map<String, Value>>();
            object.insert(FIELD_CONDITION.to_string(), Value::Object(value));
        }
        Value::Object(object)
    }
}

/// Versioned permission document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDocument {
    /// Policy language version tag.
    #[serde(rename = "Version")]
    pub version: String,
    /// Ordered statements.
    #[serde(rename = "Statement", deserialize_with = "one_or_many_vec")]
    pub statements: Vec<PermissionStatement>,
}

impl PermissionDocument {
    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Malformed`] when the text is not a permission document.
    pub fn from_json(text: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(text).map_err(|err| PolicyError::Malformed(err.to_string()))
    }

    /// Encodes the document in conventional wire form.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Malformed`] when serialization fails.
    pub fn to_json(&self) -> Result<String, PolicyError> {
        serde_json::to_string(self).map_err(|err| PolicyError::Malformed(err.to_string()))
    }

    /// Validates every statement.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Empty`] for a document without statements, or the
    /// first statement-level violation.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.statements.is_empty() {
            return Err(PolicyError::Empty);
        }
        self.statements.iter().enumerate().try_for_each(|(index, stmt)| stmt.validate(index))
    }

    /// Finds a statement by identifier.
    #[must_use]
    pub fn statement_by_sid(&self, sid: &str) -> Option<(usize, &PermissionStatement)> {
        self.statements.iter().enumerate().find(|(_, stmt)| stmt.sid.as_deref() == Some(sid))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a string list into a JSON array.
fn list_value(values: &OneOrMany<String>) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}
