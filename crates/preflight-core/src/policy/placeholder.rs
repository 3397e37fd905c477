// crates/preflight-core/src/policy/placeholder.rs
// ============================================================================
// Module: Placeholder Substitution
// Description: Materializes templated expected permission documents.
// Purpose: Replace environment tokens before structural comparison.
// Dependencies: crate::policy
// ============================================================================

//! ## Overview
//! Expected documents are templates containing `${CLUSTER_NAME}`,
//! `${ACCOUNT_ID}` and `${OIDC_ID}`. Substitution touches Principal values,
//! Resource values and Condition keys/values only; action patterns and
//! statement identifiers are left as written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::policy::codec::OneOrMany;
use crate::policy::document::PermissionDocument;
use crate::policy::document::Principal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token replaced with the cluster name.
pub const CLUSTER_NAME_PLACEHOLDER: &str = "${CLUSTER_NAME}";
/// Token replaced with the account or subscription identifier.
pub const ACCOUNT_ID_PLACEHOLDER: &str = "${ACCOUNT_ID}";
/// Token replaced with the OIDC issuer identifier.
pub const OIDC_ID_PLACEHOLDER: &str = "${OIDC_ID}";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Environment values substituted into expected documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceholderContext {
    /// Cluster name.
    cluster_name: String,
    /// Account or subscription identifier.
    account_id: String,
    /// OIDC issuer identifier (host and path, no scheme).
    issuer_id: String,
}

impl PlaceholderContext {
    /// Builds a context from environment values.
    #[must_use]
    pub fn new(
        cluster_name: impl Into<String>,
        account_id: impl Into<String>,
        issuer_id: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            account_id: account_id.into(),
            issuer_id: issuer_id.into(),
        }
    }

    /// Returns the cluster name.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the issuer identifier.
    #[must_use]
    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    /// Replaces every placeholder token in `input`.
    #[must_use]
    pub fn fill(&self, input: &str) -> String {
        input
            .replace(CLUSTER_NAME_PLACEHOLDER, &self.cluster_name)
            .replace(ACCOUNT_ID_PLACEHOLDER, &self.account_id)
            .replace(OIDC_ID_PLACEHOLDER, &self.issuer_id)
    }

    /// Returns a copy of `template` with every templated field filled.
    #[must_use]
    pub fn materialize(&self, template: &PermissionDocument) -> PermissionDocument {
        let mut document = template.clone();
        for statement in &mut document.statements {
            if let Some(resource) = statement.resource.as_mut() {
                self.fill_list(resource);
            }
            if let Some(principal) = statement.principal.as_mut() {
                match principal {
                    Principal::Wildcard(raw) => *raw = self.fill(raw),
                    Principal::Typed(entries) => entries.values_mut().for_each(|ids| self.fill_list(ids)),
                }
            }
            if let Some(condition) = statement.condition.as_mut() {
                for matchers in condition.values_mut() {
                    *matchers = self.fill_matchers(matchers);
                }
            }
        }
        document
    }

    /// Fills every value of a list in place.
    fn fill_list(&self, values: &mut OneOrMany<String>) {
        for value in values.as_mut_vec() {
            *value = self.fill(value);
        }
    }

    /// Rebuilds a matcher map with filled keys and values.
    fn fill_matchers(
        &self,
        matchers: &BTreeMap<String, OneOrMany<String>>,
    ) -> BTreeMap<String, OneOrMany<String>> {
        matchers
            .iter()
            .map(|(key, values)| {
                let filled = values.iter().map(|value| self.fill(value)).collect();
                (self.fill(key), filled)
            })
            .collect()
    }
}
