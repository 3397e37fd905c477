// crates/preflight-core/src/registry/mod.rs
// ============================================================================
// Module: Expected Policy Registry
// Description: Read-only expected policies keyed by provider and kind.
// Purpose: Share provider baselines across checks without global state.
// Dependencies: crate::{cloud, permissions, policy}, thiserror
// ============================================================================

//! ## Overview
//! The registry is built once (from the built-in tables or a custom
//! builder) and then only read. Share it behind an `Arc`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod tables;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::cloud::CloudProvider;
use crate::permissions::PermissionSet;
use crate::permissions::PermissionSetError;
use crate::policy::PermissionDocument;
use crate::policy::PolicyError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Kind of expected policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyKind {
    /// Trust policy on the federated role.
    AssumeRoleTrust,
    /// Permission boundary policy.
    PermissionBoundary,
    /// Flat role permission listing.
    RolePermissions,
}

impl PolicyKind {
    /// Returns the kebab-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssumeRoleTrust => "assume-role-trust",
            Self::PermissionBoundary => "permission-boundary",
            Self::RolePermissions => "role-permissions",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyKey {
    /// Cloud provider.
    pub provider: CloudProvider,
    /// Policy kind.
    pub kind: PolicyKind,
}

/// Expected policy payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedPolicy {
    /// Structured template compared by the equivalence engine.
    Document(PermissionDocument),
    /// Flat listing compared by containment.
    Permissions(PermissionSet),
}

/// Registry lookup and construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No entry for the key.
    #[error("no expected policy for {provider}/{kind}")]
    Missing {
        /// Cloud provider.
        provider: CloudProvider,
        /// Policy kind.
        kind: PolicyKind,
    },
    /// Entry exists with a different payload shape.
    #[error("expected policy {provider}/{kind} is not a {wanted}")]
    WrongShape {
        /// Cloud provider.
        provider: CloudProvider,
        /// Policy kind.
        kind: PolicyKind,
        /// Wanted payload shape.
        wanted: &'static str,
    },
    /// Built-in document failed to parse or validate.
    #[error("invalid expected policy: {0}")]
    InvalidDocument(#[from] PolicyError),
    /// Built-in permission list is not a set.
    #[error("invalid expected permissions: {0}")]
    InvalidPermissions(#[from] PermissionSetError),
}

/// Immutable expected-policy registry.
///
/// # Invariants
/// - Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct ExpectedPolicyRegistry {
    /// Entries by key.
    entries: BTreeMap<PolicyKey, ExpectedPolicy>,
}

impl ExpectedPolicyRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds the registry from the built-in provider tables.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when a built-in table is invalid.
    pub fn builtin() -> Result<Self, RegistryError> {
        let registry = Self::builder()
            .document(
                CloudProvider::Aws,
                PolicyKind::AssumeRoleTrust,
                PermissionDocument::from_json(tables::AWS_ASSUME_ROLE_TRUST)?,
            )?
            .document(
                CloudProvider::Aws,
                PolicyKind::PermissionBoundary,
                PermissionDocument::from_json(tables::AWS_PERMISSION_BOUNDARY)?,
            )?
            .permissions(
                CloudProvider::Azure,
                PolicyKind::RolePermissions,
                PermissionSet::from_unique(tables::AZURE_ROLE_PERMISSIONS.iter().copied())?,
            )
            .permissions(
                CloudProvider::Gcp,
                PolicyKind::RolePermissions,
                PermissionSet::from_unique(tables::GCP_ROLE_PERMISSIONS.iter().copied())?,
            )
            .build();
        Ok(registry)
    }

    /// Returns the entry for a key.
    #[must_use]
    pub fn get(&self, provider: CloudProvider, kind: PolicyKind) -> Option<&ExpectedPolicy> {
        self.entries.get(&PolicyKey {
            provider,
            kind,
        })
    }

    /// Returns the expected document for a key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Missing`] or [`RegistryError::WrongShape`].
    pub fn document(&self, provider: CloudProvider, kind: PolicyKind) -> Result<&PermissionDocument, RegistryError> {
        match self.get(provider, kind) {
            Some(ExpectedPolicy::Document(document)) => Ok(document),
            Some(ExpectedPolicy::Permissions(_)) => Err(RegistryError::WrongShape {
                provider,
                kind,
                wanted: "permission document",
            }),
            None => Err(RegistryError::Missing {
                provider,
                kind,
            }),
        }
    }

    /// Returns the expected permission set for a key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Missing`] or [`RegistryError::WrongShape`].
    pub fn permissions(&self, provider: CloudProvider, kind: PolicyKind) -> Result<&PermissionSet, RegistryError> {
        match self.get(provider, kind) {
            Some(ExpectedPolicy::Permissions(set)) => Ok(set),
            Some(ExpectedPolicy::Document(_)) => Err(RegistryError::WrongShape {
                provider,
                kind,
                wanted: "permission set",
            }),
            None => Err(RegistryError::Missing {
                provider,
                kind,
            }),
        }
    }

    /// Returns every registered key.
    #[must_use]
    pub fn keys(&self) -> Vec<PolicyKey> {
        self.entries.keys().copied().collect()
    }
}

/// Builder for [`ExpectedPolicyRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    /// Entries collected so far.
    entries: BTreeMap<PolicyKey, ExpectedPolicy>,
}

impl RegistryBuilder {
    /// Registers a document after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDocument`] for an invalid template.
    pub fn document(
        mut self,
        provider: CloudProvider,
        kind: PolicyKind,
        document: PermissionDocument,
    ) -> Result<Self, RegistryError> {
        document.validate()?;
        self.entries.insert(
            PolicyKey {
                provider,
                kind,
            },
            ExpectedPolicy::Document(document),
        );
        Ok(self)
    }

    /// Registers a permission set.
    #[must_use]
    pub fn permissions(mut self, provider: CloudProvider, kind: PolicyKind, set: PermissionSet) -> Self {
        self.entries.insert(
            PolicyKey {
                provider,
                kind,
            },
            ExpectedPolicy::Permissions(set),
        );
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ExpectedPolicyRegistry {
        ExpectedPolicyRegistry {
            entries: self.entries,
        }
    }
}
