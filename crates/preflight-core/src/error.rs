// crates/preflight-core/src/error.rs
// ============================================================================
// Module: Check Errors
// Description: Classified failures and stage sentinels for admission checks.
// Purpose: Let callers branch on which precondition failed without parsing text.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every failure is a [`CheckError`] with an [`ErrorClass`]. Pipelines wrap
//! it in a [`StageError`] whose [`StageId`] names the failed precondition.
//! Cleanup failures aggregate into a [`CleanupError`] and attach to, but
//! never replace, a primary failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::policy::ChangeRecord;
use crate::policy::PolicyError;

// ============================================================================
// SECTION: Stage Identifiers
// ============================================================================

/// Pipeline stage identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// OIDC issuer shape validation.
    OidcIssuer,
    /// OIDC discovery of the JWKS URI.
    JwksDiscovery,
    /// Federated token issuance.
    TokenIssuance,
    /// Federated token verification against the JWKS.
    TokenVerification,
    /// Token exchange for cloud credentials.
    CredentialExchange,
    /// Trust (assume-role) policy comparison.
    TrustPolicy,
    /// Permission boundary policy comparison.
    BoundaryPolicy,
    /// Provider role permission containment.
    RolePermissions,
    /// Default storage class check.
    StorageClass,
    /// GPU node group check.
    NodeGroup,
    /// RBAC scaffolding provisioning.
    Scaffolding,
    /// In-cluster checker execution.
    EphemeralCheck,
}

impl StageId {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OidcIssuer => "oidc_issuer",
            Self::JwksDiscovery => "jwks_discovery",
            Self::TokenIssuance => "token_issuance",
            Self::TokenVerification => "token_verification",
            Self::CredentialExchange => "credential_exchange",
            Self::TrustPolicy => "trust_policy",
            Self::BoundaryPolicy => "boundary_policy",
            Self::RolePermissions => "role_permissions",
            Self::StorageClass => "storage_class",
            Self::NodeGroup => "node_group",
            Self::Scaffolding => "scaffolding",
            Self::EphemeralCheck => "ephemeral_check",
        }
    }

    /// Returns the sentinel message prefixed to stage failures.
    #[must_use]
    pub const fn sentinel(self) -> &'static str {
        match self {
            Self::OidcIssuer => "failed to check OIDC URL",
            Self::JwksDiscovery => "failed to discover JWKS URI",
            Self::TokenIssuance => "failed to retrieve JWTs",
            Self::TokenVerification => "failed to check JWTs",
            Self::CredentialExchange => "failed to exchange federated token",
            Self::TrustPolicy => "failed to check assume role policy",
            Self::BoundaryPolicy => "failed to check boundary policy",
            Self::RolePermissions => "failed to check Crossplane role",
            Self::StorageClass => "failed to check storage class",
            Self::NodeGroup => "failed to check node group",
            Self::Scaffolding => "failed to provision scaffolding",
            Self::EphemeralCheck => "failed to run in-cluster check",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Coarse failure classes for remediation routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed or missing configuration; fatal and unretried.
    Configuration,
    /// API or infrastructure failure surfaced immediately.
    Transient,
    /// Observed permissions do not satisfy the expected baseline.
    PermissionMismatch,
    /// Environment or implementation inconsistency.
    ProtocolViolation,
    /// Caller cancelled the check.
    Cancelled,
}

impl ErrorClass {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transient => "transient",
            Self::PermissionMismatch => "permission_mismatch",
            Self::ProtocolViolation => "protocol_violation",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Diagnostic payload of a permission mismatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// Filtered structural changelog.
    Changelog(Vec<ChangeRecord>),
    /// Expected permissions absent from the observed role.
    MissingPermissions(Vec<String>),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changelog(records) => {
                write!(f, "permission document mismatch: ")?;
                for (index, record) in records.iter().enumerate() {
                    if index > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{record}")?;
                }
                Ok(())
            }
            Self::MissingPermissions(missing) => {
                write!(f, "role missing permissions: {}", missing.join(", "))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// One resource that could not be removed during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Resource description (`kind namespace/name`).
    pub resource: String,
    /// Failure detail.
    pub reason: String,
}

/// Aggregated teardown failures.
///
/// # Invariants
/// - Never empty when returned as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_failures(.failures))]
pub struct CleanupError {
    /// Individual failures in teardown order.
    pub failures: Vec<CleanupFailure>,
}

/// Joins cleanup failures for display.
fn render_failures(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.resource, failure.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Classified check failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    /// Malformed or missing configuration field.
    #[error("invalid configuration {field}: {reason}")]
    Config {
        /// Offending field.
        field: String,
        /// Failure detail.
        reason: String,
    },
    /// Cluster, cloud or network API failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
    /// In-cluster job reached the Failed phase; payload is its output line.
    #[error("in-cluster job failed: {0}")]
    JobFailed(String),
    /// Observed permissions do not satisfy the expected baseline.
    #[error("{0}")]
    PermissionMismatch(Mismatch),
    /// Environment or implementation inconsistency.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// A stage received inputs of the wrong shape.
    #[error("stage contract violated: {0}")]
    Contract(String),
    /// The explicit deadline elapsed.
    #[error("deadline exceeded while {0}")]
    DeadlineExceeded(String),
    /// The caller cancelled the check.
    #[error("check cancelled")]
    Cancelled,
    /// The check passed but teardown failed.
    #[error("cleanup failed: {0}")]
    Cleanup(CleanupError),
    /// The check failed and teardown failed as well.
    #[error("{primary} (cleanup also failed: {cleanup})")]
    Compound {
        /// Primary failure.
        primary: Box<CheckError>,
        /// Teardown failures.
        cleanup: CleanupError,
    },
}

impl CheckError {
    /// Builds a configuration error naming the offending field.
    #[must_use]
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the failure class; compound errors report the primary's class.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config {
                ..
            } => ErrorClass::Configuration,
            Self::Infrastructure(_) | Self::JobFailed(_) | Self::DeadlineExceeded(_) | Self::Cleanup(_) => {
                ErrorClass::Transient
            }
            Self::PermissionMismatch(_) => ErrorClass::PermissionMismatch,
            Self::Protocol(_) | Self::Contract(_) => ErrorClass::ProtocolViolation,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Compound {
                primary, ..
            } => primary.class(),
        }
    }

    /// Returns the mismatch payload, looking through compound errors.
    #[must_use]
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::PermissionMismatch(mismatch) => Some(mismatch),
            Self::Compound {
                primary, ..
            } => primary.mismatch(),
            _ => None,
        }
    }

    /// Returns the primary failure, looking through compound errors.
    #[must_use]
    pub fn primary(&self) -> &Self {
        match self {
            Self::Compound {
                primary, ..
            } => primary.primary(),
            other => other,
        }
    }

    /// Attaches teardown failures without replacing this error.
    #[must_use]
    pub fn with_cleanup(self, cleanup: Option<CleanupError>) -> Self {
        match cleanup {
            None => self,
            Some(cleanup) => Self::Compound {
                primary: Box::new(self),
                cleanup,
            },
        }
    }

    /// Combines an outcome with its teardown result.
    ///
    /// # Errors
    ///
    /// Returns the primary error (with cleanup attached) or
    /// [`CheckError::Cleanup`] when only teardown failed.
    pub fn settle<T>(outcome: Result<T, Self>, cleanup: Result<(), CleanupError>) -> Result<T, Self> {
        match (outcome, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(Self::Cleanup(cleanup)),
            (Err(primary), cleanup) => Err(primary.with_cleanup(cleanup.err())),
        }
    }
}

impl From<PolicyError> for CheckError {
    fn from(err: PolicyError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Stage failure wrapped with its stage sentinel.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {source}", .stage.sentinel())]
pub struct StageError {
    /// Failed stage.
    pub stage: StageId,
    /// Underlying failure.
    pub source: CheckError,
}

impl StageError {
    /// Wraps a failure with its stage.
    #[must_use]
    pub const fn new(stage: StageId, source: CheckError) -> Self {
        Self {
            stage,
            source,
        }
    }

    /// Returns the failure class of the underlying error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.source.class()
    }
}
