// crates/preflight-identity/src/error.rs
// ============================================================================
// Module: Identity Errors
// Description: Failures raised while verifying the federated trust path.
// Purpose: Keep network, protocol and configuration failures distinct.
// Dependencies: preflight-core, thiserror
// ============================================================================

//! ## Overview
//! Every identity failure maps onto one [`CheckError`] class. Issuer shape
//! and scheme problems are configuration errors, transport and non-success
//! responses are infrastructure errors, and malformed or inconsistent
//! answers are protocol violations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preflight_core::CheckError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// A configured issuer or endpoint is malformed.
    #[error("invalid {field}: {reason}")]
    InvalidEndpoint {
        /// Offending configuration field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// The request could not be sent or the response not read.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Requested URL.
        url: String,
        /// Transport error text.
        reason: String,
    },
    /// The endpoint answered with a status the call does not accept.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response body is not what the endpoint contract promises.
    #[error("invalid response from {url}: {reason}")]
    Body {
        /// Requested URL.
        url: String,
        /// Decoding or size failure.
        reason: String,
    },
    /// OIDC metadata lacks a JWKS URI.
    #[error("jwks_uri missing from OIDC metadata at {0}")]
    MissingJwksUri(String),
    /// No token could be minted.
    #[error("no JWTs retrieved")]
    NoTokens,
    /// A token failed verification.
    #[error("token for {subject} is not valid: {reason}")]
    InvalidToken {
        /// `namespace/service-account` the token belongs to.
        subject: String,
        /// Verification failure.
        reason: String,
    },
    /// A cloud federation or management API call failed.
    #[error("{service} call failed: {reason}")]
    Cloud {
        /// Service name.
        service: &'static str,
        /// Provider error text.
        reason: String,
    },
    /// The cloud answered with data that does not fit the expected shape.
    #[error("{0}")]
    Inconsistent(String),
}

impl IdentityError {
    /// Builds a cloud API error.
    pub fn cloud(service: &'static str, reason: impl ToString) -> Self {
        Self::Cloud {
            service,
            reason: reason.to_string(),
        }
    }
}

impl From<IdentityError> for CheckError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidEndpoint {
                field,
                reason,
            } => Self::Config {
                field,
                reason,
            },
            IdentityError::Request {
                ..
            }
            | IdentityError::Status {
                ..
            }
            | IdentityError::Cloud {
                ..
            } => Self::Infrastructure(err.to_string()),
            IdentityError::Body {
                ..
            }
            | IdentityError::MissingJwksUri(_)
            | IdentityError::NoTokens
            | IdentityError::InvalidToken {
                ..
            }
            | IdentityError::Inconsistent(_) => Self::Protocol(err.to_string()),
        }
    }
}
