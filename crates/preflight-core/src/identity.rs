// crates/preflight-core/src/identity.rs
// ============================================================================
// Module: Federated Identity Values
// Description: Federated tokens and temporary cloud credentials.
// Purpose: Carry identity material between pipeline stages without leaking it.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Tokens and credentials pass from one stage to the next and are never
//! persisted. `Debug` output redacts secret material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Replacement text for secret values in debug output.
const REDACTED: &str = "<redacted>";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Signed, short-lived token bound to one in-cluster ServiceAccount.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedToken {
    /// ServiceAccount namespace.
    pub namespace: String,
    /// ServiceAccount name.
    pub service_account: String,
    /// Audience the token was issued for.
    pub audience: String,
    /// Requested lifetime in seconds.
    pub expiration_seconds: i64,
    /// Encoded JWT.
    token: String,
}

impl FederatedToken {
    /// Wraps an issued token.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        service_account: impl Into<String>,
        audience: impl Into<String>,
        expiration_seconds: i64,
        token: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
            audience: audience.into(),
            expiration_seconds,
            token: token.into(),
        }
    }

    /// Returns the encoded JWT.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for FederatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedToken")
            .field("namespace", &self.namespace)
            .field("service_account", &self.service_account)
            .field("audience", &self.audience)
            .field("expiration_seconds", &self.expiration_seconds)
            .field("token", &REDACTED)
            .finish()
    }
}

/// Temporary AWS credentials returned by STS.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token.
    pub session_token: String,
    /// Expiry as seconds since the Unix epoch, when reported.
    pub expires_at_unix: Option<i64>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .field("session_token", &REDACTED)
            .field("expires_at_unix", &self.expires_at_unix)
            .finish()
    }
}

/// Azure bearer token obtained through a client assertion.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    /// Bearer access token.
    pub access_token: String,
    /// Lifetime in seconds, when reported.
    pub expires_in_secs: Option<u64>,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("access_token", &REDACTED)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// Cloud credentials produced by a federation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCredentials {
    /// AWS STS session.
    Aws(AwsCredentials),
    /// Azure AD access token.
    Azure(AzureCredentials),
}
