// crates/preflight-identity/src/oidc.rs
// ============================================================================
// Module: OIDC Issuer
// Description: Issuer shape validation and JWKS URI discovery.
// Purpose: Confirm the cluster issuer is well formed and publishes its keys.
// Dependencies: regex, serde, crate::{error, http}
// ============================================================================

//! ## Overview
//! Issuer shape is checked offline against provider-specific patterns. GCP
//! has no federation issuer and always passes. Discovery derives
//! `<issuer>/.well-known/openid-configuration` and requires a non-empty
//! `jwks_uri`; network, status and missing-field failures stay distinct.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CloudProvider;
use regex::Regex;
use serde::Deserialize;

use crate::error::IdentityError;
use crate::http::HttpFetcher;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// EKS issuer pattern (no scheme).
pub const AWS_ISSUER_PATTERN: &str = r"^oidc\.eks\.(af|il|ap|ca|eu|me|sa|us|cn|us-gov|us-iso|us-isob)-(central|north|northeast|northwest|south|southeast|southwest|east|west)-\d\.amazonaws\.com/id/\w+$";

/// AKS issuer pattern (scheme and trailing slash required).
pub const AZURE_ISSUER_PATTERN: &str = r"^https://.+\.oic\.prod-aks\.azure\.com/[\w+-]+/[\w+-]+/$";

/// Path of the OIDC provider metadata document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

// ============================================================================
// SECTION: Issuer Shape
// ============================================================================

/// Validates the issuer URL shape for `provider`.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidEndpoint`] naming `field` when the URL
/// does not match the provider pattern.
pub fn validate_issuer(provider: CloudProvider, field: &str, issuer: &str) -> Result<(), IdentityError> {
    let pattern = match provider {
        CloudProvider::Aws => AWS_ISSUER_PATTERN,
        CloudProvider::Azure => AZURE_ISSUER_PATTERN,
        CloudProvider::Gcp => return Ok(()),
    };
    let regex = Regex::new(pattern).map_err(|err| IdentityError::InvalidEndpoint {
        field: field.to_string(),
        reason: err.to_string(),
    })?;
    if regex.is_match(issuer) {
        Ok(())
    } else {
        Err(IdentityError::InvalidEndpoint {
            field: field.to_string(),
            reason: format!("{issuer} is not a valid {provider} OIDC issuer"),
        })
    }
}

/// Derives the discovery document URL from an issuer.
#[must_use]
pub fn discovery_url(issuer: &str) -> String {
    let trimmed = issuer.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        format!("{trimmed}{WELL_KNOWN_PATH}")
    } else {
        format!("https://{trimmed}{WELL_KNOWN_PATH}")
    }
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Subset of OIDC provider metadata used here.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    /// Key set location.
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Discovers the JWKS URI of an issuer.
#[derive(Debug, Clone)]
pub struct OidcDiscovery {
    /// Shared HTTP client.
    http: HttpFetcher,
}

impl OidcDiscovery {
    /// Builds a discovery client.
    #[must_use]
    pub const fn new(http: HttpFetcher) -> Self {
        Self {
            http,
        }
    }

    /// Fetches the metadata document and returns its `jwks_uri`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a refused scheme, an
    /// infrastructure error for network or status failures, and a protocol
    /// violation when `jwks_uri` is absent or empty.
    pub async fn jwks_uri(&self, ctx: &CheckContext, field: &str, issuer: &str) -> Result<String, CheckError> {
        let url = self.http.parse_url(field, &discovery_url(issuer))?;
        let metadata: ProviderMetadata =
            ctx.run("fetching OIDC metadata", self.http.get_document(&url)).await??;
        match metadata.jwks_uri {
            Some(uri) if !uri.trim().is_empty() => Ok(uri),
            _ => Err(IdentityError::MissingJwksUri(url.to_string()).into()),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
