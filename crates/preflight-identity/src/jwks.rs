// crates/preflight-identity/src/jwks.rs
// ============================================================================
// Module: JWKS Verification
// Description: Signature, expiry and audience checks of federated tokens.
// Purpose: Prove each minted token is signed by a key the issuer publishes.
// Dependencies: jsonwebtoken, serde_json, crate::{error, http}
// ============================================================================

//! ## Overview
//! The key set is fetched once per check and never cached across runs.
//! Each token's header `kid` must resolve to a key in the set; the
//! signature, `exp` and audience are then verified. Only asymmetric
//! algorithms are accepted. The first failure aborts verification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::jwk::JwkSet;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::FederatedToken;

use crate::error::IdentityError;
use crate::http::HttpFetcher;

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies federated tokens against an issuer key set.
#[derive(Debug, Clone)]
pub struct JwksVerifier {
    /// Shared HTTP client.
    http: HttpFetcher,
}

impl JwksVerifier {
    /// Builds a verifier.
    #[must_use]
    pub const fn new(http: HttpFetcher) -> Self {
        Self {
            http,
        }
    }

    /// Fetches the key set published at `jwks_uri`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a refused scheme, an
    /// infrastructure error for network or status failures, and a protocol
    /// violation for an undecodable set.
    pub async fn fetch(&self, ctx: &CheckContext, jwks_uri: &str) -> Result<JwkSet, CheckError> {
        let url = self.http.parse_url("jwks_uri", jwks_uri)?;
        Ok(ctx.run("fetching JWKS", self.http.get_document(&url)).await??)
    }

    /// Fetches the key set once and verifies every token against it.
    ///
    /// # Errors
    ///
    /// Returns the fetch error or the first token that fails verification.
    pub async fn verify_all(
        &self,
        ctx: &CheckContext,
        jwks_uri: &str,
        tokens: &[FederatedToken],
    ) -> Result<(), CheckError> {
        let keys = self.fetch(ctx, jwks_uri).await?;
        for token in tokens {
            ctx.ensure_active("verifying tokens")?;
            verify_token(&keys, token)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Token Checks
// ============================================================================

/// Returns true for algorithms backed by a public key.
#[must_use]
pub const fn is_asymmetric(algorithm: Algorithm) -> bool {
    !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Verifies one token against a key set.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidToken`] when the header is malformed,
/// the algorithm is symmetric, the `kid` is unknown, or the signature,
/// expiry or audience check fails.
pub fn verify_token(keys: &JwkSet, token: &FederatedToken) -> Result<(), IdentityError> {
    let subject = format!("{}/{}", token.namespace, token.service_account);
    let invalid = |reason: String| IdentityError::InvalidToken {
        subject: subject.clone(),
        reason,
    };

    let header = decode_header(token.secret()).map_err(|err| invalid(err.to_string()))?;
    if !is_asymmetric(header.alg) {
        return Err(invalid("symmetric signing algorithms are not accepted".to_string()));
    }
    let kid = header.kid.as_deref().ok_or_else(|| invalid("token header has no kid".to_string()))?;
    let jwk = keys.find(kid).ok_or_else(|| invalid(format!("key {kid} not found in JWKS")))?;
    let key = DecodingKey::from_jwk(jwk).map_err(|err| invalid(format!("key {kid} is unusable: {err}")))?;

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[token.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "aud"]);
    decode::<serde_json::Value>(token.secret(), &key, &validation).map_err(|err| invalid(err.to_string()))?;
    Ok(())
}
