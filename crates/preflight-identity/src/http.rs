// crates/preflight-identity/src/http.rs
// ============================================================================
// Module: Identity HTTP Client
// Description: Bounded JSON fetches for OIDC, JWKS and Azure endpoints.
// Purpose: Share one immutable client across every identity call.
// Dependencies: reqwest, serde, url
// ============================================================================

//! ## Overview
//! [`HttpFetcher`] is built once from `[http]` settings and shared
//! read-only. Redirects are not followed, bodies are capped at
//! `max_response_bytes`, and plain `http` URLs are refused unless
//! explicitly allowed.
//! Security posture: remote metadata and key sets are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preflight_config::HttpSettings;
use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use url::Url;
use url::form_urlencoded;

use crate::error::IdentityError;

// ============================================================================
// SECTION: Client
// ============================================================================

/// Shared HTTP client for identity endpoints.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// Underlying client with timeouts applied.
    client: Client,
    /// Maximum accepted response body size.
    max_response_bytes: usize,
    /// Whether plain `http` URLs are accepted.
    allow_http: bool,
}

impl HttpFetcher {
    /// Builds a fetcher from `[http]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Request`] when the client cannot be built.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| IdentityError::Request {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            max_response_bytes: settings.max_response_bytes,
            allow_http: settings.allow_http,
        })
    }

    /// Returns true when plain `http` URLs are accepted.
    #[must_use]
    pub const fn allows_http(&self) -> bool {
        self.allow_http
    }

    /// Parses `raw` and enforces the scheme policy.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidEndpoint`] naming `field` when the URL
    /// does not parse or uses a refused scheme.
    pub fn parse_url(&self, field: &str, raw: &str) -> Result<Url, IdentityError> {
        let url = Url::parse(raw).map_err(|err| IdentityError::InvalidEndpoint {
            field: field.to_string(),
            reason: format!("{raw}: {err}"),
        })?;
        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_http => Ok(url),
            "http" => Err(IdentityError::InvalidEndpoint {
                field: field.to_string(),
                reason: format!("plain http is not allowed: {raw}"),
            }),
            scheme => Err(IdentityError::InvalidEndpoint {
                field: field.to_string(),
                reason: format!("unsupported scheme {scheme}"),
            }),
        }
    }

    /// Fetches a public metadata document; only `200 OK` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Request`], [`IdentityError::Status`] for any
    /// status other than 200, or [`IdentityError::Body`].
    pub async fn get_document<T: DeserializeOwned>(&self, url: &Url) -> Result<T, IdentityError> {
        let response = self.client.get(url.as_str()).send().await.map_err(|err| request_error(url, &err))?;
        self.read_json(url, response, StatusRule::ExactlyOk).await
    }

    /// Fetches and decodes a JSON document, optionally with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Request`], [`IdentityError::Status`] or
    /// [`IdentityError::Body`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url, bearer: Option<&str>) -> Result<T, IdentityError> {
        let mut request = self.client.get(url.as_str());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|err| request_error(url, &err))?;
        self.read_json(url, response, StatusRule::AnySuccess).await
    }

    /// Posts a form-encoded body and decodes the JSON answer.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Request`], [`IdentityError::Status`] or
    /// [`IdentityError::Body`].
    pub async fn post_form<T: DeserializeOwned>(&self, url: &Url, fields: &[(&str, &str)]) -> Result<T, IdentityError> {
        let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(fields.iter().copied()).finish();
        let response = self
            .client
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| request_error(url, &err))?;
        self.read_json(url, response, StatusRule::AnySuccess).await
    }

    /// Checks the status, reads a bounded body and decodes it.
    async fn read_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        mut response: Response,
        rule: StatusRule,
    ) -> Result<T, IdentityError> {
        let status = response.status();
        let accepted = match rule {
            StatusRule::ExactlyOk => status == StatusCode::OK,
            StatusRule::AnySuccess => status.is_success(),
        };
        if !accepted {
            return Err(IdentityError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| request_error(url, &err))? {
            if body.len().saturating_add(chunk.len()) > self.max_response_bytes {
                return Err(IdentityError::Body {
                    url: url.to_string(),
                    reason: format!("response exceeds {} bytes", self.max_response_bytes),
                });
            }
            body.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&body).map_err(|err| IdentityError::Body {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Statuses a response may carry before its body is read.
#[derive(Debug, Clone, Copy)]
enum StatusRule {
    /// Only `200 OK`.
    ExactlyOk,
    /// Any 2xx status.
    AnySuccess,
}

/// Maps a transport error.
fn request_error(url: &Url, err: &reqwest::Error) -> IdentityError {
    IdentityError::Request {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
