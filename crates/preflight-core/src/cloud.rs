// crates/preflight-core/src/cloud.rs
// ============================================================================
// Module: Cloud Providers
// Description: Supported cloud provider identifiers.
// Purpose: Key provider-specific pipelines and expected-policy tables.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Providers are parsed once from the environment document; any other
//! identifier is a configuration error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud Platform.
    Gcp,
}

impl CloudProvider {
    /// All supported providers.
    pub const ALL: [Self; 3] = [Self::Aws, Self::Azure, Self::Gcp];

    /// Returns the lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown provider identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported cloud type: {0}")]
pub struct UnsupportedCloud(pub String);

impl FromStr for CloudProvider {
    type Err = UnsupportedCloud;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnsupportedCloud(value.to_string()))
    }
}
