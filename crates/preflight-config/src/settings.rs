// crates/preflight-config/src/settings.rs
// ============================================================================
// Module: Preflight Settings
// Description: Engine settings loading and validation.
// Purpose: Provide strict, fail-closed settings parsing with hard limits.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Settings are loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to production defaults; unknown
//! keys are rejected so typos fail closed instead of silently defaulting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default settings filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "preflight.toml";
/// Environment variable used to override the settings path.
pub const CONFIG_ENV_VAR: &str = "PREFLIGHT_CONFIG";
/// Maximum settings file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for HTTP response bodies.
const MAX_RESPONSE_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Shortest token lifetime the cluster token API accepts.
const MIN_TOKEN_EXPIRATION_SECONDS: i64 = 600;
/// Longest accepted token lifetime.
const MAX_TOKEN_EXPIRATION_SECONDS: i64 = 86_400;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Preflight engine settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreflightConfig {
    /// Outbound HTTP client settings.
    #[serde(default)]
    pub http: HttpSettings,
    /// Ephemeral Pod execution settings.
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// RBAC scaffolding settings for in-cluster runs.
    #[serde(default)]
    pub scaffold: ScaffoldSettings,
    /// Federated token issuance settings.
    #[serde(default)]
    pub tokens: TokenSettings,
    /// AWS federation settings.
    #[serde(default)]
    pub aws: AwsSettings,
    /// Azure federation settings.
    #[serde(default)]
    pub azure: AzureSettings,
    /// Cluster capability checks.
    #[serde(default)]
    pub capabilities: CapabilitySettings,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditSettings,
}

impl PreflightConfig {
    /// Loads settings from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the settings for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()?;
        self.executor.validate()?;
        self.scaffold.validate()?;
        self.tokens.validate()?;
        self.aws.validate(self.http.allow_http)?;
        self.azure.validate(self.http.allow_http)?;
        self.capabilities.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Allow plain `http` endpoints (loopback testing only).
    #[serde(default)]
    pub allow_http: bool,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            allow_http: false,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates HTTP settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("http.timeout_ms must be greater than zero".to_string()));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid("http.max_response_bytes out of range".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("http.user_agent must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Ephemeral Pod execution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSettings {
    /// Pod phase poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for the Pod to reach a terminal phase.
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,
    /// Deadline for a stale Pod to disappear after deletion.
    #[serde(default = "default_removal_timeout_ms")]
    pub removal_timeout_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            job_timeout_ms: default_job_timeout_ms(),
            removal_timeout_ms: default_removal_timeout_ms(),
        }
    }
}

impl ExecutorSettings {
    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the terminal-phase deadline.
    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    /// Returns the stale Pod removal deadline.
    #[must_use]
    pub const fn removal_timeout(&self) -> Duration {
        Duration::from_millis(self.removal_timeout_ms)
    }

    /// Validates executor settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "executor.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.job_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::Invalid(
                "executor.job_timeout_ms must be at least executor.poll_interval_ms".to_string(),
            ));
        }
        if self.removal_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::Invalid(
                "executor.removal_timeout_ms must be at least executor.poll_interval_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// RBAC scaffolding settings for in-cluster runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaffoldSettings {
    /// Application name; prefixes every scaffolded object.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Namespace holding the checker ServiceAccount and Pod.
    #[serde(default = "default_control_namespace")]
    pub control_namespace: String,
    /// Checker image; required for scaffolded runs.
    #[serde(default)]
    pub image: Option<String>,
    /// Command run by the checker Pod.
    #[serde(default = "default_checker_command")]
    pub command: Vec<String>,
}

impl Default for ScaffoldSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            control_namespace: default_control_namespace(),
            image: None,
            command: default_checker_command(),
        }
    }
}

impl ScaffoldSettings {
    /// Validates scaffold settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_dns_label("scaffold.app_name", &self.app_name)?;
        validate_dns_label("scaffold.control_namespace", &self.control_namespace)?;
        if let Some(image) = &self.image
            && image.trim().is_empty()
        {
            return Err(ConfigError::Invalid("scaffold.image must be non-empty".to_string()));
        }
        if self.command.is_empty() {
            return Err(ConfigError::Invalid("scaffold.command must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Federated token issuance settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSettings {
    /// Namespace holding the provider ServiceAccounts.
    #[serde(default = "default_token_namespace")]
    pub namespace: String,
    /// Requested token lifetime in seconds.
    #[serde(default = "default_token_expiration_seconds")]
    pub expiration_seconds: i64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            namespace: default_token_namespace(),
            expiration_seconds: default_token_expiration_seconds(),
        }
    }
}

impl TokenSettings {
    /// Validates token settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_dns_label("tokens.namespace", &self.namespace)?;
        if !(MIN_TOKEN_EXPIRATION_SECONDS..=MAX_TOKEN_EXPIRATION_SECONDS).contains(&self.expiration_seconds) {
            return Err(ConfigError::Invalid(format!(
                "tokens.expiration_seconds must be between {MIN_TOKEN_EXPIRATION_SECONDS} and \
                 {MAX_TOKEN_EXPIRATION_SECONDS}"
            )));
        }
        Ok(())
    }
}

/// AWS federation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSettings {
    /// Region used for STS and IAM clients.
    #[serde(default = "default_aws_region")]
    pub region: String,
    /// Optional STS endpoint override.
    #[serde(default)]
    pub sts_endpoint: Option<String>,
    /// Optional IAM endpoint override.
    #[serde(default)]
    pub iam_endpoint: Option<String>,
    /// Session name override; defaults to the application name.
    #[serde(default)]
    pub session_name: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: default_aws_region(),
            sts_endpoint: None,
            iam_endpoint: None,
            session_name: None,
        }
    }
}

impl AwsSettings {
    /// Validates AWS settings.
    fn validate(&self, allow_http: bool) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("aws.region must be non-empty".to_string()));
        }
        if let Some(endpoint) = &self.sts_endpoint {
            validate_endpoint("aws.sts_endpoint", endpoint, allow_http)?;
        }
        if let Some(endpoint) = &self.iam_endpoint {
            validate_endpoint("aws.iam_endpoint", endpoint, allow_http)?;
        }
        if let Some(name) = &self.session_name
            && (name.is_empty() || name.len() > 64)
        {
            return Err(ConfigError::Invalid("aws.session_name must be 1-64 characters".to_string()));
        }
        Ok(())
    }
}

/// Azure federation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureSettings {
    /// Identity platform authority host.
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Resource manager endpoint.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    /// Role definitions API version.
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            authority_host: default_authority_host(),
            management_endpoint: default_management_endpoint(),
            api_version: default_azure_api_version(),
        }
    }
}

impl AzureSettings {
    /// Returns the OAuth scope of the resource manager.
    #[must_use]
    pub fn management_scope(&self) -> String {
        format!("{}/.default", self.management_endpoint.trim_end_matches('/'))
    }

    /// Validates Azure settings.
    fn validate(&self, allow_http: bool) -> Result<(), ConfigError> {
        validate_endpoint("azure.authority_host", &self.authority_host, allow_http)?;
        validate_endpoint("azure.management_endpoint", &self.management_endpoint, allow_http)?;
        if self.api_version.trim().is_empty() {
            return Err(ConfigError::Invalid("azure.api_version must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Cluster capability check settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitySettings {
    /// Require a default StorageClass.
    #[serde(default = "default_true")]
    pub storage_class: bool,
    /// Require nodes matching the GPU label selector.
    #[serde(default)]
    pub gpu_nodes: bool,
    /// Label selector identifying GPU nodes.
    #[serde(default = "default_gpu_label_selector")]
    pub gpu_label_selector: String,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            storage_class: true,
            gpu_nodes: false,
            gpu_label_selector: default_gpu_label_selector(),
        }
    }
}

impl CapabilitySettings {
    /// Validates capability settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.gpu_nodes && !self.gpu_label_selector.contains('=') {
            return Err(ConfigError::Invalid(
                "capabilities.gpu_label_selector must be key=value".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSettings {
    /// Enable structured audit logging.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditSettings {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Settings and environment document errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or YAML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the settings path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    validate_path(Path::new(trimmed)).map_err(|_| ConfigError::Invalid(format!("{field} exceeds path limits")))
}

/// Validates an endpoint URL scheme.
fn validate_endpoint(field: &str, value: &str, allow_http: bool) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with("https://") && trimmed.len() > "https://".len() {
        return Ok(());
    }
    if allow_http && trimmed.starts_with("http://") && trimmed.len() > "http://".len() {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!("{field} must be an https url")))
}

/// Validates a Kubernetes DNS-1123 label.
fn validate_dns_label(field: &str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && value.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if !valid {
        return Err(ConfigError::Invalid(format!("{field} must be a DNS-1123 label")));
    }
    Ok(())
}

/// Default HTTP timeout.
const fn default_http_timeout_ms() -> u64 {
    10_000
}

/// Default response body limit.
const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

/// Default user agent.
fn default_user_agent() -> String {
    format!("preflight/{}", env!("CARGO_PKG_VERSION"))
}

/// Default Pod poll interval.
const fn default_poll_interval_ms() -> u64 {
    2_000
}

/// Default terminal-phase deadline.
const fn default_job_timeout_ms() -> u64 {
    300_000
}

/// Default stale Pod removal deadline.
const fn default_removal_timeout_ms() -> u64 {
    60_000
}

/// Default application name.
fn default_app_name() -> String {
    "preflight".to_string()
}

/// Default control namespace.
fn default_control_namespace() -> String {
    "kube-system".to_string()
}

/// Default checker command.
fn default_checker_command() -> Vec<String> {
    vec!["preflight".to_string(), "pod".to_string()]
}

/// Default token namespace.
fn default_token_namespace() -> String {
    "crossplane".to_string()
}

/// Default token lifetime.
const fn default_token_expiration_seconds() -> i64 {
    3_600
}

/// Default AWS region.
fn default_aws_region() -> String {
    "us-east-1".to_string()
}

/// Default Azure authority host.
fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

/// Default Azure resource manager endpoint.
fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

/// Default role definitions API version.
fn default_azure_api_version() -> String {
    "2022-04-01".to_string()
}

/// Default GPU node selector.
fn default_gpu_label_selector() -> String {
    "type=gpu".to_string()
}

/// Serde default for flags that start enabled.
const fn default_true() -> bool {
    true
}
