// crates/preflight-core/src/pipeline.rs
// ============================================================================
// Module: Check Pipeline
// Description: Uniform stage contract and strictly sequential pipelines.
// Purpose: Compose provider-specific verification stages.
// Dependencies: async-trait, crate::{audit, context, error, identity}
// ============================================================================

//! ## Overview
//! A [`Stage`] receives the previous stage's outputs and returns its own.
//! Values crossing a stage boundary are a small tagged type
//! ([`StageValue`]); each consumer decodes what it needs and fails with
//! [`CheckError::Contract`] on a mismatch.
//!
//! Invariants:
//! - Stages run strictly in order; the first failure stops the pipeline.
//! - Failures are wrapped in a [`StageError`] naming the stage.
//! - The pipeline never retries; side-effecting stages own their idempotence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::audit::AuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StageAuditEvent;
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::error::StageError;
use crate::error::StageId;
use crate::identity::CloudCredentials;
use crate::identity::FederatedToken;

// ============================================================================
// SECTION: Stage Values
// ============================================================================

/// Value passed from one stage to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageValue {
    /// JWKS URI discovered from OIDC metadata.
    JwksUri(String),
    /// Federated tokens minted for in-cluster ServiceAccounts.
    Tokens(Vec<FederatedToken>),
    /// Cloud credentials obtained by federation exchange.
    Credentials(CloudCredentials),
}

impl StageValue {
    /// Returns the variant label used in contract errors.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::JwksUri(_) => "jwks_uri",
            Self::Tokens(_) => "tokens",
            Self::Credentials(_) => "credentials",
        }
    }
}

/// Values produced by a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutputs(Vec<StageValue>);

impl StageOutputs {
    /// Builds an empty output list.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Appends a value.
    #[must_use]
    pub fn with(mut self, value: StageValue) -> Self {
        self.0.push(value);
        self
    }

    /// Returns the values.
    #[must_use]
    pub fn values(&self) -> &[StageValue] {
        &self.0
    }

    /// Returns true when the stage produced nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Values received by a stage; consumed by typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageInputs(Vec<StageValue>);

impl From<StageOutputs> for StageInputs {
    fn from(outputs: StageOutputs) -> Self {
        Self(outputs.0)
    }
}

impl StageInputs {
    /// Builds inputs from explicit values.
    #[must_use]
    pub const fn new(values: Vec<StageValue>) -> Self {
        Self(values)
    }

    /// Takes the discovered JWKS URI.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Contract`] when no JWKS URI was passed.
    pub fn take_jwks_uri(&mut self) -> Result<String, CheckError> {
        match self.take("jwks_uri", |value| matches!(value, StageValue::JwksUri(_)))? {
            StageValue::JwksUri(uri) => Ok(uri),
            other => Err(mismatch("jwks_uri", &other)),
        }
    }

    /// Takes the federated tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Contract`] when no tokens were passed.
    pub fn take_tokens(&mut self) -> Result<Vec<FederatedToken>, CheckError> {
        match self.take("tokens", |value| matches!(value, StageValue::Tokens(_)))? {
            StageValue::Tokens(tokens) => Ok(tokens),
            other => Err(mismatch("tokens", &other)),
        }
    }

    /// Takes the exchanged cloud credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Contract`] when no credentials were passed.
    pub fn take_credentials(&mut self) -> Result<CloudCredentials, CheckError> {
        match self.take("credentials", |value| matches!(value, StageValue::Credentials(_)))? {
            StageValue::Credentials(credentials) => Ok(credentials),
            other => Err(mismatch("credentials", &other)),
        }
    }

    /// Removes the first value matching `predicate`.
    fn take(&mut self, wanted: &str, predicate: impl Fn(&StageValue) -> bool) -> Result<StageValue, CheckError> {
        let position = self.0.iter().position(predicate).ok_or_else(|| {
            let received = self.0.iter().map(StageValue::label).collect::<Vec<_>>().join(", ");
            CheckError::Contract(format!("expected {wanted} input, received [{received}]"))
        })?;
        Ok(self.0.remove(position))
    }
}

/// Builds a contract error for a decoded value of the wrong variant.
fn mismatch(wanted: &str, received: &StageValue) -> CheckError {
    CheckError::Contract(format!("expected {wanted} input, received {}", received.label()))
}

// ============================================================================
// SECTION: Stage Contract
// ============================================================================

/// One verification stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the stage identifier used for sentinels and audit events.
    fn id(&self) -> StageId;

    /// Runs the stage against the previous stage's outputs.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CheckError`] on failure.
    async fn handle(&self, ctx: &CheckContext, inputs: StageInputs) -> Result<StageOutputs, CheckError>;
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Fixed, ordered sequence of stages.
pub struct Pipeline {
    /// Pipeline name used in audit events.
    name: String,
    /// Stages in execution order.
    stages: Vec<Box<dyn Stage>>,
    /// Audit sink for stage outcomes.
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            stages: Vec::new(),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage identifiers in execution order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|stage| stage.id()).collect()
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] naming the failed stage.
    pub async fn run(&self, ctx: &CheckContext) -> Result<StageOutputs, StageError> {
        let mut carried = StageOutputs::none();
        for stage in &self.stages {
            let id = stage.id();
            let started = Instant::now();
            let outcome = match ctx.ensure_active(id.as_str()) {
                Ok(()) => stage.handle(ctx, StageInputs::from(carried)).await,
                Err(err) => Err(err),
            };
            let elapsed_ms = started.elapsed().as_millis();
            match outcome {
                Ok(outputs) => {
                    self.audit.record_stage(&StageAuditEvent::completed(&self.name, id, elapsed_ms));
                    carried = outputs;
                }
                Err(source) => {
                    self.audit.record_stage(&StageAuditEvent::failed(&self.name, id, elapsed_ms, &source));
                    return Err(StageError::new(id, source));
                }
            }
        }
        Ok(carried)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    /// Pipeline name.
    name: String,
    /// Stages added so far.
    stages: Vec<Box<dyn Stage>>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl PipelineBuilder {
    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Appends an already boxed stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Finishes the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            stages: self.stages,
            audit: self.audit,
        }
    }
}
