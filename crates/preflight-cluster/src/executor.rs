// crates/preflight-cluster/src/executor.rs
// ============================================================================
// Module: Ephemeral Executor
// Description: Run-to-completion Pod launch, polling, log capture and removal.
// Purpose: Run a verification command inside the cluster and return its line.
// Dependencies: crate::api, preflight-core, tokio
// ============================================================================

//! ## Overview
//! One execution owns one reserved Pod name. A stale Pod under that name is
//! removed first; the new Pod is polled until `Succeeded` or `Failed`
//! within an explicit deadline; its log is read exactly once and must hold
//! exactly one non-blank line.
//!
//! Invariants:
//! - The Pod is deleted whenever execution ends, except on cancellation.
//! - A cleanup failure is attached to a primary failure, never replaces it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use preflight_core::AuditSink;
use preflight_core::CheckContext;
use preflight_core::CheckError;
use preflight_core::CleanupError;
use preflight_core::CleanupFailure;
use preflight_core::Mismatch;
use preflight_core::NoopAuditSink;
use preflight_core::PermissionSet;
use preflight_core::ResourceAction;
use preflight_core::ResourceAuditEvent;
use preflight_core::audit::PodAuditEvent;
use tokio::time::Instant;

use crate::api::ClusterApi;
use crate::api::ClusterError;
use crate::api::ClusterObject;
use crate::api::PodPhase;
use crate::api::PodTemplate;
use crate::api::ResourceRef;
use crate::api::delete_within;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Delimiter separating permissions in a checker's output line.
pub const PERMISSION_DELIMITER: char = ';';

// ============================================================================
// SECTION: Types
// ============================================================================

/// Poll cadence and deadlines of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorTiming {
    /// Delay between phase and existence polls.
    pub poll_interval: Duration,
    /// Deadline for the Pod to reach a terminal phase.
    pub job_timeout: Duration,
    /// Deadline for a stale Pod to disappear; also bounds each deletion.
    pub removal_timeout: Duration,
}

impl Default for ExecutorTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            job_timeout: Duration::from_secs(300),
            removal_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs single-container Pods to completion.
pub struct EphemeralExecutor {
    /// Cluster backend.
    cluster: Arc<dyn ClusterApi>,
    /// Poll cadence and deadlines.
    timing: ExecutorTiming,
    /// Audit sink for Pod events.
    audit: Arc<dyn AuditSink>,
}

impl EphemeralExecutor {
    /// Builds an executor without audit output.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>, timing: ExecutorTiming) -> Self {
        Self {
            cluster,
            timing,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Routes Pod events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Runs the Pod and returns its single output line.
    ///
    /// # Errors
    ///
    /// - [`CheckError::JobFailed`] with the output line when the Pod failed.
    /// - [`CheckError::Protocol`] when the log is not exactly one line,
    ///   whatever the terminal phase.
    /// - [`CheckError::DeadlineExceeded`] when a deadline elapsed.
    /// - [`CheckError::Cleanup`] or [`CheckError::Compound`] when the Pod
    ///   could not be deleted.
    pub async fn run(&self, ctx: &CheckContext, pod: &PodTemplate) -> Result<String, CheckError> {
        self.run_with(ctx, pod, Ok).await
    }

    /// Runs the Pod and checks its `;`-separated output contains `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::PermissionMismatch`] listing absent permissions,
    /// or any error of [`EphemeralExecutor::run`].
    pub async fn check_permissions(
        &self,
        ctx: &CheckContext,
        pod: &PodTemplate,
        expected: &PermissionSet,
    ) -> Result<PermissionSet, CheckError> {
        self.run_with(ctx, pod, |line| {
            let observed = PermissionSet::from_delimited(&line, PERMISSION_DELIMITER);
            let missing = expected.missing_from(&observed);
            if missing.is_empty() {
                Ok(observed)
            } else {
                Err(CheckError::PermissionMismatch(Mismatch::MissingPermissions(missing)))
            }
        })
        .await
    }

    /// Executes the Pod, consumes its line, then removes the Pod.
    ///
    /// The consumed outcome is settled before removal so a removal failure
    /// attaches to it instead of masking it.
    async fn run_with<T, F>(&self, ctx: &CheckContext, pod: &PodTemplate, consume: F) -> Result<T, CheckError>
    where
        F: FnOnce(String) -> Result<T, CheckError> + Send,
    {
        let outcome = match self.execute(ctx, pod).await {
            Err(CheckError::Cancelled) => return Err(CheckError::Cancelled),
            outcome => outcome.and_then(consume),
        };
        let cleanup = self.remove(&pod.resource()).await;
        CheckError::settle(outcome, cleanup)
    }

    /// Launches, awaits and reads the Pod.
    async fn execute(&self, ctx: &CheckContext, pod: &PodTemplate) -> Result<String, CheckError> {
        self.remove_stale(ctx, pod).await?;
        ctx.run("creating pod", self.cluster.create(&ClusterObject::Pod(pod.clone()))).await??;
        self.audit.record_resource(&ResourceAuditEvent::new(
            ResourceAction::Created,
            "Pod",
            Some(&pod.namespace),
            &pod.name,
        ));

        let (phase, polls) = self.await_terminal(ctx, pod).await?;
        self.audit.record_pod(&PodAuditEvent::terminated(
            &pod.namespace,
            &pod.name,
            phase.as_str(),
            phase == PodPhase::Succeeded,
            polls,
        ));

        let logs = ctx.run("reading pod logs", self.cluster.pod_logs(&pod.namespace, &pod.name)).await??;
        let line = single_line(&logs)?;
        if phase == PodPhase::Succeeded {
            Ok(line)
        } else {
            Err(CheckError::JobFailed(line))
        }
    }

    /// Deletes a Pod left behind under the reserved name and waits for it to go.
    async fn remove_stale(&self, ctx: &CheckContext, pod: &PodTemplate) -> Result<(), CheckError> {
        let resource = pod.resource();
        if !ctx.run("checking for a stale pod", self.cluster.exists(&resource)).await?? {
            return Ok(());
        }
        match ctx.run("deleting a stale pod", self.cluster.delete(&resource)).await? {
            Ok(()) | Err(ClusterError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.audit.record_resource(&ResourceAuditEvent::new(
            ResourceAction::Deleted,
            "Pod",
            Some(&pod.namespace),
            &pod.name,
        ));
        let deadline = Instant::now() + self.timing.removal_timeout;
        loop {
            ctx.sleep("waiting for stale pod removal", self.timing.poll_interval).await?;
            if !ctx.run("checking for a stale pod", self.cluster.exists(&resource)).await?? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CheckError::DeadlineExceeded(format!("waiting for stale {resource} to be removed")));
            }
        }
    }

    /// Polls the Pod phase until terminal; returns the phase and poll count.
    async fn await_terminal(&self, ctx: &CheckContext, pod: &PodTemplate) -> Result<(PodPhase, u32), CheckError> {
        let deadline = Instant::now() + self.timing.job_timeout;
        let mut polls: u32 = 0;
        loop {
            let phase = ctx.run("polling pod phase", self.cluster.pod_phase(&pod.namespace, &pod.name)).await??;
            polls = polls.saturating_add(1);
            if phase.is_terminal() {
                return Ok((phase, polls));
            }
            if Instant::now() >= deadline {
                return Err(CheckError::DeadlineExceeded(format!(
                    "waiting for pod {}/{} to terminate (last phase {})",
                    pod.namespace,
                    pod.name,
                    phase.as_str()
                )));
            }
            ctx.sleep("polling pod phase", self.timing.poll_interval).await?;
        }
    }

    /// Deletes the Pod; absence counts as success.
    async fn remove(&self, resource: &ResourceRef) -> Result<(), CleanupError> {
        let namespace = resource.namespace.as_deref();
        match delete_within(self.cluster.as_ref(), resource, self.timing.removal_timeout).await {
            Ok(()) => {
                self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Deleted,
                    "Pod",
                    namespace,
                    &resource.name,
                ));
                Ok(())
            }
            Err(ClusterError::NotFound(_)) => {
                self.audit.record_resource(&ResourceAuditEvent::new(
                    ResourceAction::Absent,
                    "Pod",
                    namespace,
                    &resource.name,
                ));
                Ok(())
            }
            Err(err) => {
                self.audit.record_resource(
                    &ResourceAuditEvent::new(ResourceAction::DeleteFailed, "Pod", namespace, &resource.name)
                        .with_error(err.to_string()),
                );
                Err(CleanupError {
                    failures: vec![CleanupFailure {
                        resource: resource.to_string(),
                        reason: err.to_string(),
                    }],
                })
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the single non-blank line of a checker log.
///
/// # Errors
///
/// Returns [`CheckError::Protocol`] when there is no line or more than one.
pub fn single_line(logs: &str) -> Result<String, CheckError> {
    let mut lines = logs.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().ok_or_else(|| CheckError::Protocol("no log line".to_string()))?;
    if lines.next().is_some() {
        return Err(CheckError::Protocol("got more than 1 log line".to_string()));
    }
    Ok(first.to_string())
}
