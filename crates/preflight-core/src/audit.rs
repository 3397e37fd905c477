// crates/preflight-core/src/audit.rs
// ============================================================================
// Module: Preflight Audit Logging
// Description: Structured audit events for stages and cluster side effects.
// Purpose: Emit JSON-line logs suitable for external correlation.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every stage outcome and every cluster-side mutation (Pod and RBAC object
//! creation/deletion) is recorded as a JSON line with a stable `event` name
//! and `level`. Sinks are pluggable so deployments can route events to
//! their preferred pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::error::CheckError;
use crate::error::ErrorClass;
use crate::error::StageId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Stable log level attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Normal progress.
    Info,
    /// Degraded but continuing.
    Warn,
    /// Failure.
    Error,
}

/// Stage outcome event.
#[derive(Debug, Clone, Serialize)]
pub struct StageAuditEvent {
    /// Event identifier (`stage_completed` or `stage_failed`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Log level.
    pub level: AuditLevel,
    /// Pipeline name.
    pub pipeline: String,
    /// Stage identifier.
    pub stage: StageId,
    /// Stage wall time in milliseconds.
    pub elapsed_ms: u128,
    /// Failure class when the stage failed.
    pub error_class: Option<ErrorClass>,
    /// Failure message when the stage failed.
    pub error: Option<String>,
}

impl StageAuditEvent {
    /// Builds a `stage_completed` event.
    #[must_use]
    pub fn completed(pipeline: &str, stage: StageId, elapsed_ms: u128) -> Self {
        Self {
            event: "stage_completed",
            timestamp_ms: now_ms(),
            level: AuditLevel::Info,
            pipeline: pipeline.to_string(),
            stage,
            elapsed_ms,
            error_class: None,
            error: None,
        }
    }

    /// Builds a `stage_failed` event.
    #[must_use]
    pub fn failed(pipeline: &str, stage: StageId, elapsed_ms: u128, error: &CheckError) -> Self {
        Self {
            event: "stage_failed",
            timestamp_ms: now_ms(),
            level: AuditLevel::Error,
            pipeline: pipeline.to_string(),
            stage,
            elapsed_ms,
            error_class: Some(error.class()),
            error: Some(error.to_string()),
        }
    }
}

/// Cluster mutation recorded by a resource event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    /// Object created.
    Created,
    /// Object already existed and was adopted.
    Adopted,
    /// Object deleted.
    Deleted,
    /// Object was already absent at deletion.
    Absent,
    /// Deletion failed.
    DeleteFailed,
}

impl ResourceAction {
    /// Returns the event name for this action.
    #[must_use]
    pub const fn event(self) -> &'static str {
        match self {
            Self::Created => "resource_created",
            Self::Adopted => "resource_adopted",
            Self::Deleted => "resource_deleted",
            Self::Absent => "resource_absent",
            Self::DeleteFailed => "resource_delete_failed",
        }
    }

    /// Returns the level for this action.
    #[must_use]
    pub const fn level(self) -> AuditLevel {
        match self {
            Self::Created | Self::Deleted | Self::Absent => AuditLevel::Info,
            Self::Adopted => AuditLevel::Warn,
            Self::DeleteFailed => AuditLevel::Error,
        }
    }
}

/// Cluster object mutation event.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Log level.
    pub level: AuditLevel,
    /// Object kind (`Pod`, `Role`, ...).
    pub kind: &'static str,
    /// Object namespace for namespaced kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
    /// Failure detail for `resource_delete_failed`.
    pub error: Option<String>,
}

impl ResourceAuditEvent {
    /// Builds a resource event.
    #[must_use]
    pub fn new(action: ResourceAction, kind: &'static str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            event: action.event(),
            timestamp_ms: now_ms(),
            level: action.level(),
            kind,
            namespace: namespace.map(ToString::to_string),
            name: name.to_string(),
            error: None,
        }
    }

    /// Attaches a failure detail.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Ephemeral Pod terminal-phase event.
#[derive(Debug, Clone, Serialize)]
pub struct PodAuditEvent {
    /// Event identifier (`pod_terminated`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Log level.
    pub level: AuditLevel,
    /// Pod namespace.
    pub namespace: String,
    /// Pod name.
    pub name: String,
    /// Terminal phase label.
    pub phase: &'static str,
    /// Number of status polls performed.
    pub polls: u32,
}

impl PodAuditEvent {
    /// Builds a `pod_terminated` event.
    #[must_use]
    pub fn terminated(namespace: &str, name: &str, phase: &'static str, succeeded: bool, polls: u32) -> Self {
        Self {
            event: "pod_terminated",
            timestamp_ms: now_ms(),
            level: if succeeded { AuditLevel::Info } else { AuditLevel::Warn },
            namespace: namespace.to_string(),
            name: name.to_string(),
            phase,
            polls,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for preflight events.
pub trait AuditSink: Send + Sync {
    /// Record a stage outcome.
    fn record_stage(&self, event: &StageAuditEvent);

    /// Record a cluster object mutation.
    fn record_resource(&self, _event: &ResourceAuditEvent) {}

    /// Record an ephemeral Pod outcome.
    fn record_pod(&self, _event: &PodAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_stage(&self, event: &StageAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_resource(&self, event: &ResourceAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_pod(&self, event: &PodAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_stage(&self, event: &StageAuditEvent) {
        self.append(event);
    }

    fn record_resource(&self, event: &ResourceAuditEvent) {
        self.append(event);
    }

    fn record_pod(&self, event: &PodAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_stage(&self, _event: &StageAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured events as JSON values.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Builds an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the `event` names in capture order.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.get("event").and_then(Value::as_str).map(ToString::to_string))
            .collect()
    }

    /// Captures one serialized event.
    fn capture<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_stage(&self, event: &StageAuditEvent) {
        self.capture(event);
    }

    fn record_resource(&self, event: &ResourceAuditEvent) {
        self.capture(event);
    }

    fn record_pod(&self, event: &PodAuditEvent) {
        self.capture(event);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes one event as a JSON line, ignoring I/O failures.
fn write_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
