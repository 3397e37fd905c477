// crates/preflight-core/src/context.rs
// ============================================================================
// Module: Check Context
// Description: Deadline and cancellation threaded through every stage.
// Purpose: Abort in-flight calls and poll loops on cancellation or timeout.
// Dependencies: tokio, tokio-util
// ============================================================================

//! ## Overview
//! One [`CheckContext`] accompanies a check end to end. Every suspending
//! operation runs through [`CheckContext::run`] or [`CheckContext::sleep`],
//! so cancellation aborts it immediately. Cluster objects already created
//! stay in place; cleanup is the caller's explicit path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CheckError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Deadline and cancellation shared by all stages of one check.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    /// Absolute deadline, if any.
    deadline: Option<Instant>,
    /// Cancellation signal.
    cancel: CancellationToken,
}

impl CheckContext {
    /// Builds a context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context that expires after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token with a caller-owned one.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the absolute deadline.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns a handle to the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signals cancellation to every holder of this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once cancellation was signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails when the context is cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Cancelled`] or [`CheckError::DeadlineExceeded`].
    pub fn ensure_active(&self, activity: &str) -> Result<(), CheckError> {
        if self.is_cancelled() {
            return Err(CheckError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(CheckError::DeadlineExceeded(activity.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Runs `future`, aborting it on cancellation or deadline.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Cancelled`] or [`CheckError::DeadlineExceeded`]
    /// when the future is abandoned.
    pub async fn run<F>(&self, activity: &str, future: F) -> Result<F::Output, CheckError>
    where
        F: Future,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, future)
                    .await
                    .map_err(|_| CheckError::DeadlineExceeded(activity.to_string())),
                None => Ok(future.await),
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CheckError::Cancelled),
            result = bounded => result,
        }
    }

    /// Sleeps for `duration`, waking early on cancellation or deadline.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Cancelled`] or [`CheckError::DeadlineExceeded`].
    pub async fn sleep(&self, activity: &str, duration: Duration) -> Result<(), CheckError> {
        self.run(activity, tokio::time::sleep(duration)).await
    }
}
