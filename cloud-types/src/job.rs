//! Dispatch outcomes: completed job results and classified failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::{DestinationKey, JobConfig, JobKind};

/// Terminal status of a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// Cluster reported the job done and the result was fetched.
    Succeeded,
    /// Cluster rejected the job or polling failed.
    Failed,
    /// The job's time budget ran out while polling.
    TimedOut,
}

/// A completed job, ready for validation.
///
/// Carries the originating config and the raw payload so a validator never
/// needs to re-query the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Job kind.
    pub kind: JobKind,
    /// Key issued at submission, naming the result on the cluster.
    pub destination_key: DestinationKey,
    /// Config the job was submitted with.
    pub config: JobConfig,
    /// Wall time from submission to terminal status.
    pub elapsed: Duration,
    /// Raw result payload returned by the cluster.
    pub payload: serde_json::Value,
    /// Completion status (always `Succeeded` when produced by the dispatcher).
    pub status: CompletionStatus,
    /// Transient poll errors retried along the way.
    pub retries: u32,
}

/// Classification of a job-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Connectivity failures outlasted the retry budget.
    Transient,
    /// The cluster rejected the job or reported an error for it.
    Fatal,
    /// The job exceeded its time budget.
    Timeout,
    /// The job completed but its result did not pass validation.
    ValidationFailed,
}

impl FailureKind {
    /// Completion status implied by this failure.
    pub fn status(&self) -> CompletionStatus {
        match self {
            Self::Timeout => CompletionStatus::TimedOut,
            _ => CompletionStatus::Failed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::Timeout => "timeout",
            Self::ValidationFailed => "validation failed",
        };
        f.write_str(s)
    }
}

/// A classified job failure with full reproduction context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Classification.
    pub kind: FailureKind,
    /// Config that failed (carries kind, seed and trial index).
    pub config: JobConfig,
    /// Human-readable detail.
    pub detail: String,
    /// Transient poll errors retried before the failure was classified.
    pub retries: u32,
    /// Destination key, if the cluster issued one before failing.
    pub destination_key: Option<DestinationKey>,
}

impl FailureRecord {
    /// Create a failure record with no retries and no destination key.
    pub fn new(kind: FailureKind, config: JobConfig, detail: impl Into<String>) -> Self {
        Self {
            kind,
            config,
            detail: detail.into(),
            retries: 0,
            destination_key: None,
        }
    }

    /// Record the destination key the failure happened under.
    pub fn with_key(mut self, key: Option<DestinationKey>) -> Self {
        self.destination_key = key;
        self
    }

    /// Record the number of retries consumed.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Turn a completed result that failed validation into a failure record.
    pub fn validation(result: &JobResult, reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ValidationFailed,
            config: result.config.clone(),
            detail: reason.into(),
            retries: result.retries,
            destination_key: Some(result.destination_key.clone()),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.config, self.detail)?;
        if let Some(key) = &self.destination_key {
            write!(f, " (key {key})")?;
        }
        Ok(())
    }
}

/// Outcome of dispatching one job. Callers distinguish success from failure
/// by type, never by payload shape.
pub type DispatchOutcome = Result<JobResult, FailureRecord>;
