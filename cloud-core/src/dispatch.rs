//! Job dispatch state machine.
//!
//! This module provides a pure, side-effect-free state machine for one job's
//! lifecycle: `Submitting → Polling → Fetching → {Succeeded, Failed, TimedOut}`.
//! It takes events as input and produces a new state plus a list of actions
//! to execute.
//!
//! The actual I/O (HTTP submit, poll, fetch, cancel) is performed by
//! cloudfuzz-client, not by this module.

use std::time::Duration;

use cloudfuzz_types::{DestinationKey, FailureKind};

use crate::RetryPolicy;

/// Timing and retry parameters for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Delay between status polls while the job is running.
    pub poll_interval: Duration,
    /// Retry budget for transient poll/fetch errors.
    pub retry: RetryPolicy,
}

impl DispatchPolicy {
    /// Create a policy whose backoff starts at the poll interval.
    pub fn new(poll_interval: Duration, max_retries: u32) -> Self {
        Self {
            poll_interval,
            retry: RetryPolicy::new(max_retries, poll_interval),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 3)
    }
}

/// Dispatch state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Submission request in flight.
    Submitting,
    /// Job accepted; polling its status.
    Polling {
        /// Key issued at submission.
        key: DestinationKey,
        /// Consecutive transient errors since the last good response.
        consecutive: u32,
        /// Total transient errors retried.
        retries: u32,
    },
    /// Job done; fetching the result payload.
    Fetching {
        /// Key issued at submission.
        key: DestinationKey,
        /// Consecutive transient errors since the last good response.
        consecutive: u32,
        /// Total transient errors retried.
        retries: u32,
    },
    /// Result fetched.
    Succeeded {
        /// Key issued at submission.
        key: DestinationKey,
        /// Total transient errors retried.
        retries: u32,
    },
    /// Job failed (transient budget exhausted, or rejected by the cluster).
    Failed {
        /// `Transient` or `Fatal`.
        kind: FailureKind,
        /// Failure detail.
        detail: String,
        /// Key, if one was issued.
        key: Option<DestinationKey>,
        /// Total transient errors retried.
        retries: u32,
    },
    /// Time budget ran out before a terminal state.
    TimedOut {
        /// Key, if one was issued.
        key: Option<DestinationKey>,
        /// Total transient errors retried.
        retries: u32,
    },
}

impl JobState {
    /// Create a new state machine for a job about to be submitted.
    pub fn new() -> Self {
        Self::Submitting
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller
    /// (cloudfuzz-client) is responsible for executing the returned actions.
    pub fn on_event(self, event: DispatchEvent, policy: &DispatchPolicy) -> (Self, Vec<DispatchAction>) {
        match (self, event) {
            // From Submitting
            (Self::Submitting, DispatchEvent::Accepted { key }) => (
                Self::Polling {
                    key,
                    consecutive: 0,
                    retries: 0,
                },
                vec![DispatchAction::Poll {
                    after: policy.poll_interval,
                }],
            ),
            (Self::Submitting, DispatchEvent::ClusterError { error }) => (
                Self::Failed {
                    kind: FailureKind::Fatal,
                    detail: format!("submission rejected: {error}"),
                    key: None,
                    retries: 0,
                },
                vec![DispatchAction::Finish],
            ),
            // Submission is not idempotent; a lost request is not resent.
            (Self::Submitting, DispatchEvent::Transient { error }) => (
                Self::Failed {
                    kind: FailureKind::Transient,
                    detail: format!("submission failed: {error}"),
                    key: None,
                    retries: 0,
                },
                vec![DispatchAction::Finish],
            ),
            (Self::Submitting, DispatchEvent::DeadlineElapsed) => (
                Self::TimedOut {
                    key: None,
                    retries: 0,
                },
                vec![DispatchAction::Finish],
            ),

            // From Polling
            (Self::Polling { key, retries, .. }, DispatchEvent::Running) => (
                Self::Polling {
                    key,
                    consecutive: 0,
                    retries,
                },
                vec![DispatchAction::Poll {
                    after: policy.poll_interval,
                }],
            ),
            (Self::Polling { key, retries, .. }, DispatchEvent::Done) => (
                Self::Fetching {
                    key,
                    consecutive: 0,
                    retries,
                },
                vec![DispatchAction::Fetch {
                    after: Duration::ZERO,
                }],
            ),
            (
                Self::Polling {
                    key,
                    consecutive,
                    retries,
                },
                DispatchEvent::Transient { error },
            ) => match retry_or_escalate(key, consecutive, retries, error, policy) {
                Ok((key, consecutive, retries, after)) => (
                    Self::Polling {
                        key,
                        consecutive,
                        retries,
                    },
                    vec![DispatchAction::Poll { after }],
                ),
                Err(failed) => (failed, vec![DispatchAction::Finish]),
            },

            // From Fetching
            (Self::Fetching { key, retries, .. }, DispatchEvent::Fetched) => (
                Self::Succeeded { key, retries },
                vec![DispatchAction::Finish],
            ),
            (
                Self::Fetching {
                    key,
                    consecutive,
                    retries,
                },
                DispatchEvent::Transient { error },
            ) => match retry_or_escalate(key, consecutive, retries, error, policy) {
                Ok((key, consecutive, retries, after)) => (
                    Self::Fetching {
                        key,
                        consecutive,
                        retries,
                    },
                    vec![DispatchAction::Fetch { after }],
                ),
                Err(failed) => (failed, vec![DispatchAction::Finish]),
            },

            // Shared by Polling and Fetching: an explicit cluster-side error
            // means the job itself is invalid; it is never retried.
            (
                Self::Polling { key, retries, .. } | Self::Fetching { key, retries, .. },
                DispatchEvent::ClusterError { error },
            ) => (
                Self::Failed {
                    kind: FailureKind::Fatal,
                    detail: error,
                    key: Some(key),
                    retries,
                },
                vec![DispatchAction::Finish],
            ),
            (
                Self::Polling { key, retries, .. } | Self::Fetching { key, retries, .. },
                DispatchEvent::DeadlineElapsed,
            ) => (
                Self::TimedOut {
                    key: Some(key.clone()),
                    retries,
                },
                vec![DispatchAction::Cancel { key }, DispatchAction::Finish],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::TimedOut { .. }
        )
    }

    /// Destination key, once issued.
    pub fn key(&self) -> Option<&DestinationKey> {
        match self {
            Self::Submitting => None,
            Self::Polling { key, .. } | Self::Fetching { key, .. } | Self::Succeeded { key, .. } => {
                Some(key)
            }
            Self::Failed { key, .. } | Self::TimedOut { key, .. } => key.as_ref(),
        }
    }

    /// Total transient errors retried so far.
    pub fn retries(&self) -> u32 {
        match self {
            Self::Submitting => 0,
            Self::Polling { retries, .. }
            | Self::Fetching { retries, .. }
            | Self::Succeeded { retries, .. }
            | Self::Failed { retries, .. }
            | Self::TimedOut { retries, .. } => *retries,
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

type RetryStep = (DestinationKey, u32, u32, Duration);

/// Absorb one transient error, or escalate once the budget is spent.
fn retry_or_escalate(
    key: DestinationKey,
    consecutive: u32,
    retries: u32,
    error: String,
    policy: &DispatchPolicy,
) -> Result<RetryStep, JobState> {
    if policy.retry.allows(consecutive) {
        let attempt = consecutive + 1;
        Ok((key, attempt, retries + 1, policy.retry.delay_for(attempt)))
    } else {
        Err(JobState::Failed {
            kind: FailureKind::Transient,
            detail: format!("gave up after {retries} retries: {error}"),
            key: Some(key),
            retries,
        })
    }
}

/// Events observed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Submission accepted with a destination key.
    Accepted {
        /// Key issued by the cluster.
        key: DestinationKey,
    },
    /// Status poll says the job is still running.
    Running,
    /// Status poll says the job is done.
    Done,
    /// Result payload fetched.
    Fetched,
    /// Connectivity-level failure (connection reset, malformed response).
    Transient {
        /// Error message describing the failure.
        error: String,
    },
    /// The cluster explicitly reported an error for this job.
    ClusterError {
        /// Error text from the cluster.
        error: String,
    },
    /// The job's time budget ran out.
    DeadlineElapsed,
}

/// Actions to be executed by the dispatcher.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Query the job status after a delay.
    Poll {
        /// Delay before the query.
        after: Duration,
    },
    /// Fetch the result payload after a delay.
    Fetch {
        /// Delay before the fetch.
        after: Duration,
    },
    /// Ask the cluster to stop the job (best-effort).
    Cancel {
        /// Job to cancel.
        key: DestinationKey,
    },
    /// Stop driving the state machine.
    Finish,
}
