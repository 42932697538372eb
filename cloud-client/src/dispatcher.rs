//! JobDispatcher - submits one job and drives it to a terminal state.
//!
//! # Architecture
//!
//! The dispatcher uses the pure state machine from cloudfuzz-core for the
//! submit/poll/retry/timeout logic and interprets its actions to perform the
//! actual I/O through a [`ClusterApi`].
//!
//! ```text
//! TrialRunner → JobDispatcher → ClusterApi → leader node
//!                    ↓
//!           cloudfuzz-core (JobState)
//! ```

use std::time::Duration;

use cloudfuzz_core::{DispatchAction, DispatchEvent, DispatchPolicy, JobState};
use cloudfuzz_types::{
    Cluster, CompletionStatus, DestinationKey, DispatchOutcome, FailureKind, FailureRecord,
    JobConfig, JobResult, NodeAddr, RemoteJobState,
};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::api::{ApiError, ClusterApi};
use crate::deadline_after;

/// How long a best-effort cancel may take after a timeout.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

/// Submits jobs to a cluster's leader and polls them to completion.
#[derive(Debug, Clone)]
pub struct JobDispatcher<A: ClusterApi> {
    api: A,
    policy: DispatchPolicy,
}

impl<A: ClusterApi> JobDispatcher<A> {
    /// Dispatcher with the given poll/retry policy.
    pub fn new(api: A, policy: DispatchPolicy) -> Self {
        Self { api, policy }
    }

    /// The poll/retry policy in force.
    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Submit `config` to the cluster's leader and wait for a terminal state.
    ///
    /// Never returns a Rust error: every failure is classified into a
    /// [`FailureRecord`] carrying the config that produced it.
    pub async fn submit(
        &self,
        cluster: &Cluster,
        config: &JobConfig,
        timeout: Duration,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let deadline = deadline_after(timeout);
        let leader = cluster.leader();

        debug!(job = %config, leader = %leader, "Submitting job");
        let first = match time::timeout_at(deadline, self.api.submit(leader, config)).await {
            Err(_) => DispatchEvent::DeadlineElapsed,
            Ok(Ok(response)) => match response.into_result() {
                Ok(key) => DispatchEvent::Accepted { key },
                Err(error) => DispatchEvent::ClusterError { error },
            },
            Ok(Err(e)) => classify(e),
        };

        let (mut state, mut actions) = JobState::new().on_event(first, &self.policy);
        let mut payload = serde_json::Value::Null;

        loop {
            let mut next = None;
            for action in actions {
                match action {
                    DispatchAction::Poll { after } => {
                        if let Some(key) = state.key() {
                            next = Some(self.poll(leader, key, after, deadline).await);
                        }
                    }
                    DispatchAction::Fetch { after } => {
                        if let Some(key) = state.key() {
                            let (event, fetched) = self.fetch(leader, key, after, deadline).await;
                            if let Some(value) = fetched {
                                payload = value;
                            }
                            next = Some(event);
                        }
                    }
                    DispatchAction::Cancel { key } => self.cancel(leader, &key).await,
                    DispatchAction::Finish => {}
                }
            }
            match next {
                Some(event) => {
                    let (new_state, new_actions) = state.on_event(event, &self.policy);
                    state = new_state;
                    actions = new_actions;
                }
                None => break,
            }
        }

        let elapsed = started.elapsed();
        let outcome = match state {
            JobState::Succeeded { key, retries } => Ok(JobResult {
                kind: config.kind().clone(),
                destination_key: key,
                config: config.clone(),
                elapsed,
                payload,
                status: CompletionStatus::Succeeded,
                retries,
            }),
            JobState::Failed {
                kind,
                detail,
                key,
                retries,
            } => Err(FailureRecord::new(kind, config.clone(), detail)
                .with_key(key)
                .with_retries(retries)),
            JobState::TimedOut { key, retries } => Err(FailureRecord::new(
                FailureKind::Timeout,
                config.clone(),
                format!("no terminal status within {timeout:?}"),
            )
            .with_key(key)
            .with_retries(retries)),
            other => Err(FailureRecord::new(
                FailureKind::Fatal,
                config.clone(),
                format!("dispatch stopped in non-terminal state {other:?}"),
            )
            .with_key(other.key().cloned())
            .with_retries(other.retries())),
        };

        match &outcome {
            Ok(result) => info!(
                job = %config,
                key = %result.destination_key,
                elapsed_ms = elapsed.as_millis() as u64,
                retries = result.retries,
                "Job succeeded"
            ),
            Err(failure) => warn!(%failure, "Job failed"),
        }
        outcome
    }

    /// Wait `after`, then query the job's status.
    async fn poll(
        &self,
        leader: &NodeAddr,
        key: &DestinationKey,
        after: Duration,
        deadline: Instant,
    ) -> DispatchEvent {
        if !wait(after, deadline).await {
            return DispatchEvent::DeadlineElapsed;
        }
        match time::timeout_at(deadline, self.api.progress(leader, key)).await {
            Err(_) => DispatchEvent::DeadlineElapsed,
            Ok(Ok(progress)) => match progress.status {
                RemoteJobState::Running => {
                    debug!(%key, progress = ?progress.progress, "Job running");
                    DispatchEvent::Running
                }
                RemoteJobState::Done => DispatchEvent::Done,
                RemoteJobState::Error => DispatchEvent::ClusterError {
                    error: progress
                        .error
                        .unwrap_or_else(|| "cluster reported an error without detail".into()),
                },
            },
            Ok(Err(e)) => {
                debug!(%key, error = %e, "Status poll failed");
                classify(e)
            }
        }
    }

    /// Wait `after`, then fetch the job's result payload.
    async fn fetch(
        &self,
        leader: &NodeAddr,
        key: &DestinationKey,
        after: Duration,
        deadline: Instant,
    ) -> (DispatchEvent, Option<serde_json::Value>) {
        if !wait(after, deadline).await {
            return (DispatchEvent::DeadlineElapsed, None);
        }
        match time::timeout_at(deadline, self.api.fetch_result(leader, key)).await {
            Err(_) => (DispatchEvent::DeadlineElapsed, None),
            Ok(Ok(value)) => (DispatchEvent::Fetched, Some(value)),
            Ok(Err(e)) => {
                debug!(%key, error = %e, "Result fetch failed");
                (classify(e), None)
            }
        }
    }

    /// Ask the cluster to stop a timed-out job. Failures are only logged.
    async fn cancel(&self, leader: &NodeAddr, key: &DestinationKey) {
        match time::timeout(CANCEL_TIMEOUT, self.api.cancel(leader, key)).await {
            Ok(Ok(())) => debug!(%key, "Cancel requested"),
            Ok(Err(e)) => warn!(%key, error = %e, "Cancel failed"),
            Err(_) => warn!(%key, "Cancel timed out"),
        }
    }
}

/// Sleep `after` unless that would cross `deadline`; false if it would.
async fn wait(after: Duration, deadline: Instant) -> bool {
    if Instant::now().checked_add(after).map_or(true, |at| at >= deadline) {
        time::sleep_until(deadline).await;
        return false;
    }
    time::sleep(after).await;
    true
}

fn classify(error: ApiError) -> DispatchEvent {
    if error.is_transient() {
        DispatchEvent::Transient {
            error: error.to_string(),
        }
    } else {
        DispatchEvent::ClusterError {
            error: error.to_string(),
        }
    }
}
