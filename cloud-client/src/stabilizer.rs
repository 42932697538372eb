//! Waiting for the cloud to form.
//!
//! Polls the leader's cloud-status endpoint until it reports exactly the
//! expected member count, or the timeout elapses. Any poll failure counts as
//! "not ready yet".

use std::time::Duration;

use cloudfuzz_core::StabilizationTracker;
use cloudfuzz_types::{Cluster, NodeAddr};
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::api::ClusterApi;
use crate::deadline_after;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The cloud did not reach its expected size in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cloud did not stabilize: leader reported {observed_count} of {expected_size} nodes")]
pub struct StabilizationError {
    /// Last member count the leader reported (0 if it never answered).
    pub observed_count: usize,
    /// Target member count.
    pub expected_size: usize,
}

/// Polls a leader until its cloud has the expected size.
#[derive(Debug, Clone)]
pub struct ClusterStabilizer<A: ClusterApi> {
    api: A,
    poll_interval: Duration,
}

impl<A: ClusterApi> ClusterStabilizer<A> {
    /// Stabilizer polling every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(api: A) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait until `leader` reports `expected_size` members.
    ///
    /// The returned cluster lists members as the leader reported them.
    pub async fn stabilize(
        &self,
        leader: &NodeAddr,
        expected_size: usize,
        timeout: Duration,
    ) -> Result<Cluster, StabilizationError> {
        let deadline = deadline_after(timeout);
        let mut tracker = StabilizationTracker::new(expected_size);

        info!(leader = %leader, expected_size, ?timeout, "Waiting for cloud to stabilize");

        loop {
            match time::timeout_at(deadline, self.api.cloud_status(leader)).await {
                Err(_) => break,
                Ok(Err(e)) => {
                    tracker.poll_failed();
                    debug!(leader = %leader, error = %e, "Cloud status not available yet");
                }
                Ok(Ok(status)) => {
                    let reached = tracker.observe(status.cloud_size);
                    debug!(leader = %leader, size = status.cloud_size, expected_size, "Polled cloud");
                    if reached && Instant::now() < deadline {
                        if let Some(cluster) =
                            Cluster::from_report(leader, status.nodes, expected_size, status.cloud_name)
                        {
                            info!(
                                leader = %cluster.leader(),
                                size = cluster.len(),
                                polls = tracker.polls(),
                                "Cloud stabilized"
                            );
                            return Ok(cluster);
                        }
                        debug!("Reported size matches but member list does not; still waiting");
                    }
                }
            }

            match Instant::now().checked_add(self.poll_interval) {
                Some(next) if next < deadline => time::sleep_until(next).await,
                _ => {
                    time::sleep_until(deadline).await;
                    break;
                }
            }
        }

        Err(StabilizationError {
            observed_count: tracker.last_observed_count(),
            expected_size,
        })
    }
}
