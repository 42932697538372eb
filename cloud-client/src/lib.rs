//! # cloudfuzz-client
//!
//! Async orchestration for cloudfuzz.
//!
//! This is the I/O half of the harness: it provisions worker processes over
//! ssh, waits for them to form a cloud, and drives jobs through the cluster's
//! REST endpoints.
//!
//! ## Features
//!
//! - **Remote Hosts**: artifact upload, worker launch and teardown over ssh
//! - **Cloud Stabilization**: poll the leader until the cloud has the expected size
//! - **Job Dispatch**: submit/poll/retry/timeout, driven by the pure state
//!   machine in cloudfuzz-core
//! - **Trial Runs**: fuzzed or fixed plans, sequential or with bounded parallelism
//! - **API Abstraction**: pluggable cluster API and remote channel (real, mock)
//!
//! ## Example
//!
//! ```ignore
//! use cloudfuzz_client::{ClusterStabilizer, HttpClusterApi, JobDispatcher, TrialPlan, TrialRunner};
//!
//! let api = HttpClusterApi::default();
//! let cluster = ClusterStabilizer::new(api.clone())
//!     .stabilize(&leader, 4, Duration::from_secs(60))
//!     .await?;
//!
//! let runner = TrialRunner::new(JobDispatcher::new(api, DispatchPolicy::default()), job_timeout);
//! let report = runner.run(&cluster, TrialPlan::fuzz(fuzzer, 100)).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod dispatcher;
pub mod host;
pub mod provision;
pub mod remote;
pub mod runner;
pub mod sandbox;
pub mod stabilizer;

pub use api::{ApiError, ClusterApi, HttpClusterApi, MockClusterApi};
pub use dispatcher::JobDispatcher;
pub use host::{HostSpec, LaunchError, RemoteHost, TransferError};
pub use provision::{expected_size, leader_of, provision, teardown_all, ProvisionError};
pub use remote::{ExecOutput, MockRemote, RemoteError, RemoteExec, SshExec};
pub use runner::{RunReport, TrialPlan, TrialRunner};
pub use sandbox::{check_sandbox, SandboxReport};
pub use stabilizer::{ClusterStabilizer, StabilizationError, DEFAULT_POLL_INTERVAL};

use std::time::Duration;
use tokio::time::Instant;

/// Roughly thirty years; stands in for "no deadline".
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + timeout`, clamped so oversized timeouts cannot overflow `Instant`.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now)
}
