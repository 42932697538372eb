//! JSON shapes exchanged with a cluster node's REST endpoints.
//!
//! Only the endpoints the harness consumes are modelled: cloud status,
//! job submission, and job progress. Result payloads stay opaque JSON.

use serde::{Deserialize, Serialize};

use crate::{DestinationKey, NodeAddr};

/// Response of `GET /Cloud.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudStatus {
    /// Name the cloud was started with, if reported.
    #[serde(default)]
    pub cloud_name: Option<String>,
    /// Member count as the leader sees it.
    pub cloud_size: usize,
    /// Member addresses as the leader sees them.
    #[serde(default)]
    pub nodes: Vec<NodeAddr>,
}

/// Response of `POST /<JobKind>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Key the result will be stored under.
    #[serde(default)]
    pub destination_key: Option<DestinationKey>,
    /// Immediate rejection reason.
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitResponse {
    /// Accepted submission.
    pub fn accepted(key: DestinationKey) -> Self {
        Self {
            destination_key: Some(key),
            error: None,
        }
    }

    /// Rejected submission.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            destination_key: None,
            error: Some(error.into()),
        }
    }

    /// Collapse into the issued key or the rejection reason.
    ///
    /// An error field wins over a key; a response with neither is treated as
    /// a rejection.
    pub fn into_result(self) -> Result<DestinationKey, String> {
        match (self.error, self.destination_key) {
            (Some(err), _) => Err(err),
            (None, Some(key)) => Ok(key),
            (None, None) => Err("submission response carried no destination key".into()),
        }
    }
}

/// Job state reported by `GET /Progress.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteJobState {
    /// Still computing.
    Running,
    /// Finished; the result can be fetched.
    Done,
    /// The cluster gave up on the job.
    Error,
}

/// Response of `GET /Progress.json?destination_key=<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    /// Current state.
    pub status: RemoteJobState,
    /// Error text when `status` is `Error`.
    #[serde(default)]
    pub error: Option<String>,
    /// Fraction complete, if the job kind reports it.
    #[serde(default)]
    pub progress: Option<f64>,
}

impl ProgressResponse {
    /// A running job at the given progress.
    pub fn running(progress: f64) -> Self {
        Self {
            status: RemoteJobState::Running,
            error: None,
            progress: Some(progress),
        }
    }

    /// A finished job.
    pub fn done() -> Self {
        Self {
            status: RemoteJobState::Done,
            error: None,
            progress: Some(1.0),
        }
    }

    /// A job the cluster failed.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: RemoteJobState::Error,
            error: Some(error.into()),
            progress: None,
        }
    }
}
