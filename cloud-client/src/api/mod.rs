//! Cluster REST API abstraction.
//!
//! This module provides a pluggable client for the handful of node
//! endpoints the harness consumes (real HTTP, mock for testing).
//!
//! # Design
//!
//! Every call names the node it targets; the API holds no notion of a
//! "current" cloud:
//! - `cloud_status()` reads the leader's view of the cloud
//! - `submit()` posts a job config and returns the destination key
//! - `progress()` polls a job by destination key
//! - `fetch_result()` reads a finished job's payload
//! - `cancel()` asks the cluster to stop a job
//!
//! # Example
//!
//! ```ignore
//! let api = MockClusterApi::new();
//! api.queue_cloud_status(CloudStatus { cloud_name: None, cloud_size: 1, nodes: vec![leader.clone()] });
//! let status = api.cloud_status(&leader).await?;
//! ```

mod http;
mod mock;

pub use http::HttpClusterApi;
pub use mock::MockClusterApi;

use async_trait::async_trait;
use cloudfuzz_types::{
    CloudStatus, DestinationKey, JobConfig, NodeAddr, ProgressResponse, SubmitResponse,
};
use thiserror::Error;

/// Cluster API errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Could not reach the node.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Other HTTP-level failure.
    #[error("http error: {0}")]
    Http(String),

    /// Node answered with a non-success status code.
    #[error("http status {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body did not parse.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Whether the failure is about connectivity rather than the request
    /// itself. Transient errors on idempotent calls may be retried; a 4xx
    /// means the cluster understood and refused.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { code, .. } => *code >= 500,
            Self::ConnectionFailed(_) | Self::Timeout | Self::Http(_) | Self::Malformed(_) => true,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ApiError::ConnectionFailed(e.to_string())
        } else if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Malformed(e.to_string())
        } else {
            ApiError::Http(e.to_string())
        }
    }
}

/// Client for a cluster node's REST endpoints.
///
/// Implementations must be cheap to clone or share; the stabilizer and the
/// dispatcher each hold one.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// `GET /Cloud.json` on `node`.
    async fn cloud_status(&self, node: &NodeAddr) -> Result<CloudStatus, ApiError>;

    /// `POST /<kind>.json` with the config's parameters.
    ///
    /// Not idempotent: callers must not resend on failure.
    async fn submit(&self, node: &NodeAddr, config: &JobConfig)
        -> Result<SubmitResponse, ApiError>;

    /// `GET /Progress.json?destination_key=<key>`.
    async fn progress(
        &self,
        node: &NodeAddr,
        key: &DestinationKey,
    ) -> Result<ProgressResponse, ApiError>;

    /// `GET /Inspect.json?key=<key>`; the payload is kind-specific.
    async fn fetch_result(
        &self,
        node: &NodeAddr,
        key: &DestinationKey,
    ) -> Result<serde_json::Value, ApiError>;

    /// `POST /Cancel.json?key=<key>`. Best-effort on the cluster side.
    async fn cancel(&self, node: &NodeAddr, key: &DestinationKey) -> Result<(), ApiError>;
}
