//! Mock cluster API for testing.
//!
//! Allows queueing responses per endpoint and capturing submitted configs
//! and cancel requests for verification.

use super::{ApiError, ClusterApi};
use async_trait::async_trait;
use cloudfuzz_types::{
    CloudStatus, DestinationKey, JobConfig, NodeAddr, ProgressResponse, SubmitResponse,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock cluster API for testing.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another. With nothing queued:
/// - `cloud_status` repeats the last status it served (or fails to connect),
/// - `submit` accepts with a key `<kind>_<n>`,
/// - `progress` returns the default progress (`Done` unless changed),
/// - `fetch_result` returns `{"destination_key": key}`.
#[derive(Debug, Default)]
pub struct MockClusterApi {
    inner: Arc<Mutex<MockClusterApiInner>>,
}

#[derive(Debug, Default)]
struct MockClusterApiInner {
    status_queue: VecDeque<Result<CloudStatus, ApiError>>,
    last_status: Option<CloudStatus>,
    submit_queue: VecDeque<Result<SubmitResponse, ApiError>>,
    progress_queue: VecDeque<Result<ProgressResponse, ApiError>>,
    default_progress: Option<ProgressResponse>,
    result_queue: VecDeque<Result<serde_json::Value, ApiError>>,
    fail_next_cancel: Option<ApiError>,
    submitted: Vec<(NodeAddr, JobConfig)>,
    cancelled: Vec<DestinationKey>,
    status_calls: u32,
    progress_calls: u32,
    next_key: u32,
}

impl MockClusterApi {
    /// Create a new mock API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status for the next `cloud_status()` call.
    pub fn queue_cloud_status(&self, status: CloudStatus) {
        let mut inner = self.inner.lock().unwrap();
        inner.status_queue.push_back(Ok(status));
    }

    /// Cause the next queued `cloud_status()` call to fail.
    pub fn fail_next_cloud_status(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.status_queue.push_back(Err(error));
    }

    /// Queue a response for the next `submit()` call.
    pub fn queue_submit(&self, response: Result<SubmitResponse, ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner.submit_queue.push_back(response);
    }

    /// Queue a response for the next `progress()` call.
    pub fn queue_progress(&self, response: Result<ProgressResponse, ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner.progress_queue.push_back(response);
    }

    /// Progress returned once the queue is drained.
    pub fn set_default_progress(&self, response: ProgressResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.default_progress = Some(response);
    }

    /// Queue a response for the next `fetch_result()` call.
    pub fn queue_result(&self, response: Result<serde_json::Value, ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner.result_queue.push_back(response);
    }

    /// Cause the next `cancel()` call to fail.
    pub fn fail_next_cancel(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_cancel = Some(error);
    }

    /// Configs submitted so far, with the node each was sent to.
    pub fn submitted(&self) -> Vec<(NodeAddr, JobConfig)> {
        let inner = self.inner.lock().unwrap();
        inner.submitted.clone()
    }

    /// Keys cancel was requested for.
    pub fn cancelled(&self) -> Vec<DestinationKey> {
        let inner = self.inner.lock().unwrap();
        inner.cancelled.clone()
    }

    /// Number of `cloud_status()` calls.
    pub fn status_calls(&self) -> u32 {
        self.inner.lock().unwrap().status_calls
    }

    /// Number of `progress()` calls.
    pub fn progress_calls(&self) -> u32 {
        self.inner.lock().unwrap().progress_calls
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockClusterApiInner::default();
    }
}

impl Clone for MockClusterApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn cloud_status(&self, _node: &NodeAddr) -> Result<CloudStatus, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_calls += 1;

        match inner.status_queue.pop_front() {
            Some(Ok(status)) => {
                inner.last_status = Some(status.clone());
                Ok(status)
            }
            Some(Err(e)) => Err(e),
            None => inner
                .last_status
                .clone()
                .ok_or_else(|| ApiError::ConnectionFailed("connection refused".into())),
        }
    }

    async fn submit(
        &self,
        node: &NodeAddr,
        config: &JobConfig,
    ) -> Result<SubmitResponse, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.submitted.push((node.clone(), config.clone()));

        if let Some(response) = inner.submit_queue.pop_front() {
            return response;
        }
        inner.next_key += 1;
        let key = format!("{}_{}", config.kind(), inner.next_key);
        Ok(SubmitResponse::accepted(DestinationKey::new(key)))
    }

    async fn progress(
        &self,
        _node: &NodeAddr,
        _key: &DestinationKey,
    ) -> Result<ProgressResponse, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.progress_calls += 1;

        match inner.progress_queue.pop_front() {
            Some(response) => response,
            None => Ok(inner
                .default_progress
                .clone()
                .unwrap_or_else(ProgressResponse::done)),
        }
    }

    async fn fetch_result(
        &self,
        _node: &NodeAddr,
        key: &DestinationKey,
    ) -> Result<serde_json::Value, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .result_queue
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({ "destination_key": key.as_str() })))
    }

    async fn cancel(&self, _node: &NodeAddr, key: &DestinationKey) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.cancelled.push(key.clone());

        if let Some(error) = inner.fail_next_cancel.take() {
            return Err(error);
        }
        Ok(())
    }
}
