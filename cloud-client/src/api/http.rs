//! reqwest-backed [`ClusterApi`].

use std::time::Duration;

use async_trait::async_trait;
use cloudfuzz_types::{
    CloudStatus, DestinationKey, JobConfig, NodeAddr, ProgressResponse, SubmitResponse,
};
use serde::de::DeserializeOwned;

use super::{ApiError, ClusterApi};

/// Per-request timeout used by [`HttpClusterApi::default`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a cluster node's JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpClusterApi {
    http: reqwest::Client,
}

impl HttpClusterApi {
    /// Create a client whose every request gives up after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Build the URL for an endpoint on `node`.
    pub fn endpoint_url(node: &NodeAddr, endpoint: &str) -> String {
        format!("{}/{}.json", node.base_url(), endpoint)
    }
}

impl Default for HttpClusterApi {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
            .unwrap_or_else(|_| Self::with_client(reqwest::Client::new()))
    }
}

/// Turn a response into `T`, mapping non-success statuses to [`ApiError::Status`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            code: status.as_u16(),
            body,
        });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Malformed(format!("{e}: {body}")))
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn cloud_status(&self, node: &NodeAddr) -> Result<CloudStatus, ApiError> {
        let url = Self::endpoint_url(node, "Cloud");
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }

    async fn submit(
        &self,
        node: &NodeAddr,
        config: &JobConfig,
    ) -> Result<SubmitResponse, ApiError> {
        let url = Self::endpoint_url(node, config.kind().as_str());
        let response = self
            .http
            .post(&url)
            .json(&config.to_wire_params())
            .send()
            .await?;

        // A 4xx usually carries {"error": "..."}; surface it as a rejection.
        if response.status().is_client_error() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<SubmitResponse>(&body) {
                Ok(parsed) if parsed.error.is_some() => Ok(parsed),
                _ => Err(ApiError::Status { code, body }),
            };
        }
        decode(response).await
    }

    async fn progress(
        &self,
        node: &NodeAddr,
        key: &DestinationKey,
    ) -> Result<ProgressResponse, ApiError> {
        let url = Self::endpoint_url(node, "Progress");
        let response = self
            .http
            .get(&url)
            .query(&[("destination_key", key.as_str())])
            .send()
            .await?;
        decode(response).await
    }

    async fn fetch_result(
        &self,
        node: &NodeAddr,
        key: &DestinationKey,
    ) -> Result<serde_json::Value, ApiError> {
        let url = Self::endpoint_url(node, "Inspect");
        let response = self
            .http
            .get(&url)
            .query(&[("key", key.as_str())])
            .send()
            .await?;
        decode(response).await
    }

    async fn cancel(&self, node: &NodeAddr, key: &DestinationKey) -> Result<(), ApiError> {
        let url = Self::endpoint_url(node, "Cancel");
        let response = self
            .http
            .post(&url)
            .query(&[("key", key.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { code, body });
        }
        Ok(())
    }
}
