//! HTTP client for the reef control-plane API.

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use reef_api::{
    ApiResponse, CreateEndpointParams, PublishParams, PublishResponse, UpdateEndpointParams,
};
use reef_core::types::{Deployment, Endpoint, RuntimeMetric};

/// Thin wrapper over reqwest against a reef-api base URL.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_endpoint(&self, params: &CreateEndpointParams) -> anyhow::Result<Endpoint> {
        let response = self
            .http
            .post(format!("{}/endpoint", self.base_url))
            .json(params)
            .send()
            .await?;
        unwrap_api(response).await
    }

    pub async fn list_endpoints(&self) -> anyhow::Result<Vec<Endpoint>> {
        let response = self
            .http
            .get(format!("{}/endpoint", self.base_url))
            .send()
            .await?;
        unwrap_api(response).await
    }

    pub async fn update_endpoint(
        &self,
        id: Uuid,
        params: &UpdateEndpointParams,
    ) -> anyhow::Result<Endpoint> {
        let response = self
            .http
            .put(format!("{}/endpoint/{id}", self.base_url))
            .json(params)
            .send()
            .await?;
        unwrap_api(response).await
    }

    pub async fn create_deployment(&self, id: Uuid, blob: Vec<u8>) -> anyhow::Result<Deployment> {
        let response = self
            .http
            .post(format!("{}/endpoint/{id}/deployment", self.base_url))
            .header("content-type", "application/octet-stream")
            .body(blob)
            .send()
            .await?;
        unwrap_api(response).await
    }

    pub async fn publish(&self, deployment_id: Uuid) -> anyhow::Result<PublishResponse> {
        let response = self
            .http
            .post(format!("{}/publish", self.base_url))
            .json(&PublishParams { deployment_id })
            .send()
            .await?;
        unwrap_api(response).await
    }

    pub async fn list_metrics(&self, id: Uuid) -> anyhow::Result<Vec<RuntimeMetric>> {
        let response = self
            .http
            .get(format!("{}/endpoint/{id}/metrics", self.base_url))
            .send()
            .await?;
        unwrap_api(response).await
    }
}

/// Unpack the `ApiResponse` envelope, turning API-side failures into
/// readable errors.
async fn unwrap_api<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    let status = response.status();
    let envelope: ApiResponse<T> = response
        .json()
        .await
        .with_context(|| format!("malformed API response (status {status})"))?;
    if !envelope.success {
        bail!(
            "API error (status {status}): {}",
            envelope.error.unwrap_or_else(|| "unknown".to_string())
        );
    }
    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("API response missing data (status {status})"))
}
