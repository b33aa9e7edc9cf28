//! REST API handlers.
//!
//! Each handler reads/writes via `MetadataStore` and returns JSON
//! responses in a uniform `ApiResponse` envelope.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use reef_core::types::{Deployment, Endpoint};
use reef_state::StoreError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> axum::response::Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn store_error(e: StoreError) -> axum::response::Response {
    let status = match e {
        StoreError::EndpointNotFound(_) | StoreError::DeploymentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        StoreError::DeploymentExists(_) | StoreError::ForeignDeployment { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

// ── Endpoints ──────────────────────────────────────────────────

/// Create-endpoint request body.
#[derive(Serialize, Deserialize)]
pub struct CreateEndpointParams {
    pub name: String,
    pub runtime: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// POST /endpoint
pub async fn create_endpoint(
    State(state): State<ApiState>,
    Json(params): Json<CreateEndpointParams>,
) -> impl IntoResponse {
    let endpoint = Endpoint::new(&params.name, &params.runtime, params.environment);
    match state.store.put_endpoint(&endpoint) {
        Ok(()) => ApiResponse::ok(endpoint).into_response(),
        Err(e) => store_error(e),
    }
}

/// GET /endpoint
pub async fn list_endpoints(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_endpoints() {
        Ok(endpoints) => ApiResponse::ok(endpoints).into_response(),
        Err(e) => store_error(e),
    }
}

/// GET /endpoint/{id}
pub async fn get_endpoint(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.get_endpoint(id) {
        Ok(Some(endpoint)) => ApiResponse::ok(endpoint).into_response(),
        Ok(None) => error_response("endpoint not found", StatusCode::NOT_FOUND),
        Err(e) => store_error(e),
    }
}

/// Update-endpoint request body. Environment entries are merged into
/// the existing map, not substituted for it.
#[derive(Serialize, Deserialize)]
pub struct UpdateEndpointParams {
    pub environment: HashMap<String, String>,
}

/// PUT /endpoint/{id}
pub async fn update_endpoint(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateEndpointParams>,
) -> impl IntoResponse {
    match state.store.update_environment(id, params.environment) {
        Ok(endpoint) => ApiResponse::ok(endpoint).into_response(),
        Err(e) => store_error(e),
    }
}

/// DELETE /endpoint/{id}
pub async fn delete_endpoint(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.delete_endpoint(id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("endpoint not found", StatusCode::NOT_FOUND),
        Err(e) => store_error(e),
    }
}

// ── Deployments ────────────────────────────────────────────────

/// POST /endpoint/{id}/deployment — body is the raw WASM blob.
pub async fn create_deployment(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    blob: Bytes,
) -> impl IntoResponse {
    if blob.is_empty() {
        return error_response("empty deployment blob", StatusCode::BAD_REQUEST);
    }
    match state.store.get_endpoint(id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response("endpoint not found", StatusCode::NOT_FOUND),
        Err(e) => return store_error(e),
    }

    let deploy = Deployment::new(id, blob.to_vec());
    match state.store.create_deployment(&deploy) {
        Ok(()) => ApiResponse::ok(deploy).into_response(),
        Err(e) => store_error(e),
    }
}

/// GET /endpoint/{id}/deployment
pub async fn list_deployments(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.list_deployments_for_endpoint(id) {
        Ok(deployments) => ApiResponse::ok(deployments).into_response(),
        Err(e) => store_error(e),
    }
}

// ── Publish ────────────────────────────────────────────────────

/// Publish request body. Rollback is the same request with a prior
/// deployment id.
#[derive(Serialize, Deserialize)]
pub struct PublishParams {
    pub deployment_id: Uuid,
}

/// Publish response: where the endpoint is now being served.
#[derive(Serialize, Deserialize)]
pub struct PublishResponse {
    pub deployment_id: Uuid,
    pub url: String,
}

/// POST /publish
pub async fn publish(
    State(state): State<ApiState>,
    Json(params): Json<PublishParams>,
) -> impl IntoResponse {
    let deploy = match state.store.get_deployment(params.deployment_id) {
        Ok(Some(deploy)) => deploy,
        Ok(None) => return error_response("deployment not found", StatusCode::NOT_FOUND),
        Err(e) => return store_error(e),
    };
    match state.store.publish(deploy.endpoint_id, deploy.id) {
        Ok(endpoint) => ApiResponse::ok(PublishResponse {
            deployment_id: deploy.id,
            url: format!("{}/live/{}", state.live_base, endpoint.id),
        })
        .into_response(),
        Err(e) => store_error(e),
    }
}

// ── Metrics ────────────────────────────────────────────────────

/// GET /endpoint/{id}/metrics
pub async fn list_metrics(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.list_metrics_for_endpoint(id, 100) {
        Ok(metrics) => ApiResponse::ok(metrics).into_response(),
        Err(e) => store_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reef_state::MetadataStore;

    fn test_state() -> ApiState {
        ApiState {
            store: MetadataStore::open_in_memory().unwrap(),
            live_base: "http://0.0.0.0:8080".to_string(),
        }
    }

    fn seed_endpoint(state: &ApiState) -> Endpoint {
        let endpoint = Endpoint::new(
            "my endpoint",
            "go",
            HashMap::from([("FOO".to_string(), "BAR".to_string())]),
        );
        state.store.put_endpoint(&endpoint).unwrap();
        endpoint
    }

    #[tokio::test]
    async fn create_endpoint_starts_unpublished() {
        let state = test_state();
        let params = CreateEndpointParams {
            name: "my endpoint".to_string(),
            runtime: "go".to_string(),
            environment: HashMap::from([("FOO".to_string(), "BAR".to_string())]),
        };

        let response = create_endpoint(State(state.clone()), Json(params))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let endpoints = state.store.list_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "my endpoint");
        assert_eq!(endpoints[0].runtime, "go");
        assert!(endpoints[0].active_deployment_id.is_none());
    }

    #[tokio::test]
    async fn get_endpoint_found_and_missing() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);

        let response = get_endpoint(State(state.clone()), Path(endpoint.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_endpoint(State(state), Path(Uuid::new_v4()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_endpoint_merges_environment() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);

        let params = UpdateEndpointParams {
            environment: HashMap::from([
                ("A".to_string(), "B".to_string()),
                ("C".to_string(), "D".to_string()),
            ]),
        };
        let response = update_endpoint(State(state.clone()), Path(endpoint.id), Json(params))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let expected = HashMap::from([
            ("A".to_string(), "B".to_string()),
            ("C".to_string(), "D".to_string()),
            ("FOO".to_string(), "BAR".to_string()),
        ]);
        let stored = state.store.get_endpoint(endpoint.id).unwrap().unwrap();
        assert_eq!(stored.environment, expected);
    }

    #[tokio::test]
    async fn create_deployment_hashes_blob() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);

        let response = create_deployment(
            State(state.clone()),
            Path(endpoint.id),
            Bytes::from_static(b"somefakeblob"),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let deployments = state.store.list_deployments_for_endpoint(endpoint.id).unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].endpoint_id, endpoint.id);
        assert_eq!(deployments[0].hash.len(), 32);
        // Upload alone doesn't publish.
        let stored = state.store.get_endpoint(endpoint.id).unwrap().unwrap();
        assert!(stored.active_deployment_id.is_none());
    }

    #[tokio::test]
    async fn create_deployment_rejects_unknown_endpoint() {
        let state = test_state();
        let response = create_deployment(
            State(state),
            Path(Uuid::new_v4()),
            Bytes::from_static(b"blob"),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_deployment_rejects_empty_blob() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);
        let response = create_deployment(State(state), Path(endpoint.id), Bytes::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn publish_sets_active_pointer_and_returns_url() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);
        let deploy = Deployment::new(endpoint.id, b"somefakeblob".to_vec());
        state.store.create_deployment(&deploy).unwrap();

        let response = publish(
            State(state.clone()),
            Json(PublishParams {
                deployment_id: deploy.id,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let parsed: ApiResponse<PublishResponse> = serde_json::from_slice(&body).unwrap();
        let publish_response = parsed.data.unwrap();
        assert_eq!(publish_response.deployment_id, deploy.id);
        assert_eq!(
            publish_response.url,
            format!("http://0.0.0.0:8080/live/{}", endpoint.id)
        );

        let stored = state.store.get_endpoint(endpoint.id).unwrap().unwrap();
        assert_eq!(stored.active_deployment_id, Some(deploy.id));
    }

    #[tokio::test]
    async fn publish_unknown_deployment_is_404() {
        let state = test_state();
        let response = publish(
            State(state),
            Json(PublishParams {
                deployment_id: Uuid::new_v4(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_endpoint_twice() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);

        let response = delete_endpoint(State(state.clone()), Path(endpoint.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = delete_endpoint(State(state), Path(endpoint.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_empty_for_fresh_endpoint() {
        let state = test_state();
        let endpoint = seed_endpoint(&state);
        let response = list_metrics(State(state), Path(endpoint.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
