//! reef-api — control-plane REST API.
//!
//! Conventional CRUD around the metadata store; the interesting parts of
//! the system live in reef-runtime and reef-dispatch.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/endpoint` | Create an endpoint |
//! | GET | `/endpoint` | List endpoints |
//! | GET | `/endpoint/{id}` | Get one endpoint |
//! | PUT | `/endpoint/{id}` | Merge environment variables |
//! | DELETE | `/endpoint/{id}` | Delete an endpoint |
//! | POST | `/endpoint/{id}/deployment` | Upload a WASM blob |
//! | GET | `/endpoint/{id}/deployment` | List deployments |
//! | GET | `/endpoint/{id}/metrics` | List runtime metrics |
//! | POST | `/publish` | Publish a deployment (also rollback) |

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use reef_state::MetadataStore;

pub use handlers::{
    ApiResponse, CreateEndpointParams, PublishParams, PublishResponse, UpdateEndpointParams,
};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetadataStore,
    /// Base URL of the public ingress, used to build published-URL
    /// responses (`{live_base}/live/{endpoint_id}`).
    pub live_base: String,
}

/// Build the control-plane router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/endpoint",
            get(handlers::list_endpoints).post(handlers::create_endpoint),
        )
        .route(
            "/endpoint/{id}",
            get(handlers::get_endpoint)
                .put(handlers::update_endpoint)
                .delete(handlers::delete_endpoint),
        )
        .route(
            "/endpoint/{id}/deployment",
            get(handlers::list_deployments).post(handlers::create_deployment),
        )
        .route("/endpoint/{id}/metrics", get(handlers::list_metrics))
        .route("/publish", post(handlers::publish))
        .with_state(state)
}
