//! reef-ingress — the public HTTP frontend.
//!
//! Accepts traffic on `/live/{endpoint_id}/{path…}`, resolves the
//! endpoint and its active deployment, builds the wire request (with the
//! ingress prefix stripped from the guest-visible path), dispatches a
//! runtime worker through the cluster dispatcher, and writes the
//! correlated wire response back as the HTTP reply.
//!
//! The ingress owns the request deadline: expiry yields 504 while the
//! runtime worker runs to completion and its late response is discarded.

pub mod handler;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::any;
use axum::Router;

use reef_dispatch::Dispatcher;
use reef_state::MetadataStore;

/// Shared state for the live-traffic handlers.
#[derive(Clone)]
pub struct IngressState {
    pub store: MetadataStore,
    pub dispatcher: Arc<Dispatcher>,
    /// Per-request deadline before replying 504.
    pub request_timeout: Duration,
}

/// Build the `/live/…` router.
pub fn build_router(state: IngressState) -> Router {
    Router::new()
        .route("/live/{endpoint_id}", any(handler::live_root))
        .route("/live/{endpoint_id}/{*path}", any(handler::live_path))
        .with_state(state)
}
