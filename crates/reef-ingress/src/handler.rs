//! Live-traffic handlers.
//!
//! One request here is one runtime worker somewhere in the cluster: the
//! handler mints a request id, serializes the HTTP request into a wire
//! request, and blocks (with a deadline) on the correlated wire response.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use reef_core::wire::{HeaderValues, WireRequest};
use reef_dispatch::DispatchError;

use crate::IngressState;

/// `/live/{endpoint_id}` — bare endpoint root.
pub async fn live_root(
    State(state): State<IngressState>,
    Path(endpoint_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve_live(state, endpoint_id, "/".to_string(), method, headers, body).await
}

/// `/live/{endpoint_id}/{*path}` — endpoint with a guest path.
pub async fn live_path(
    State(state): State<IngressState>,
    Path((endpoint_id, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve_live(state, endpoint_id, format!("/{path}"), method, headers, body).await
}

async fn serve_live(
    state: IngressState,
    endpoint_id: String,
    guest_path: String,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(id) = Uuid::parse_str(&endpoint_id) else {
        return (StatusCode::NOT_FOUND, "unknown endpoint\n").into_response();
    };

    // Resolve before dispatching so unknown endpoints fail fast with a
    // 404 instead of burning a worker and a deadline.
    let endpoint = match state.store.get_endpoint(id) {
        Ok(Some(endpoint)) => endpoint,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown endpoint\n").into_response(),
        Err(e) => {
            warn!(endpoint = %id, error = %e, "endpoint lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if endpoint.active_deployment_id.is_none() {
        return (StatusCode::NOT_FOUND, "endpoint has no active deployment\n").into_response();
    }

    let request = WireRequest {
        id: Uuid::new_v4().to_string(),
        endpoint_id,
        method: method.to_string(),
        url: guest_path,
        headers: wire_headers(&headers),
        body: body.to_vec(),
    };

    match state
        .dispatcher
        .dispatch_and_wait(request, state.request_timeout)
        .await
    {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status_code as u16)
                .unwrap_or(StatusCode::OK);
            (status, response.body).into_response()
        }
        Err(DispatchError::Timeout) => StatusCode::GATEWAY_TIMEOUT.into_response(),
        Err(e) => {
            warn!(endpoint = %id, error = %e, "dispatch failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Group HTTP headers into the wire form, preserving multi-valued
/// fields. Values that aren't valid UTF-8 are skipped.
fn wire_headers(headers: &HeaderMap) -> HashMap<String, HeaderValues> {
    let mut map: HashMap<String, HeaderValues> = HashMap::new();
    for key in headers.keys() {
        let values: Vec<String> = headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        if !values.is_empty() {
            map.insert(key.as_str().to_string(), HeaderValues { values });
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::HeaderValue;
    use reef_core::types::{Deployment, Endpoint};
    use reef_core::wire::WireResponse;
    use reef_dispatch::{Dispatcher, RuntimeNode};
    use reef_state::MetadataStore;
    use tokio::sync::mpsc;

    /// Member that echoes the guest path back as the response body.
    struct PathEchoNode {
        responses: mpsc::Sender<bytes::Bytes>,
    }

    impl RuntimeNode for PathEchoNode {
        fn id(&self) -> &str {
            "echo"
        }

        fn dispatch(&self, frame: bytes::Bytes) -> reef_dispatch::Result<()> {
            let request = WireRequest::from_frame(frame).unwrap();
            let responses = self.responses.clone();
            tokio::spawn(async move {
                let response = WireResponse {
                    request_id: request.id,
                    status_code: 200,
                    body: request.url.into_bytes(),
                };
                let _ = responses.send(response.to_frame()).await;
            });
            Ok(())
        }
    }

    /// Member that never answers.
    struct SilentNode;

    impl RuntimeNode for SilentNode {
        fn id(&self) -> &str {
            "silent"
        }

        fn dispatch(&self, _frame: bytes::Bytes) -> reef_dispatch::Result<()> {
            Ok(())
        }
    }

    fn published_endpoint(store: &MetadataStore) -> Endpoint {
        let endpoint = Endpoint::new("my endpoint", "go", StdHashMap::new());
        store.put_endpoint(&endpoint).unwrap();
        let deploy = Deployment::new(endpoint.id, b"somefakeblob".to_vec());
        store.create_deployment(&deploy).unwrap();
        store.publish(endpoint.id, deploy.id).unwrap()
    }

    fn echo_state(store: MetadataStore) -> IngressState {
        let dispatcher = Dispatcher::new();
        dispatcher.register_member(Arc::new(PathEchoNode {
            responses: dispatcher.response_channel(),
        }));
        IngressState {
            store,
            dispatcher,
            request_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn live_path_strips_ingress_prefix() {
        let store = MetadataStore::open_in_memory().unwrap();
        let endpoint = published_endpoint(&store);
        let state = echo_state(store);

        let response = live_path(
            State(state),
            Path((endpoint.id.to_string(), "anything/nested".to_string())),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"/anything/nested");
    }

    #[tokio::test]
    async fn live_root_uses_slash_path() {
        let store = MetadataStore::open_in_memory().unwrap();
        let endpoint = published_endpoint(&store);
        let state = echo_state(store);

        let response = live_root(
            State(state),
            Path(endpoint.id.to_string()),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"/");
    }

    #[tokio::test]
    async fn unknown_endpoint_is_404() {
        let store = MetadataStore::open_in_memory().unwrap();
        let state = echo_state(store);

        let response = live_root(
            State(state),
            Path(Uuid::new_v4().to_string()),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_uuid_is_404() {
        let store = MetadataStore::open_in_memory().unwrap();
        let state = echo_state(store);

        let response = live_root(
            State(state),
            Path("not-a-uuid".to_string()),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unpublished_endpoint_is_404() {
        let store = MetadataStore::open_in_memory().unwrap();
        let endpoint = Endpoint::new("my endpoint", "go", StdHashMap::new());
        store.put_endpoint(&endpoint).unwrap();
        let state = echo_state(store);

        let response = live_root(
            State(state),
            Path(endpoint.id.to_string()),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deadline_expiry_is_504() {
        let store = MetadataStore::open_in_memory().unwrap();
        let endpoint = published_endpoint(&store);
        let dispatcher = Dispatcher::new();
        dispatcher.register_member(Arc::new(SilentNode));
        let state = IngressState {
            store,
            dispatcher,
            request_timeout: Duration::from_millis(20),
        };

        let response = live_root(
            State(state),
            Path(endpoint.id.to_string()),
            Method::GET,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn headers_group_multiple_values() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("x-single", HeaderValue::from_static("one"));

        let wire = wire_headers(&headers);
        assert_eq!(
            wire.get("accept").unwrap().values,
            vec!["text/plain", "application/json"]
        );
        assert_eq!(wire.get("x-single").unwrap().values, vec!["one"]);
    }
}
