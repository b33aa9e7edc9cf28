//! Cluster member nodes that host runtime workers.
//!
//! A [`RuntimeNode`] accepts length-delimited wire-request frames and is
//! expected to run exactly one runtime worker per frame, sending the
//! framed response back over the dispatcher's response channel. The
//! in-process [`LocalNode`] is the single-node implementation; a remote
//! transport would implement the same trait over the network.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use reef_core::wire::WireRequest;
use reef_runtime::RuntimeHost;

use crate::{DispatchError, Result};

/// A cluster member capable of executing runtime workers.
pub trait RuntimeNode: Send + Sync {
    /// Stable member identifier (for placement logs).
    fn id(&self) -> &str;

    /// Accept one wire-request frame. Must create exactly one runtime
    /// worker for it; the response is delivered asynchronously over the
    /// dispatcher's response channel.
    fn dispatch(&self, frame: Bytes) -> Result<()>;
}

/// In-process member: runs workers on the local blocking pool.
pub struct LocalNode {
    id: String,
    runtime: RuntimeHost,
    responses: mpsc::Sender<Bytes>,
}

impl LocalNode {
    pub fn new(id: &str, runtime: RuntimeHost, responses: mpsc::Sender<Bytes>) -> Self {
        Self {
            id: id.to_string(),
            runtime,
            responses,
        }
    }
}

impl RuntimeNode for LocalNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn dispatch(&self, frame: Bytes) -> Result<()> {
        let request = WireRequest::from_frame(frame).map_err(|e| DispatchError::Send {
            member: self.id.clone(),
            reason: e.to_string(),
        })?;

        let worker = self.runtime.spawn_worker();
        let responses = self.responses.clone();
        let member = self.id.clone();
        tokio::spawn(async move {
            // Guest execution is synchronous; keep it off the async pool.
            let result = tokio::task::spawn_blocking(move || worker.execute(request)).await;
            match result {
                Ok(Ok(response)) => {
                    let _ = responses.send(response.to_frame()).await;
                }
                // Storage-side failures produce no response at all; the
                // caller's deadline handles it.
                Ok(Err(e)) => {
                    warn!(%member, error = %e, "runtime worker finished without a response")
                }
                Err(e) => warn!(%member, error = %e, "runtime worker panicked"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use reef_core::config::RuntimeSettings;
    use reef_core::types::{Deployment, Endpoint};
    use reef_state::MetadataStore;

    use crate::{DispatchError, Dispatcher};

    const OK_GUEST: &str = r#"
        (module
          (import "env" "write_request" (func $write_request (param i32)))
          (import "env" "write_response" (func $write_response (param i32 i32)))
          (memory (export "memory") 17)
          (data (i32.const 8) "OK")
          (func (export "_start")
            (call $write_request (i32.const 4096))
            (call $write_response (i32.const 8) (i32.const 2))))
    "#;

    fn runtime_fixture() -> (RuntimeHost, MetadataStore, tempfile::TempDir) {
        let guest_root = tempfile::tempdir().unwrap();
        let store = MetadataStore::open_in_memory().unwrap();
        let settings = RuntimeSettings {
            cache_max_entries: 8,
            guest_root: guest_root.path().to_path_buf(),
            guest_memory_limit: 64 * 1024 * 1024,
        };
        (RuntimeHost::new(store.clone(), settings), store, guest_root)
    }

    fn wire_request(endpoint_id: &str) -> WireRequest {
        WireRequest {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint_id: endpoint_id.to_string(),
            method: "GET".to_string(),
            url: "/anything".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn local_node_executes_and_responds() {
        let (host, store, _guest_root) = runtime_fixture();
        let endpoint = Endpoint::new("e1", "go", HashMap::new());
        store.put_endpoint(&endpoint).unwrap();
        let deploy = Deployment::new(endpoint.id, OK_GUEST.as_bytes().to_vec());
        store.create_deployment(&deploy).unwrap();
        store.publish(endpoint.id, deploy.id).unwrap();

        let dispatcher = Dispatcher::new();
        dispatcher.register_member(Arc::new(LocalNode::new(
            "member-1",
            host,
            dispatcher.response_channel(),
        )));

        let response = dispatcher
            .dispatch_and_wait(wire_request(&endpoint.id.to_string()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, b"OK");
    }

    #[tokio::test]
    async fn storage_miss_surfaces_as_deadline_expiry() {
        // The worker finds no endpoint, sends nothing, and the caller's
        // deadline fires.
        let (host, _store, _guest_root) = runtime_fixture();
        let dispatcher = Dispatcher::new();
        dispatcher.register_member(Arc::new(LocalNode::new(
            "member-1",
            host,
            dispatcher.response_channel(),
        )));

        let result = dispatcher
            .dispatch_and_wait(
                wire_request(&uuid::Uuid::new_v4().to_string()),
                Duration::from_millis(100),
            )
            .await;
        assert!(matches!(result, Err(DispatchError::Timeout)));
    }
}
