//! Dispatcher — places wire requests on members and correlates responses.
//!
//! The dispatcher owns a self-managed member set, a round-robin placement
//! counter, and a correlation map of in-flight request ids. Responses
//! come back as length-delimited frames on an mpsc channel; a routing
//! task decodes each frame and completes the matching oneshot. The caller
//! owns the deadline: on expiry the pending entry is dropped and any
//! late response is discarded.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use reef_core::wire::{WireRequest, WireResponse};

use crate::balancer::RoundRobin;
use crate::node::RuntimeNode;
use crate::{DispatchError, Result};

/// Depth of the shared response channel before members back-pressure.
const RESPONSE_CHANNEL_DEPTH: usize = 256;

/// Places runtime workers across cluster members and routes wire
/// responses back by request id.
pub struct Dispatcher {
    members: RwLock<Vec<Arc<dyn RuntimeNode>>>,
    balancer: RoundRobin,
    pending: Arc<DashMap<String, oneshot::Sender<WireResponse>>>,
    response_tx: mpsc::Sender<Bytes>,
}

impl Dispatcher {
    /// Create a dispatcher and start its response-routing task.
    pub fn new() -> Arc<Self> {
        let (response_tx, response_rx) = mpsc::channel(RESPONSE_CHANNEL_DEPTH);
        let pending: Arc<DashMap<String, oneshot::Sender<WireResponse>>> =
            Arc::new(DashMap::new());

        tokio::spawn(route_responses(response_rx, pending.clone()));

        Arc::new(Self {
            members: RwLock::new(Vec::new()),
            balancer: RoundRobin::new(),
            pending,
            response_tx,
        })
    }

    /// The channel members use to deliver response frames.
    pub fn response_channel(&self) -> mpsc::Sender<Bytes> {
        self.response_tx.clone()
    }

    /// Add a member to the self-managed set.
    pub fn register_member(&self, node: Arc<dyn RuntimeNode>) {
        debug!(member = node.id(), "cluster member registered");
        self.members.write().push(node);
    }

    /// Remove a member by id. Returns true if it was present.
    pub fn remove_member(&self, id: &str) -> bool {
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|m| m.id() != id);
        members.len() != before
    }

    /// Current member count.
    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    /// Number of requests awaiting a response (for diagnostics).
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Dispatch a wire request to some member and await the correlated
    /// response under `deadline`.
    ///
    /// Exactly one runtime worker is created for the request. On deadline
    /// expiry the wait is abandoned (`DispatchError::Timeout`); the
    /// worker runs to completion and its late response is discarded by
    /// the router.
    pub async fn dispatch_and_wait(
        &self,
        request: WireRequest,
        deadline: Duration,
    ) -> Result<WireResponse> {
        let request_id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let member = {
            let members = self.members.read();
            match self.balancer.pick(members.len()) {
                Some(idx) => members[idx].clone(),
                None => {
                    drop(members);
                    self.pending.remove(&request_id);
                    return Err(DispatchError::NoMembers);
                }
            }
        };

        debug!(%request_id, member = member.id(), "dispatching runtime worker");
        if let Err(e) = member.dispatch(request.to_frame()) {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match timeout(deadline, rx).await {
            Ok(Ok(response)) => Ok(response),
            // The router dropped the sender without completing; treat it
            // like a worker that never responded.
            Ok(Err(_)) => Err(DispatchError::Timeout),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(DispatchError::Timeout)
            }
        }
    }
}

/// Drain response frames, completing the matching pending request.
async fn route_responses(
    mut rx: mpsc::Receiver<Bytes>,
    pending: Arc<DashMap<String, oneshot::Sender<WireResponse>>>,
) {
    while let Some(frame) = rx.recv().await {
        let response = match WireResponse::from_frame(frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "discarding malformed response frame");
                continue;
            }
        };
        match pending.remove(&response.request_id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
            }
            None => debug!(request_id = %response.request_id, "late response discarded"),
        }
    }
}
