//! reef-dispatch — placement and correlation for runtime workers.
//!
//! # Architecture
//!
//! ```text
//! Ingress worker
//!   └── Dispatcher
//!       ├── MemberSet (self-managed membership)
//!       ├── RoundRobin (placement policy)
//!       ├── pending map: request_id → oneshot sender
//!       └── response router task
//!             ▲ length-delimited WireResponse frames
//! Member node (RuntimeNode)
//!   └── LocalNode: decodes the frame, runs a one-shot RuntimeWorker
//!       on a blocking task, sends the framed response back
//! ```
//!
//! Every dispatched wire request creates exactly one runtime worker on
//! some member; the matching response is routed back to the waiting
//! caller by the request id carried inside the frame. A worker that dies
//! before responding is not retried: the caller's deadline fires
//! instead, and any response arriving after abandonment is discarded.
//!
//! Members exchange length-delimited frames even in-process, so the
//! codec path is exercised exactly as a remote transport would use it.

pub mod balancer;
pub mod dispatcher;
pub mod node;

pub use balancer::RoundRobin;
pub use dispatcher::Dispatcher;
pub use node::{LocalNode, RuntimeNode};

use thiserror::Error;

/// Errors surfaced by the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no cluster members registered")]
    NoMembers,

    #[error("no response within the deadline")]
    Timeout,

    #[error("failed to hand request to member {member}: {reason}")]
    Send { member: String, reason: String },
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
