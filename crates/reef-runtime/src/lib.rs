//! reef-runtime — the WASM execution core.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     RuntimeHost                            │
//! │  ┌────────────┐  ┌──────────────┐                          │
//! │  │   Engine   │  │ ModuleCache  │   shared across requests │
//! │  │  (shared)  │  │ (endpoint →  │                          │
//! │  └────────────┘  │  Module, LRU)│                          │
//! │                  └──────────────┘                          │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │ RuntimeWorker (one per request, one-shot)            │  │
//! │  │   resolve endpoint + active deployment               │  │
//! │  │   compile (or cache hit) → instantiate → run guest   │  │
//! │  │   env.write_request / env.write_response ABI         │  │
//! │  │   emit runtime metric, write artifact back to cache  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never outlive a request: [`worker::RuntimeWorker::execute`]
//! consumes the worker, so the Idle → Executing → Terminated lifecycle is
//! enforced by the type system. Compiled-module reuse via the cache is the
//! only state shared across requests.

pub mod cache;
pub mod host;
pub mod worker;

pub use cache::ModuleCache;
pub use host::RequestModule;
pub use worker::{RuntimeHost, RuntimeWorker};

use thiserror::Error;
use uuid::Uuid;

/// Errors that abort a runtime worker before a wire response exists.
///
/// Guest-side failures (compile, instantiate, trap) are *not* errors at
/// this level: the worker converts them into a status-500 wire response
/// and records the failure mode in the runtime metric.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid endpoint id: {0:?}")]
    BadEndpointId(String),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(Uuid),

    #[error("endpoint {0} has no active deployment")]
    NoActiveDeployment(Uuid),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] reef_state::StoreError),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
