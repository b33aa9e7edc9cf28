//! reef-core — shared domain types for the reef edge runtime.
//!
//! Holds the pieces every other crate agrees on:
//!
//! - [`types`] — endpoints, deployments, and runtime metrics as they are
//!   persisted and exchanged between the control plane and the runtime.
//! - [`wire`] — the protobuf-tagged wire request/response messages that
//!   travel between the ingress worker and runtime workers, plus the
//!   length-delimited framing used on the dispatch transport.
//! - [`config`] — the TOML configuration loaded once at process start and
//!   passed explicitly through component constructors.

pub mod config;
pub mod types;
pub mod wire;

pub use config::ReefConfig;
pub use types::{Deployment, Endpoint, ExecutionOutcome, RuntimeMetric};
pub use wire::{HeaderValues, WireRequest, WireResponse};
