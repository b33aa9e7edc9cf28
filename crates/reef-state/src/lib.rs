//! reef-state — embedded metadata store and metric sink for reef.
//!
//! Backed by [redb](https://docs.rs/redb). Endpoints and deployments are
//! JSON-serialized into `&[u8]` value columns; runtime metrics use
//! `{endpoint_id}:{metric_id}` composite keys for prefix scans.
//!
//! The [`MetadataStore`] is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and is shared by the ingress workers, runtime
//! workers, and the control-plane API. Publishing rewrites the endpoint
//! record inside a single write transaction, so readers observe either
//! the old or the new active pointer, never a torn value.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::MetadataStore;
