//! redb table definitions for the reef metadata store.
//!
//! All tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Metrics use composite `{endpoint_id}:{metric_id}` keys so the
//! records of one endpoint form a contiguous prefix.

use redb::TableDefinition;

/// Endpoints keyed by `{endpoint_id}`.
pub const ENDPOINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("endpoints");

/// Deployments keyed by `{deployment_id}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Runtime metrics keyed by `{endpoint_id}:{metric_id}`.
pub const METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("metrics");

/// Every table the store bootstraps on open.
pub const ALL: &[TableDefinition<'static, &'static str, &'static [u8]>] =
    &[ENDPOINTS, DEPLOYMENTS, METRICS];
