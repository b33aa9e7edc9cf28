//! MetadataStore — redb-backed persistence for endpoints, deployments,
//! and runtime metrics.
//!
//! Endpoints and deployments are the control-plane records; metrics are
//! append-only execution records written by runtime workers. The store
//! supports both on-disk and in-memory backends (the latter for testing).
//! Backend errors convert into `StoreError` at the crate boundary, so
//! every operation here reads as straight-line `?` code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable};
use tracing::debug;
use uuid::Uuid;

use reef_core::types::{Deployment, Endpoint, RuntimeMetric};

use crate::error::{StoreError, StoreResult};
use crate::tables;
use crate::tables::{DEPLOYMENTS, ENDPOINTS, METRICS};

/// Thread-safe metadata store backed by redb.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<Database>,
}

impl MetadataStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let store = Self::bootstrap(Database::create(path)?)?;
        debug!(?path, "metadata store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::bootstrap(db)
    }

    /// Wrap a freshly opened database, creating any missing tables.
    fn bootstrap(db: Database) -> StoreResult<Self> {
        let txn = db.begin_write()?;
        for table in tables::ALL {
            // Opening a table in a write transaction creates it if absent.
            txn.open_table(*table)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ── Endpoints ──────────────────────────────────────────────────

    /// Persist a new (or updated) endpoint record.
    pub fn put_endpoint(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let key = endpoint.id.to_string();
        let value = serde_json::to_vec(endpoint)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENDPOINTS)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        debug!(%key, "endpoint stored");
        Ok(())
    }

    /// Get an endpoint by id.
    pub fn get_endpoint(&self, id: Uuid) -> StoreResult<Option<Endpoint>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENDPOINTS)?;
        match table.get(id.to_string().as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all endpoints.
    pub fn list_endpoints(&self) -> StoreResult<Vec<Endpoint>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENDPOINTS)?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            results.push(serde_json::from_slice(value.value())?);
        }
        Ok(results)
    }

    /// Merge new environment entries into an endpoint's environment map.
    ///
    /// Keys present in `update` overwrite; absent keys survive. Returns
    /// the updated endpoint.
    pub fn update_environment(
        &self,
        id: Uuid,
        update: HashMap<String, String>,
    ) -> StoreResult<Endpoint> {
        let txn = self.db.begin_write()?;
        let endpoint = {
            let mut table = txn.open_table(ENDPOINTS)?;
            let key = id.to_string();
            let mut endpoint: Endpoint = match table.get(key.as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StoreError::EndpointNotFound(id)),
            };
            endpoint.merge_environment(update);
            let value = serde_json::to_vec(&endpoint)?;
            table.insert(key.as_str(), value.as_slice())?;
            endpoint
        };
        txn.commit()?;
        debug!(id = %endpoint.id, "endpoint environment updated");
        Ok(endpoint)
    }

    /// Delete an endpoint along with its deployments and metrics.
    /// Returns true if the endpoint existed.
    pub fn delete_endpoint(&self, id: Uuid) -> StoreResult<bool> {
        let prefix = format!("{id}:");
        let id_str = id.to_string();
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut endpoints = txn.open_table(ENDPOINTS)?;
            existed = endpoints.remove(id_str.as_str())?.is_some();

            let mut deployments = txn.open_table(DEPLOYMENTS)?;
            let stale: Vec<String> = deployments
                .iter()?
                .filter_map(|entry| {
                    let (key, value) = entry.ok()?;
                    let deploy: Deployment = serde_json::from_slice(value.value()).ok()?;
                    (deploy.endpoint_id == id).then(|| key.value().to_string())
                })
                .collect();
            for key in &stale {
                deployments.remove(key.as_str())?;
            }

            let mut metrics = txn.open_table(METRICS)?;
            let stale: Vec<String> = metrics
                .iter()?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    k.starts_with(&prefix).then_some(k)
                })
                .collect();
            for key in &stale {
                metrics.remove(key.as_str())?;
            }
        }
        txn.commit()?;
        debug!(%id_str, existed, "endpoint deleted");
        Ok(existed)
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Persist a new deployment. Deployments are write-once; storing an
    /// id that already exists is an error.
    pub fn create_deployment(&self, deploy: &Deployment) -> StoreResult<()> {
        let key = deploy.id.to_string();
        let value = serde_json::to_vec(deploy)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEPLOYMENTS)?;
            if table.get(key.as_str())?.is_some() {
                return Err(StoreError::DeploymentExists(deploy.id));
            }
            table.insert(key.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        debug!(%key, endpoint = %deploy.endpoint_id, "deployment stored");
        Ok(())
    }

    /// Get a deployment by id.
    pub fn get_deployment(&self, id: Uuid) -> StoreResult<Option<Deployment>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEPLOYMENTS)?;
        match table.get(id.to_string().as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all deployments owned by an endpoint.
    pub fn list_deployments_for_endpoint(&self, endpoint_id: Uuid) -> StoreResult<Vec<Deployment>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEPLOYMENTS)?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let deploy: Deployment = serde_json::from_slice(value.value())?;
            if deploy.endpoint_id == endpoint_id {
                results.push(deploy);
            }
        }
        Ok(results)
    }

    /// Publish a deployment: flip the owning endpoint's active pointer.
    ///
    /// Validates that the deployment exists and belongs to the endpoint,
    /// then rewrites the endpoint record in the same write transaction.
    /// Publishing an already-active deployment is a no-op (idempotent);
    /// rollback is publish of a prior deployment id.
    pub fn publish(&self, endpoint_id: Uuid, deployment_id: Uuid) -> StoreResult<Endpoint> {
        let txn = self.db.begin_write()?;
        let endpoint = {
            let deployments = txn.open_table(DEPLOYMENTS)?;
            let deploy: Deployment = match deployments.get(deployment_id.to_string().as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StoreError::DeploymentNotFound(deployment_id)),
            };
            if deploy.endpoint_id != endpoint_id {
                return Err(StoreError::ForeignDeployment {
                    endpoint: endpoint_id,
                    deployment: deployment_id,
                });
            }

            let mut endpoints = txn.open_table(ENDPOINTS)?;
            let key = endpoint_id.to_string();
            let mut endpoint: Endpoint = match endpoints.get(key.as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(StoreError::EndpointNotFound(endpoint_id)),
            };
            endpoint.active_deployment_id = Some(deployment_id);
            let value = serde_json::to_vec(&endpoint)?;
            endpoints.insert(key.as_str(), value.as_slice())?;
            endpoint
        };
        txn.commit()?;
        debug!(%endpoint_id, %deployment_id, "deployment published");
        Ok(endpoint)
    }

    /// Resolve an endpoint's active deployment, if any.
    pub fn get_active_deployment(&self, endpoint_id: Uuid) -> StoreResult<Option<Deployment>> {
        let endpoint = match self.get_endpoint(endpoint_id)? {
            Some(e) => e,
            None => return Ok(None),
        };
        match endpoint.active_deployment_id {
            Some(deploy_id) => self.get_deployment(deploy_id),
            None => Ok(None),
        }
    }

    // ── Runtime metrics ────────────────────────────────────────────

    /// Append a runtime metric record. Records are never mutated.
    pub fn create_runtime_metric(&self, metric: &RuntimeMetric) -> StoreResult<()> {
        let key = format!("{}:{}", metric.endpoint_id, metric.id);
        let value = serde_json::to_vec(metric)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(METRICS)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// List runtime metrics for an endpoint (by key prefix scan).
    pub fn list_metrics_for_endpoint(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RuntimeMetric>> {
        let prefix = format!("{endpoint_id}:");
        let txn = self.db.begin_read()?;
        let table = txn.open_table(METRICS)?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            if key.value().starts_with(&prefix) {
                results.push(serde_json::from_slice(value.value())?);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }
}
