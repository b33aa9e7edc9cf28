//! Domain types for endpoints, deployments, and runtime metrics.
//!
//! These types are JSON-serialized into the state store and returned by
//! the control-plane API. Timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A named, addressable unit that user traffic targets.
///
/// Endpoints own deployments; at most one deployment is *active* and is
/// the one served for `/live/{endpoint_id}/…` traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    /// Language label of the uploaded workload ("go", "rust", …).
    /// Informational only; the runtime treats all blobs the same.
    pub runtime: String,
    /// Environment variables injected into every guest instance.
    pub environment: HashMap<String, String>,
    /// The currently published deployment, if any.
    pub active_deployment_id: Option<Uuid>,
    pub created_at_ms: u64,
}

impl Endpoint {
    /// Create a new endpoint with no active deployment.
    pub fn new(name: &str, runtime: &str, environment: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            runtime: runtime.to_string(),
            environment,
            active_deployment_id: None,
            created_at_ms: epoch_ms(),
        }
    }

    /// Merge new environment entries into the existing map.
    ///
    /// Keys present in `update` overwrite; all other keys survive.
    pub fn merge_environment(&mut self, update: HashMap<String, String>) {
        self.environment.extend(update);
    }
}

/// An immutable WASM blob uploaded under an endpoint.
///
/// Blob bytes and hash are write-once; publishing flips the owning
/// endpoint's active pointer to this deployment's id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    /// Raw WASM module bytes.
    #[serde(with = "serde_bytes_base64")]
    pub blob: Vec<u8>,
    /// 32-hex-char content digest of `blob`.
    pub hash: String,
    pub created_at_ms: u64,
}

impl Deployment {
    /// Create a deployment for an endpoint, digesting the blob.
    pub fn new(endpoint_id: Uuid, blob: Vec<u8>) -> Self {
        let hash = blob_digest(&blob);
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            blob,
            hash,
            created_at_ms: epoch_ms(),
        }
    }
}

/// Content digest used for deployment identity: SHA-256 truncated to
/// 128 bits, rendered as 32 lowercase hex chars.
pub fn blob_digest(blob: &[u8]) -> String {
    let digest = Sha256::digest(blob);
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// How a single guest execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Ok,
    CompileFailed,
    InstantiateFailed,
    GuestTrapped,
}

/// One record per completed request execution. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeMetric {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub deployment_id: Uuid,
    /// Guest-visible request path (ingress prefix already stripped).
    pub request_url: String,
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub outcome: ExecutionOutcome,
}

/// Current Unix epoch in milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Blob bytes serialize as base64 strings in JSON to keep persisted
/// records and API payloads compact and valid UTF-8.
mod serde_bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
