//! reef.toml configuration.
//!
//! Loaded once at process start and passed explicitly into component
//! constructors; nothing in reef reads configuration through a global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReefConfig {
    #[serde(default)]
    pub ingress: IngressConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub runtime: RuntimeSettings,
}

/// Public HTTP ingress settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Address the `/live/…` listener binds to.
    #[serde(default = "default_ingress_addr")]
    pub listen_addr: String,
    /// Per-request deadline owned by the ingress worker. Expiry yields
    /// a 504; the runtime worker is left to run to completion.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Control-plane API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
}

/// State store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the redb database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// WASM runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Maximum number of compiled modules kept in the cache.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Host directory preopened as the guest's filesystem root.
    #[serde(default = "default_guest_root")]
    pub guest_root: PathBuf,
    /// Per-instance linear memory cap in bytes.
    #[serde(default = "default_guest_memory_limit")]
    pub guest_memory_limit: usize,
}

impl ReefConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReefConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Base URL external traffic uses to reach published endpoints.
    pub fn live_base_url(&self) -> String {
        format!("http://{}", self.ingress.listen_addr)
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_ingress_addr(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            cache_max_entries: default_cache_max_entries(),
            guest_root: default_guest_root(),
            guest_memory_limit: default_guest_memory_limit(),
        }
    }
}

fn default_ingress_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_api_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/reef")
}

fn default_cache_max_entries() -> usize {
    256
}

fn default_guest_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_guest_memory_limit() -> usize {
    64 * 1024 * 1024
}
