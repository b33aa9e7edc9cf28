//! One-shot runtime workers.
//!
//! A [`RuntimeWorker`] processes exactly one wire request: it resolves
//! the endpoint and its active deployment, compiles the blob (or takes a
//! cache hit), instantiates the guest with the per-request `env` ABI and
//! a WASI context, runs it to natural termination, emits a runtime
//! metric, and writes the compilation artifact back to the cache.
//! `execute` consumes the worker; nothing survives into a second request.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;
use wasmtime::{Engine, Linker, Module, Store, StoreLimitsBuilder};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

use reef_core::config::RuntimeSettings;
use reef_core::types::{epoch_ms, Endpoint, ExecutionOutcome, RuntimeMetric};
use reef_core::wire::{WireRequest, WireResponse};
use reef_state::MetadataStore;

use crate::cache::ModuleCache;
use crate::host::{self, HostState, RequestModule};
use crate::{Result, RuntimeError};

/// Shared runtime context: the wasmtime engine, the module cache, the
/// metadata store, and the guest sandbox settings.
///
/// Cheap to clone; one `RuntimeHost` serves the whole process and mints
/// a fresh [`RuntimeWorker`] per request.
#[derive(Clone)]
pub struct RuntimeHost {
    engine: Engine,
    cache: Arc<ModuleCache>,
    store: MetadataStore,
    settings: RuntimeSettings,
}

impl RuntimeHost {
    pub fn new(store: MetadataStore, settings: RuntimeSettings) -> Self {
        let cache = Arc::new(ModuleCache::new(settings.cache_max_entries));
        Self {
            engine: Engine::default(),
            cache,
            store,
            settings,
        }
    }

    /// Mint a one-shot worker for a single request.
    pub fn spawn_worker(&self) -> RuntimeWorker {
        RuntimeWorker {
            engine: self.engine.clone(),
            cache: self.cache.clone(),
            store: self.store.clone(),
            settings: self.settings.clone(),
            started: Instant::now(),
            started_at_ms: epoch_ms(),
        }
    }

    /// The shared module cache.
    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }
}

/// Ephemeral execution context for exactly one request.
pub struct RuntimeWorker {
    engine: Engine,
    cache: Arc<ModuleCache>,
    store: MetadataStore,
    settings: RuntimeSettings,
    started: Instant,
    started_at_ms: u64,
}

impl RuntimeWorker {
    /// Execute one wire request to completion.
    ///
    /// Returns `Err` only when no response can be produced at all (bad
    /// endpoint id, store miss); the caller lets the ingress deadline
    /// handle those. Guest-side failures yield an `Ok` response with
    /// status 500 and the failure mode recorded in the metric.
    pub fn execute(self, request: WireRequest) -> Result<WireResponse> {
        let endpoint_id = Uuid::parse_str(&request.endpoint_id)
            .map_err(|_| RuntimeError::BadEndpointId(request.endpoint_id.clone()))?;
        let endpoint = self
            .store
            .get_endpoint(endpoint_id)?
            .ok_or(RuntimeError::EndpointNotFound(endpoint_id))?;
        let deploy_id = endpoint
            .active_deployment_id
            .ok_or(RuntimeError::NoActiveDeployment(endpoint_id))?;
        let deploy = self
            .store
            .get_deployment(deploy_id)?
            .ok_or(RuntimeError::DeploymentNotFound(deploy_id))?;

        let request_id = request.id.clone();
        let request_url = request.url.clone();
        let request_module = RequestModule::new(request.to_guest_bytes());

        let cached = self.cache.get(endpoint.id);
        if cached.is_none() {
            debug!(endpoint = %endpoint.id, "no cache hit, compiling module");
        }
        let compiled = match cached {
            Some(module) => Ok(module),
            None => Module::new(&self.engine, &deploy.blob),
        };

        let (outcome, response_bytes) = match compiled {
            Err(e) => {
                warn!(endpoint = %endpoint.id, error = %e, "compiling module failed");
                (ExecutionOutcome::CompileFailed, None)
            }
            Ok(module) => {
                let (outcome, request_module) =
                    self.run_guest(&module, &endpoint, request_module);
                // Write the artifact back under the endpoint id; a
                // concurrent compile may race us and the last write wins.
                self.cache.put(endpoint.id, module);
                (outcome, request_module.into_response())
            }
        };

        let status_code = match outcome {
            ExecutionOutcome::Ok => 200,
            _ => 500,
        };

        let metric = RuntimeMetric {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            deployment_id: deploy.id,
            request_url,
            started_at_ms: self.started_at_ms,
            duration_ms: self.started.elapsed().as_millis() as u64,
            outcome,
        };
        if let Err(e) = self.store.create_runtime_metric(&metric) {
            warn!(error = %e, "failed to create runtime metric");
        }

        Ok(WireResponse {
            request_id,
            status_code,
            body: response_bytes.unwrap_or_default(),
        })
    }

    /// Instantiate the guest and run it to natural termination.
    ///
    /// Always hands the request module back so partial response bytes
    /// survive a trap.
    fn run_guest(
        &self,
        module: &Module,
        endpoint: &Endpoint,
        request_module: RequestModule,
    ) -> (ExecutionOutcome, RequestModule) {
        let wasi = match self.build_wasi(endpoint, &request_module) {
            Ok(wasi) => wasi,
            Err(e) => {
                warn!(endpoint = %endpoint.id, error = %e, "failed to build wasi context");
                return (ExecutionOutcome::InstantiateFailed, request_module);
            }
        };

        let limiter = StoreLimitsBuilder::new()
            .memory_size(self.settings.guest_memory_limit)
            .table_elements(10_000)
            .build();
        let mut store = Store::new(
            &self.engine,
            HostState {
                wasi,
                request: request_module,
                limiter,
            },
        );
        store.limiter(|state| &mut state.limiter);

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        let linked = preview1::add_to_linker_sync(&mut linker, |state: &mut HostState| {
            &mut state.wasi
        })
        .and_then(|_| host::add_to_linker(&mut linker));
        if let Err(e) = linked {
            warn!(error = %e, "failed to set up linker");
            return (ExecutionOutcome::InstantiateFailed, store.into_data().request);
        }

        let instance = match linker.instantiate(&mut store, module) {
            Ok(instance) => instance,
            Err(e) => {
                warn!(endpoint = %endpoint.id, error = %e, "failed to instantiate guest module");
                return (ExecutionOutcome::InstantiateFailed, store.into_data().request);
            }
        };

        let outcome = match instance.get_typed_func::<(), ()>(&mut store, "_start") {
            Ok(start) => match start.call(&mut store, ()) {
                Ok(()) => ExecutionOutcome::Ok,
                Err(trap) => match trap.downcast_ref::<wasmtime_wasi::I32Exit>() {
                    // proc_exit(0) is the guest's normal way out.
                    Some(exit) if exit.0 == 0 => ExecutionOutcome::Ok,
                    Some(exit) => {
                        warn!(endpoint = %endpoint.id, code = exit.0, "guest exited nonzero");
                        ExecutionOutcome::GuestTrapped
                    }
                    None => {
                        warn!(endpoint = %endpoint.id, error = %trap, "guest trapped");
                        ExecutionOutcome::GuestTrapped
                    }
                },
            },
            // No `_start` export: any wasm start section already ran at
            // instantiation, which counts as natural termination.
            Err(_) => ExecutionOutcome::Ok,
        };

        let request_module = store.into_data().request;
        let stderr = request_module.guest_stderr();
        if !stderr.is_empty() {
            debug!(endpoint = %endpoint.id, "guest stderr: {}", String::from_utf8_lossy(&stderr));
        }
        (outcome, request_module)
    }

    /// Build the guest's WASI context: request length as the single
    /// startup argument, the endpoint environment, a sandboxed root
    /// mount, network dial/listen permission, and piped stdio.
    fn build_wasi(
        &self,
        endpoint: &Endpoint,
        request_module: &RequestModule,
    ) -> anyhow::Result<WasiP1Ctx> {
        let (stdout, stderr) = request_module.stdio_pipes();
        let request_len = request_module.request_len().to_string();
        let mut builder = WasiCtxBuilder::new();
        builder
            .args(&["reef", request_len.as_str()])
            .stdout(stdout)
            .stderr(stderr)
            .preopened_dir(&self.settings.guest_root, "/", DirPerms::all(), FilePerms::all())?
            .inherit_network()
            .allow_ip_name_lookup(true);
        for (key, value) in &endpoint.environment {
            builder.env(key, value);
        }
        Ok(builder.build_p1())
    }
}
