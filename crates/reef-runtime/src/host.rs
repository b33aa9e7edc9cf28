//! Per-request host ABI exposed to guests under the `env` namespace.
//!
//! Each request gets one [`RequestModule`] carrying the serialized wire
//! request and collecting the guest's response bytes:
//!
//! - `env.write_request(offset)` — host copies the request bytes into
//!   guest linear memory at `offset`. The guest learns the required
//!   length from its first startup argument and allocates before calling.
//! - `env.write_response(offset, size)` — host reads `size` bytes at
//!   `offset` and retains them as the response. Repeated calls overwrite;
//!   only the last call's bytes survive.
//!
//! Guest stdio is routed into in-memory pipes held on the request module
//! so a later version can collect guest logs without an ABI change.

use wasmtime::{Caller, Linker};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::WasiP1Ctx;

/// Captured stdio is capped per stream; anything beyond is dropped.
const STDIO_CAPACITY: usize = 64 * 1024;

/// Per-request host object backing the `env` ABI.
pub struct RequestModule {
    request_bytes: Vec<u8>,
    response_bytes: Option<Vec<u8>>,
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

impl RequestModule {
    /// Create a request module holding the serialized wire request.
    pub fn new(request_bytes: Vec<u8>) -> Self {
        Self {
            request_bytes,
            response_bytes: None,
            stdout: MemoryOutputPipe::new(STDIO_CAPACITY),
            stderr: MemoryOutputPipe::new(STDIO_CAPACITY),
        }
    }

    /// Length of the serialized request, passed to the guest as its
    /// first startup argument (decimal).
    pub fn request_len(&self) -> usize {
        self.request_bytes.len()
    }

    /// Pipe handles for wiring guest stdio into the WASI context.
    pub fn stdio_pipes(&self) -> (MemoryOutputPipe, MemoryOutputPipe) {
        (self.stdout.clone(), self.stderr.clone())
    }

    /// Whatever the guest wrote to stderr (for debug surfacing).
    pub fn guest_stderr(&self) -> bytes::Bytes {
        self.stderr.contents()
    }

    /// Consume the module, releasing both buffers and yielding the
    /// response bytes, if the guest produced any.
    pub fn into_response(self) -> Option<Vec<u8>> {
        self.response_bytes
    }
}

/// State held in each worker's `Store`: the WASI context plus the
/// per-request ABI object and the resource limiter.
pub struct HostState {
    pub wasi: WasiP1Ctx,
    pub request: RequestModule,
    pub limiter: wasmtime::StoreLimits,
}

/// Register `env.write_request` and `env.write_response` on a linker.
pub fn add_to_linker(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
    linker.func_wrap(
        "env",
        "write_request",
        |mut caller: Caller<'_, HostState>, offset: u32| -> wasmtime::Result<()> {
            let memory = caller
                .get_export("memory")
                .and_then(|e| e.into_memory())
                .ok_or_else(|| wasmtime::Error::msg("memory export not found"))?;

            let (mem, state) = memory.data_and_store_mut(&mut caller);
            let request = &state.request.request_bytes;
            let start = offset as usize;
            let end = start
                .checked_add(request.len())
                .ok_or_else(|| wasmtime::Error::msg("write_request offset overflow"))?;
            mem.get_mut(start..end)
                .ok_or_else(|| wasmtime::Error::msg("write_request out of bounds"))?
                .copy_from_slice(request);
            Ok(())
        },
    )?;

    linker.func_wrap(
        "env",
        "write_response",
        |mut caller: Caller<'_, HostState>, offset: u32, size: u32| -> wasmtime::Result<()> {
            let memory = caller
                .get_export("memory")
                .and_then(|e| e.into_memory())
                .ok_or_else(|| wasmtime::Error::msg("memory export not found"))?;

            let start = offset as usize;
            let end = start
                .checked_add(size as usize)
                .ok_or_else(|| wasmtime::Error::msg("write_response offset overflow"))?;
            let response = memory
                .data(&caller)
                .get(start..end)
                .ok_or_else(|| wasmtime::Error::msg("write_response out of bounds"))?
                .to_vec();
            caller.data_mut().request.response_bytes = Some(response);
            Ok(())
        },
    )?;

    Ok(())
}
