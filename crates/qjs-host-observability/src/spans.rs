//! Span constructors for runtime lifecycle events.
//!
//! Keeping span names and field names in one place keeps both backends
//! filterable the same way (`RUST_LOG=qjs_host=debug`, `runtime_id=rt-3`).

use qjs_host_core::RuntimeId;
use std::path::Path;
use tracing::Span;

pub fn create_runtime(backend: &'static str) -> Span {
    tracing::debug_span!("create_runtime", backend)
}

pub fn eval_script(runtime_id: RuntimeId, source_len: usize) -> Span {
    tracing::debug_span!("eval_script", runtime_id = %runtime_id, source_len)
}

pub fn free_runtime(runtime_id: RuntimeId) -> Span {
    tracing::debug_span!("free_runtime", runtime_id = %runtime_id)
}

pub fn load_library(path: &Path) -> Span {
    tracing::info_span!("load_library", path = %path.display())
}

/// Span for a host function invoked from script.
pub fn host_call(runtime_id: RuntimeId, function: &str) -> Span {
    tracing::debug_span!("host_call", runtime_id = %runtime_id, function)
}
