//! Native QuickJS backend
//!
//! Drives a prebuilt `QuickJs` shared library through its C function table.
//! The library is located per platform, loaded once per process and shared
//! by every [`NativeRuntime`].

pub mod api;
pub mod library;
pub mod runtime;
#[cfg(test)]
mod test_shim;

pub use library::{NativeConfig, NativeLibrary, library_extension, library_path};
pub use qjs_host_core::{EngineHost, HostError, Result, RuntimeId, ValueTag};
pub use runtime::{NativeRuntime, NativeValue};
