//! Runtime configuration
//!
//! Limits applied to the underlying `rquickjs::Runtime` when a [`JsRuntime`]
//! is created.
//!
//! [`JsRuntime`]: crate::JsRuntime

use qjs_host_core::{HostError, Result};
use rquickjs::Runtime;
use serde::{Deserialize, Serialize};

/// Configuration for QuickJS runtime options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickJsConfig {
    /// Maximum memory limit in bytes (None = no limit)
    pub memory_limit: Option<u64>,

    /// Maximum stack size in bytes (None = default)
    pub max_stack_size: Option<u64>,

    /// Bytes allocated before garbage collection runs (None = default)
    pub gc_threshold: Option<u64>,

    /// Evaluate scripts in strict mode
    pub strict: bool,
}

impl QuickJsConfig {
    /// Create a new QuickJS configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set memory limit in bytes
    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set maximum stack size in bytes
    pub fn with_max_stack_size(mut self, size: Option<u64>) -> Self {
        self.max_stack_size = size;
        self
    }

    /// Set garbage collection threshold
    pub fn with_gc_threshold(mut self, threshold: Option<u64>) -> Self {
        self.gc_threshold = threshold;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub(crate) fn apply(&self, runtime: &Runtime) -> Result<()> {
        if let Some(limit) = self.memory_limit {
            runtime.set_memory_limit(to_usize("memory_limit", limit)?);
        }
        if let Some(size) = self.max_stack_size {
            runtime.set_max_stack_size(to_usize("max_stack_size", size)?);
        }
        if let Some(threshold) = self.gc_threshold {
            runtime.set_gc_threshold(to_usize("gc_threshold", threshold)?);
        }
        Ok(())
    }
}

fn to_usize(field: &str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        HostError::InvalidArgument(format!("{field} {value} does not fit this platform"))
    })
}
