//! Runtime identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static RUNTIME_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a runtime handle.
///
/// Used as the `runtime_id` field on spans and to reject value handles that
/// were produced by a different runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeId(u64);

impl RuntimeId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(RUNTIME_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt-{}", self.0)
    }
}
