//! Subscriber installation for binaries and tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default directive when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install a `fmt` subscriber on stderr filtered by `RUST_LOG`.
///
/// Stdout is left to the program's own output. Calling this more than once is
/// harmless: later calls keep the first subscriber.
pub fn init_tracing() {
    init_tracing_with_default(DEFAULT_FILTER);
}

/// Same as [`init_tracing`] with a caller-chosen fallback directive.
pub fn init_tracing_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();

    if result.is_err() {
        tracing::trace!("Tracing subscriber already installed");
    }
}
