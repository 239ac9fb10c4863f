//! Error types for the QuickJS host boundary
//!
//! Construction failures (platform, library, symbols, allocation) are fatal and
//! reported once. Script failures are not errors at this level: they travel as
//! exception value handles and are only turned into [`HostError::Exception`]
//! by the checked helpers.

use thiserror::Error;

/// Main error type for the host boundary
#[derive(Error, Debug)]
pub enum HostError {
    /// The host OS has no known shared library artifact
    #[error("Unsupported platform: {0} (supported: linux, windows, macos)")]
    UnsupportedPlatform(String),

    /// The native library file does not exist
    #[error("Native library not found: {path}")]
    LibraryNotFound { path: String },

    /// The dynamic loader rejected the native library
    #[error("Failed to load native library {path}")]
    LibraryLoad {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required entry of the native function table is missing
    #[error("Native library is missing symbol `{symbol}`")]
    MissingSymbol {
        symbol: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Runtime or context allocation failed
    #[error("Runtime initialization error: {0}")]
    Initialization(String),

    /// A script raised and the caller asked for the checked path
    #[error("Uncaught {0}")]
    Exception(String),

    /// `get_exception` was called with nothing pending
    #[error("No pending exception")]
    NoPendingException,

    /// An exception handle was passed where a regular value is required
    #[error("Value is an exception handle; fetch it with get_exception")]
    ExceptionValue,

    /// The value handle belongs to another runtime
    #[error("Value belongs to runtime {value_runtime}, not {runtime}")]
    ForeignValue { runtime: String, value_runtime: String },

    /// The engine threw while converting a value
    #[error("Coercion error: {0}")]
    Coercion(String),

    /// Invalid argument provided by the host
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other engine failure
    #[error("QuickJS error: {context}")]
    Engine {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (reading scripts, probing library files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Wrap an engine-side error with context
    pub fn engine(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Engine {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True for errors raised while constructing a runtime or loading the library.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform(_)
                | Self::LibraryNotFound { .. }
                | Self::LibraryLoad { .. }
                | Self::MissingSymbol { .. }
                | Self::Initialization(_)
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HostError>;
