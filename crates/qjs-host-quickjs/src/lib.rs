//! Embedded QuickJS backend
//!
//! QuickJS is linked statically through `rquickjs`. [`JsRuntime`] implements
//! the [`EngineHost`] contract; values are [`JsValue`] handles scoped to the
//! runtime that produced them.
//!
//! ```
//! use qjs_host_quickjs::{EngineHost, JsRuntime};
//!
//! let runtime = JsRuntime::create()?;
//! let value = runtime.eval("var x = 40 + 2; x")?;
//! assert!(!runtime.is_exception(&value));
//! assert_eq!(runtime.coerce_int(&value)?, 42);
//! # Ok::<(), qjs_host_quickjs::HostError>(())
//! ```

pub mod config;
mod convert;
pub mod functions;
pub mod runtime;
pub mod value;

pub use config::QuickJsConfig;
pub use qjs_host_core::{EngineHost, HostError, Result, RuntimeId, ValueTag};
pub use runtime::{JsRuntime, MemoryStats};
pub use value::JsValue;
