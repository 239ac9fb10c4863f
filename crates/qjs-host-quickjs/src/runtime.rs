//! Embedded QuickJS runtime handle
//!
//! [`JsRuntime`] owns one `rquickjs` runtime and its full context. It is the
//! single owner of the engine state: creating it allocates, dropping it (or
//! calling [`JsRuntime::free`]) releases everything exactly once.

use crate::config::QuickJsConfig;
use crate::convert::{coerce, describe_exception, engine_error};
use crate::value::{JsValue, tag_of};
use qjs_host_core::{EngineHost, HostError, Result, RuntimeId, ValueTag};
use qjs_host_observability::spans;
use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Persistent, Runtime, Value};
use std::cell::RefCell;
use std::fmt;

/// Allocator statistics reported by [`JsRuntime::memory_usage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub malloc_size: i64,
    pub memory_used_size: i64,
    pub obj_count: i64,
}

/// One isolated JS execution context.
///
/// Not `Send`: a runtime and its values stay on the thread that created them.
///
/// Values borrow the runtime, so freeing it while a value is alive does not
/// compile:
///
/// ```compile_fail
/// use qjs_host_quickjs::{EngineHost, JsRuntime};
///
/// let runtime = JsRuntime::create().unwrap();
/// let value = runtime.eval("1 + 1").unwrap();
/// runtime.free();
/// let _ = runtime.coerce_int(&value);
/// ```
pub struct JsRuntime {
    // Fields drop in declaration order; engine references go before the
    // context and runtime that own them.
    pub(crate) pending: RefCell<Option<Persistent<Value<'static>>>>,
    pub(crate) id: RuntimeId,
    pub(crate) config: QuickJsConfig,
    pub(crate) context: Context,
    pub(crate) runtime: Runtime,
}

impl JsRuntime {
    /// Allocate a runtime with default limits.
    pub fn create() -> Result<Self> {
        Self::create_with_config(QuickJsConfig::default())
    }

    /// Allocate a runtime and apply `config` before the context is built.
    pub fn create_with_config(config: QuickJsConfig) -> Result<Self> {
        let span = spans::create_runtime("embedded");
        let _guard = span.enter();

        let runtime = Runtime::new().map_err(|e| {
            HostError::Initialization(format!("Failed to allocate QuickJS runtime: {e}"))
        })?;
        config.apply(&runtime)?;
        let context = Context::full(&runtime).map_err(|e| {
            HostError::Initialization(format!("Failed to allocate QuickJS context: {e}"))
        })?;

        let id = RuntimeId::next();
        tracing::debug!(runtime_id = %id, ?config, "Runtime created");

        Ok(Self {
            pending: RefCell::new(None),
            id,
            config,
            context,
            runtime,
        })
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn config(&self) -> &QuickJsConfig {
        &self.config
    }

    /// Release the runtime. Equivalent to dropping it.
    pub fn free(self) {
        drop(self);
    }

    /// JS `ToNumber` conversion.
    pub fn coerce_float(&self, value: &JsValue<'_>) -> Result<f64> {
        self.with_value(value, |ctx, value| coerce::<f64>(ctx, value))
    }

    /// Read a binding of the global object.
    pub fn get_global(&self, name: &str) -> Result<JsValue<'_>> {
        self.construct(|ctx| ctx.globals().get::<_, Value>(name))
    }

    /// Force a full garbage collection.
    pub fn run_gc(&self) {
        self.runtime.run_gc();
    }

    pub fn memory_usage(&self) -> MemoryStats {
        let usage = self.runtime.memory_usage();
        MemoryStats {
            malloc_size: usage.malloc_size,
            memory_used_size: usage.memory_used_size,
            obj_count: usage.obj_count,
        }
    }

    fn adopt<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> JsValue<'_> {
        JsValue::live(self.id, tag_of(&value), Persistent::save(ctx, value))
    }

    /// Park the context's pending exception and hand back the marker.
    fn raise<'js>(&self, ctx: &Ctx<'js>) -> JsValue<'_> {
        let exception = ctx.catch();
        *self.pending.borrow_mut() = Some(Persistent::save(ctx, exception));
        JsValue::exception(self.id)
    }

    fn discard_pending(&self) {
        if self.pending.borrow_mut().take().is_some() {
            tracing::warn!(runtime_id = %self.id, "Discarding exception that was never fetched");
        }
    }

    fn construct(
        &self,
        build: impl for<'js> FnOnce(&Ctx<'js>) -> rquickjs::Result<Value<'js>>,
    ) -> Result<JsValue<'_>> {
        self.context.with(|ctx| match build(&ctx) {
            Ok(value) => Ok(self.adopt(&ctx, value)),
            Err(err) => Err(engine_error(&ctx, "Failed to construct value", err)),
        })
    }

    pub(crate) fn with_value<R>(
        &self,
        value: &JsValue<'_>,
        use_value: impl for<'js> FnOnce(&Ctx<'js>, Value<'js>) -> Result<R>,
    ) -> Result<R> {
        if value.runtime_id() != self.id {
            return Err(HostError::ForeignValue {
                runtime: self.id.to_string(),
                value_runtime: value.runtime_id().to_string(),
            });
        }
        let persistent = value.persistent().cloned().ok_or(HostError::ExceptionValue)?;

        self.context.with(|ctx| {
            let restored = persistent
                .restore(&ctx)
                .map_err(|e| HostError::engine("Failed to restore value", e.to_string()))?;
            use_value(&ctx, restored)
        })
    }
}

impl EngineHost for JsRuntime {
    type Value<'rt> = JsValue<'rt>;

    fn eval(&self, source: &str) -> Result<JsValue<'_>> {
        let span = spans::eval_script(self.id, source.len());
        let _guard = span.enter();

        self.discard_pending();
        let mut options = EvalOptions::default();
        options.strict = self.config.strict;

        self.context.with(|ctx| {
            match ctx.eval_with_options::<Value, _>(source, options) {
                Ok(value) => Ok(self.adopt(&ctx, value)),
                Err(rquickjs::Error::Exception) => {
                    tracing::debug!("Evaluation raised");
                    Ok(self.raise(&ctx))
                }
                Err(err) => Err(HostError::engine("Failed to evaluate script", err.to_string())),
            }
        })
    }

    fn is_exception(&self, value: &JsValue<'_>) -> bool {
        value.runtime_id() == self.id && value.is_exception_marker()
    }

    fn value_tag(&self, value: &JsValue<'_>) -> ValueTag {
        value.tag()
    }

    fn get_exception(&self) -> Result<String> {
        let exception = self
            .pending
            .borrow_mut()
            .take()
            .ok_or(HostError::NoPendingException)?;

        self.context.with(|ctx| {
            let exception = exception
                .restore(&ctx)
                .map_err(|e| HostError::engine("Failed to restore exception", e.to_string()))?;
            Ok(describe_exception(&ctx, exception))
        })
    }

    fn coerce_string(&self, value: &JsValue<'_>) -> Result<String> {
        self.with_value(value, |ctx, value| coerce::<String>(ctx, value))
    }

    fn coerce_bool(&self, value: &JsValue<'_>) -> Result<bool> {
        self.with_value(value, |ctx, value| coerce::<bool>(ctx, value))
    }

    fn coerce_int(&self, value: &JsValue<'_>) -> Result<i32> {
        self.with_value(value, |ctx, value| coerce::<i32>(ctx, value))
    }

    fn new_undefined(&self) -> Result<JsValue<'_>> {
        self.construct(|ctx| Ok(Value::new_undefined(ctx.clone())))
    }

    fn new_null(&self) -> Result<JsValue<'_>> {
        self.construct(|ctx| Ok(Value::new_null(ctx.clone())))
    }

    fn new_bool(&self, value: bool) -> Result<JsValue<'_>> {
        self.construct(|ctx| Ok(Value::new_bool(ctx.clone(), value)))
    }

    fn new_string(&self, value: &str) -> Result<JsValue<'_>> {
        self.construct(|ctx| {
            rquickjs::String::from_str(ctx.clone(), value).map(|s| s.into_value())
        })
    }

    fn new_int(&self, value: i32) -> Result<JsValue<'_>> {
        self.construct(|ctx| Ok(Value::new_int(ctx.clone(), value)))
    }

    fn new_float(&self, value: f64) -> Result<JsValue<'_>> {
        self.construct(|ctx| Ok(Value::new_float(ctx.clone(), value)))
    }

    fn parse_json(&self, json: &str) -> Result<JsValue<'_>> {
        self.discard_pending();
        self.context.with(|ctx| match ctx.json_parse(json) {
            Ok(value) => Ok(self.adopt(&ctx, value)),
            Err(rquickjs::Error::Exception) => Ok(self.raise(&ctx)),
            Err(err) => Err(HostError::engine("Failed to parse JSON", err.to_string())),
        })
    }

    fn json_stringify(&self, value: &JsValue<'_>) -> Result<Option<String>> {
        self.with_value(value, |ctx, value| match ctx.json_stringify(value) {
            Ok(Some(json)) => json
                .to_string()
                .map(Some)
                .map_err(|e| HostError::Coercion(e.to_string())),
            Ok(None) => Ok(None),
            Err(err) => Err(engine_error(ctx, "Failed to stringify value", err)),
        })
    }

    fn set_global(&self, name: &str, value: JsValue<'_>) -> Result<()> {
        self.with_value(&value, |ctx, value| {
            ctx.globals()
                .set(name, value)
                .map_err(|err| engine_error(ctx, &format!("Failed to set global `{name}`"), err))
        })
    }
}

impl fmt::Debug for JsRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsRuntime")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for JsRuntime {
    fn drop(&mut self) {
        let span = spans::free_runtime(self.id);
        let _guard = span.enter();
        if self.pending.get_mut().take().is_some() {
            tracing::warn!("Freeing runtime with an exception that was never fetched");
        }
        tracing::debug!("Runtime freed");
    }
}
