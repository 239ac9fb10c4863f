//! Runtime handles over the shim library

use crate::api::{FunctionTable, Handle, NativeCallback, RawValue, TAG_EXCEPTION, ToBoolFn};
use crate::library::{NativeConfig, NativeLibrary};
use qjs_host_core::{EngineHost, HostError, Result, RuntimeId, ValueTag};
use qjs_host_observability::spans;
use std::cell::Cell;
use std::ffi::{CStr, CString, c_char, c_int};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

/// What `quickjs_get_exception` yields when nothing was thrown.
const NO_EXCEPTION: &str = "null";

/// Value handle returned by a [`NativeRuntime`].
///
/// The shim exposes no way to release a value; handles are reclaimed with
/// the runtime. A handle is not `Copy`: [`EngineHost::set_global`] hands the
/// value to the engine and consumes it.
///
/// ```compile_fail
/// use qjs_host_native::{EngineHost, NativeRuntime};
///
/// let runtime = NativeRuntime::create_default().unwrap();
/// let value = runtime.new_string("once").unwrap();
/// runtime.set_global("a", value).unwrap();
/// runtime.set_global("b", value).unwrap();
/// ```
pub struct NativeValue<'rt> {
    raw: RawValue,
    runtime_id: RuntimeId,
    tag: ValueTag,
    _runtime: PhantomData<&'rt NativeRuntime>,
}

impl NativeValue<'_> {
    pub fn tag(&self) -> ValueTag {
        self.tag
    }

    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }
}

impl fmt::Debug for NativeValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeValue")
            .field("runtime_id", &self.runtime_id)
            .field("tag", &self.tag)
            .finish()
    }
}

/// One engine instance created by the shim's `quickjs_create`.
///
/// ```compile_fail
/// use qjs_host_native::{EngineHost, NativeRuntime};
///
/// let runtime = NativeRuntime::create_default().unwrap();
/// let value = runtime.eval("1 + 1").unwrap();
/// runtime.free();
/// let _ = runtime.coerce_int(&value);
/// ```
pub struct NativeRuntime {
    handle: NonNull<std::ffi::c_void>,
    library: Arc<NativeLibrary>,
    id: RuntimeId,
    pending: Cell<bool>,
}

impl NativeRuntime {
    /// Create a runtime on an already loaded library.
    pub fn create(library: Arc<NativeLibrary>) -> Result<Self> {
        let span = spans::create_runtime("native");
        let _guard = span.enter();

        // SAFETY: `create` has no preconditions.
        let handle = unsafe { (library.table.create)() };
        let handle = NonNull::new(handle).ok_or_else(|| {
            HostError::Initialization("quickjs_create returned a null runtime".to_string())
        })?;

        let id = RuntimeId::next();
        tracing::debug!(runtime_id = %id, library = %library.path().display(), "Runtime created");
        Ok(Self {
            handle,
            library,
            id,
            pending: Cell::new(false),
        })
    }

    /// Create a runtime on the process-wide library located by `config`.
    pub fn create_with_config(config: &NativeConfig) -> Result<Self> {
        Self::create(NativeLibrary::global(config)?)
    }

    /// Create a runtime on the process-wide library in its default location.
    pub fn create_default() -> Result<Self> {
        Self::create_with_config(&NativeConfig::default())
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn library(&self) -> &Arc<NativeLibrary> {
        &self.library
    }

    /// Release the runtime. Equivalent to dropping it.
    pub fn free(self) {
        drop(self);
    }

    /// Create a JS function backed by a C-ABI callback.
    ///
    /// `length` is the function's declared arity (`fn.length` in script).
    pub fn new_function(
        &self,
        name: &str,
        length: i32,
        callback: NativeCallback,
    ) -> Result<NativeValue<'_>> {
        let new_function = entry(self.table().new_function, "quickjs_new_function")?;
        let name = c_string("function name", name)?;
        // SAFETY: live handle, NUL-terminated name.
        let raw = unsafe { new_function(self.raw_handle(), name.as_ptr(), length, callback) };
        self.adopt(raw)
    }

    fn table(&self) -> &FunctionTable {
        &self.library.table
    }

    fn raw_handle(&self) -> Handle {
        self.handle.as_ptr()
    }

    fn adopt(&self, raw: RawValue) -> Result<NativeValue<'_>> {
        if raw.tag == TAG_EXCEPTION {
            // Constructors only raise when the engine is out of memory.
            let message = self.take_message().unwrap_or_else(|| "unknown error".to_string());
            return Err(HostError::engine("Failed to construct value", message));
        }
        Ok(self.wrap(raw))
    }

    fn wrap(&self, raw: RawValue) -> NativeValue<'_> {
        NativeValue {
            raw,
            runtime_id: self.id,
            tag: raw.value_tag(),
            _runtime: PhantomData,
        }
    }

    /// Wrap the result of an evaluating call, parking a raised exception.
    fn settle(&self, raw: RawValue) -> NativeValue<'_> {
        let value = self.wrap(raw);
        // SAFETY: live handle.
        if unsafe { (self.table().is_exception)(self.raw_handle(), raw) } {
            tracing::debug!("Evaluation raised");
            self.pending.set(true);
        }
        value
    }

    fn discard_pending(&self) {
        if self.pending.replace(false) {
            tracing::warn!(runtime_id = %self.id, "Discarding exception that was never fetched");
            let _ = self.take_message();
        }
    }

    /// Fetch and clear the engine's current exception. `None` when the shim
    /// cannot report exceptions.
    fn take_message(&self) -> Option<String> {
        let get_exception = self.table().get_exception?;
        // SAFETY: live handle.
        let message = unsafe { get_exception(self.raw_handle()) };
        // SAFETY: non-null results are NUL-terminated strings owned by the engine.
        unsafe { read_c_str(message) }
    }

    /// Exception raised by the conversion that just ran.
    ///
    /// Only detectable while no evaluation exception is parked; otherwise
    /// fetching would consume it.
    fn conversion_error(&self) -> Option<HostError> {
        if self.pending.get() {
            return None;
        }
        self.take_message()
            .filter(|message| message != NO_EXCEPTION)
            .map(HostError::Coercion)
    }

    fn check(&self, value: &NativeValue<'_>) -> Result<RawValue> {
        if value.runtime_id != self.id {
            return Err(HostError::ForeignValue {
                runtime: self.id.to_string(),
                value_runtime: value.runtime_id.to_string(),
            });
        }
        if value.raw.tag == TAG_EXCEPTION {
            return Err(HostError::ExceptionValue);
        }
        Ok(value.raw)
    }
}

impl EngineHost for NativeRuntime {
    type Value<'rt> = NativeValue<'rt>;

    fn eval(&self, source: &str) -> Result<NativeValue<'_>> {
        let span = spans::eval_script(self.id, source.len());
        let _guard = span.enter();

        let source = c_string("script source", source)?;
        self.discard_pending();
        // SAFETY: live handle, NUL-terminated source.
        let raw = unsafe { (self.table().eval)(self.raw_handle(), source.as_ptr()) };
        Ok(self.settle(raw))
    }

    fn is_exception(&self, value: &NativeValue<'_>) -> bool {
        value.runtime_id == self.id && value.raw.tag == TAG_EXCEPTION
    }

    fn value_tag(&self, value: &NativeValue<'_>) -> ValueTag {
        value.tag
    }

    fn get_exception(&self) -> Result<String> {
        if !self.pending.get() {
            return Err(HostError::NoPendingException);
        }
        entry(self.table().get_exception, "quickjs_get_exception")?;
        self.pending.set(false);
        self.take_message().ok_or_else(|| {
            HostError::engine("Failed to read exception", "quickjs_get_exception returned null")
        })
    }

    fn coerce_string(&self, value: &NativeValue<'_>) -> Result<String> {
        let raw = self.check(value)?;
        // SAFETY: live handle, value produced by this runtime.
        let text = unsafe { (self.table().to_cstring)(self.raw_handle(), raw) };
        // SAFETY: as above.
        match unsafe { read_c_str(text) } {
            Some(text) => Ok(text),
            None => Err(HostError::Coercion(
                self.take_message().unwrap_or_else(|| "ToString failed".to_string()),
            )),
        }
    }

    /// JS `ToBoolean`. It cannot throw in script; a negative status from
    /// an `int`-returning shim is still reported.
    fn coerce_bool(&self, value: &NativeValue<'_>) -> Result<bool> {
        let raw = self.check(value)?;
        match self.table().to_bool {
            // SAFETY: live handle, value produced by this runtime.
            ToBoolFn::Bool(to_bool) => Ok(unsafe { to_bool(self.raw_handle(), raw) }),
            ToBoolFn::Int(to_bool) => {
                // SAFETY: as above.
                let status = unsafe { to_bool(self.raw_handle(), raw) };
                if status < 0 {
                    return Err(HostError::Coercion(
                        self.take_message().unwrap_or_else(|| "ToBool failed".to_string()),
                    ));
                }
                Ok(status != 0)
            }
        }
    }

    fn coerce_int(&self, value: &NativeValue<'_>) -> Result<i32> {
        let raw = self.check(value)?;
        // SAFETY: live handle, value produced by this runtime.
        let result = unsafe { (self.table().to_int)(self.raw_handle(), raw) };
        match self.conversion_error() {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    fn new_undefined(&self) -> Result<NativeValue<'_>> {
        let new_undefined = entry(self.table().new_undefined, "quickjs_new_undefined")?;
        // SAFETY: live handle.
        self.adopt(unsafe { new_undefined(self.raw_handle()) })
    }

    fn new_null(&self) -> Result<NativeValue<'_>> {
        let new_null = entry(self.table().new_null, "quickjs_new_null")?;
        // SAFETY: live handle.
        self.adopt(unsafe { new_null(self.raw_handle()) })
    }

    fn new_bool(&self, value: bool) -> Result<NativeValue<'_>> {
        let constructor = if value {
            entry(self.table().new_true, "quickjs_new_true")?
        } else {
            entry(self.table().new_false, "quickjs_new_false")?
        };
        // SAFETY: live handle.
        self.adopt(unsafe { constructor(self.raw_handle()) })
    }

    fn new_string(&self, value: &str) -> Result<NativeValue<'_>> {
        let new_string = entry(self.table().new_string, "quickjs_new_string")?;
        let value = c_string("string", value)?;
        // SAFETY: live handle, NUL-terminated string copied by the engine.
        self.adopt(unsafe { new_string(self.raw_handle(), value.as_ptr()) })
    }

    fn new_int(&self, value: i32) -> Result<NativeValue<'_>> {
        let new_int = entry(self.table().new_int, "quickjs_new_int")?;
        // SAFETY: live handle.
        self.adopt(unsafe { new_int(self.raw_handle(), value as c_int) })
    }

    fn new_float(&self, value: f64) -> Result<NativeValue<'_>> {
        let new_double = entry(self.table().new_double, "quickjs_new_double")?;
        // SAFETY: live handle.
        self.adopt(unsafe { new_double(self.raw_handle(), value) })
    }

    fn parse_json(&self, json: &str) -> Result<NativeValue<'_>> {
        let new_json = entry(self.table().new_json, "quickjs_new_json")?;
        let json = c_string("JSON document", json)?;
        self.discard_pending();
        // SAFETY: live handle, NUL-terminated document.
        let raw = unsafe { new_json(self.raw_handle(), json.as_ptr()) };
        Ok(self.settle(raw))
    }

    fn json_stringify(&self, value: &NativeValue<'_>) -> Result<Option<String>> {
        let stringify = entry(self.table().json_stringify, "quickjs_js_JSONStringify")?;
        let raw = self.check(value)?;
        // SAFETY: live handle, value produced by this runtime.
        let json = unsafe { stringify(self.raw_handle(), raw) };
        // SAFETY: as above.
        match unsafe { read_c_str(json) } {
            // JSON.stringify returns undefined for values without a JSON form.
            Some(json) if json == "undefined" => Ok(None),
            Some(json) => Ok(Some(json)),
            None => Err(HostError::Exception(
                self.take_message().unwrap_or_else(|| "JSON.stringify failed".to_string()),
            )),
        }
    }

    fn set_global(&self, name: &str, value: NativeValue<'_>) -> Result<()> {
        let set_property = entry(self.table().set_property_str, "quickjs_set_property_str")?;
        let raw = self.check(&value)?;
        let name = c_string("global name", name)?;
        // SAFETY: live handle; the engine takes ownership of `raw`, and
        // `value` is consumed so no alias remains.
        let status = unsafe { set_property(self.raw_handle(), name.as_ptr(), raw) };
        if status < 0 {
            let message = self
                .take_message()
                .unwrap_or_else(|| format!("status {status}"));
            return Err(HostError::Exception(message));
        }
        Ok(())
    }
}

impl fmt::Debug for NativeRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRuntime")
            .field("id", &self.id)
            .field("library", &self.library.path())
            .finish_non_exhaustive()
    }
}

impl Drop for NativeRuntime {
    fn drop(&mut self) {
        let span = spans::free_runtime(self.id);
        let _guard = span.enter();
        if self.pending.get() {
            tracing::warn!("Freeing runtime with an exception that was never fetched");
        }
        // SAFETY: the handle came from `create` and is released only here.
        unsafe { (self.library.table.free)(self.handle.as_ptr()) };
        tracing::debug!("Runtime freed");
    }
}

/// Entry of the function table, or `MissingSymbol` when the shim lacks it.
fn entry<T: Copy>(entry: Option<T>, symbol: &str) -> Result<T> {
    entry.ok_or_else(|| HostError::MissingSymbol {
        symbol: symbol.to_string(),
        source: "not exported by the loaded library".into(),
    })
}

fn c_string(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| HostError::InvalidArgument(format!("{what} contains an interior NUL byte")))
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
