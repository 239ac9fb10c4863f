//! In-process implementation of the shim's C table for unit tests.
//!
//! Scripts are a tiny expression language: literals (`42`, `1.5`, `'text'`,
//! `true`, `null`, `undefined`, `Symbol()`), global names, and `throw <text>`.

use crate::api::*;
use crate::library::NativeLibrary;
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ENGINE: AtomicU64 = AtomicU64::new(1);
static FREED: Mutex<Vec<u64>> = Mutex::new(Vec::new());

/// Global name whose assignment fails, like a frozen property.
pub(crate) const READ_ONLY_GLOBAL: &str = "frozen";

struct Engine {
    id: u64,
    pending: Option<String>,
    globals: HashMap<String, RawValue>,
    // Backing storage for strings handed out as pointers.
    arena: Vec<CString>,
}

impl Engine {
    fn keep(&mut self, text: &str) -> *mut c_char {
        let text = CString::new(text).expect("test strings have no NUL");
        let ptr = text.as_ptr() as *mut c_char;
        self.arena.push(text);
        ptr
    }

    fn string(&mut self, text: &str) -> RawValue {
        let ptr = self.keep(text) as *mut c_void;
        RawValue {
            u: RawPayload { ptr },
            tag: TAG_STRING,
        }
    }

    fn throw(&mut self, message: impl Into<String>) -> RawValue {
        self.pending = Some(message.into());
        simple(TAG_EXCEPTION)
    }

    fn text_of(&self, value: RawValue) -> Option<String> {
        // SAFETY: tags are only paired with the payload this module writes.
        unsafe {
            match value.tag {
                TAG_INT => Some(value.u.int32.to_string()),
                TAG_FLOAT64 => Some(value.u.float64.to_string()),
                TAG_BOOL => Some((value.u.int32 != 0).to_string()),
                TAG_NULL => Some("null".to_string()),
                TAG_UNDEFINED => Some("undefined".to_string()),
                TAG_STRING => Some(read(value.u.ptr as *const c_char)),
                TAG_OBJECT => Some("[object Object]".to_string()),
                _ => None,
            }
        }
    }

    fn eval(&mut self, source: &str) -> RawValue {
        let source = source.trim();
        if let Some(message) = source.strip_prefix("throw ") {
            return self.throw(format!("Error: {message}"));
        }
        if let Some(value) = literal(source) {
            return value;
        }
        if source.len() > 1 && source.starts_with('\'') && source.ends_with('\'') {
            return self.string(&source[1..source.len() - 1]);
        }
        if let Some(value) = self.globals.get(source) {
            return *value;
        }
        self.throw(format!("ReferenceError: '{source}' is not defined"))
    }
}

fn simple(tag: i64) -> RawValue {
    RawValue {
        u: RawPayload { int32: 0 },
        tag,
    }
}

fn int(value: i32) -> RawValue {
    RawValue {
        u: RawPayload { int32: value },
        tag: TAG_INT,
    }
}

fn literal(source: &str) -> Option<RawValue> {
    let value = match source {
        "true" => RawValue {
            u: RawPayload { int32: 1 },
            tag: TAG_BOOL,
        },
        "false" => RawValue {
            u: RawPayload { int32: 0 },
            tag: TAG_BOOL,
        },
        "null" => simple(TAG_NULL),
        "undefined" => simple(TAG_UNDEFINED),
        "Symbol()" => simple(TAG_SYMBOL),
        _ => {
            if let Ok(value) = source.parse::<i32>() {
                int(value)
            } else {
                let value = source.parse::<f64>().ok()?;
                RawValue {
                    u: RawPayload { float64: value },
                    tag: TAG_FLOAT64,
                }
            }
        }
    };
    Some(value)
}

unsafe fn read(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

unsafe fn engine<'a>(handle: Handle) -> &'a mut Engine {
    unsafe { &mut *(handle as *mut Engine) }
}

unsafe extern "C" fn create() -> Handle {
    let engine = Engine {
        id: NEXT_ENGINE.fetch_add(1, Ordering::Relaxed),
        pending: None,
        globals: HashMap::new(),
        arena: Vec::new(),
    };
    Box::into_raw(Box::new(engine)) as Handle
}

unsafe extern "C" fn free(handle: Handle) {
    let engine = unsafe { Box::from_raw(handle as *mut Engine) };
    FREED.lock().expect("freed list").push(engine.id);
}

unsafe extern "C" fn eval(handle: Handle, source: *const c_char) -> RawValue {
    let source = unsafe { read(source) };
    unsafe { engine(handle) }.eval(&source)
}

unsafe extern "C" fn is_exception(_handle: Handle, value: RawValue) -> bool {
    value.tag == TAG_EXCEPTION
}

unsafe extern "C" fn get_exception(handle: Handle) -> *const c_char {
    let engine = unsafe { engine(handle) };
    let message = engine.pending.take().unwrap_or_else(|| "null".to_string());
    engine.keep(&message)
}

unsafe extern "C" fn to_cstring(handle: Handle, value: RawValue) -> *const c_char {
    let engine = unsafe { engine(handle) };
    match engine.text_of(value) {
        Some(text) => engine.keep(&text),
        None => {
            engine.throw("TypeError: cannot convert symbol to string");
            ptr::null()
        }
    }
}

unsafe extern "C" fn to_bool(_handle: Handle, value: RawValue) -> c_int {
    // SAFETY: see `Engine::text_of`.
    unsafe {
        match value.tag {
            TAG_INT | TAG_BOOL => c_int::from(value.u.int32 != 0),
            TAG_FLOAT64 => c_int::from(value.u.float64 != 0.0),
            TAG_STRING => c_int::from(!read(value.u.ptr as *const c_char).is_empty()),
            TAG_NULL | TAG_UNDEFINED => 0,
            TAG_EXCEPTION => -1,
            _ => 1,
        }
    }
}

unsafe extern "C" fn to_int(handle: Handle, value: RawValue) -> c_int {
    let engine = unsafe { engine(handle) };
    // SAFETY: see `Engine::text_of`.
    unsafe {
        match value.tag {
            TAG_INT | TAG_BOOL => value.u.int32,
            TAG_FLOAT64 => value.u.float64 as i32,
            TAG_STRING => read(value.u.ptr as *const c_char).trim().parse().unwrap_or(0),
            TAG_SYMBOL => {
                engine.throw("TypeError: cannot convert symbol to number");
                // Whatever the stack held.
                0x5a5a
            }
            _ => 0,
        }
    }
}

unsafe extern "C" fn new_undefined(_handle: Handle) -> RawValue {
    simple(TAG_UNDEFINED)
}

unsafe extern "C" fn new_null(_handle: Handle) -> RawValue {
    simple(TAG_NULL)
}

unsafe extern "C" fn new_true(_handle: Handle) -> RawValue {
    literal("true").expect("literal")
}

unsafe extern "C" fn new_false(_handle: Handle) -> RawValue {
    literal("false").expect("literal")
}

unsafe extern "C" fn new_string(handle: Handle, text: *const c_char) -> RawValue {
    let text = unsafe { read(text) };
    unsafe { engine(handle) }.string(&text)
}

unsafe extern "C" fn new_int(_handle: Handle, value: c_int) -> RawValue {
    int(value)
}

unsafe extern "C" fn new_double(_handle: Handle, value: f64) -> RawValue {
    RawValue {
        u: RawPayload { float64: value },
        tag: TAG_FLOAT64,
    }
}

unsafe extern "C" fn new_json(handle: Handle, json: *const c_char) -> RawValue {
    let json = unsafe { read(json) };
    let engine = unsafe { engine(handle) };
    let json = json.trim();
    if json.len() > 1 && json.starts_with('"') && json.ends_with('"') {
        return engine.string(&json[1..json.len() - 1]);
    }
    match literal(json) {
        Some(value) if value.tag != TAG_SYMBOL && value.tag != TAG_UNDEFINED => value,
        _ => engine.throw("SyntaxError: unexpected token in JSON"),
    }
}

unsafe extern "C" fn new_function(
    _handle: Handle,
    _name: *const c_char,
    _length: c_int,
    _callback: NativeCallback,
) -> RawValue {
    simple(TAG_OBJECT)
}

unsafe extern "C" fn set_property_str(
    handle: Handle,
    name: *const c_char,
    value: RawValue,
) -> c_int {
    let name = unsafe { read(name) };
    let engine = unsafe { engine(handle) };
    if name == READ_ONLY_GLOBAL {
        engine.throw(format!("TypeError: '{name}' is read-only"));
        return -1;
    }
    engine.globals.insert(name, value);
    1
}

unsafe extern "C" fn json_stringify(handle: Handle, value: RawValue) -> *const c_char {
    let engine = unsafe { engine(handle) };
    let json = match value.tag {
        TAG_UNDEFINED | TAG_SYMBOL | TAG_OBJECT => "undefined".to_string(),
        TAG_STRING => format!("\"{}\"", engine.text_of(value).unwrap_or_default()),
        _ => engine.text_of(value).unwrap_or_default(),
    };
    engine.keep(&json)
}

/// Table with every entry of the header.
fn full_table() -> FunctionTable {
    FunctionTable {
        create,
        free,
        eval,
        is_exception,
        to_cstring,
        to_bool: ToBoolFn::Int(to_bool),
        to_int,
        get_exception: Some(get_exception),
        new_undefined: Some(new_undefined),
        new_null: Some(new_null),
        new_true: Some(new_true),
        new_false: Some(new_false),
        new_string: Some(new_string),
        new_int: Some(new_int),
        new_json: Some(new_json),
        new_double: Some(new_double),
        new_function: Some(new_function),
        set_property_str: Some(set_property_str),
        json_stringify: Some(json_stringify),
    }
}

pub(crate) fn library() -> Arc<NativeLibrary> {
    Arc::new(NativeLibrary::from_table("test-shim", full_table()))
}

/// Only the entries every shim build exports.
pub(crate) fn minimal_library() -> Arc<NativeLibrary> {
    let table = FunctionTable {
        get_exception: None,
        new_undefined: None,
        new_null: None,
        new_true: None,
        new_false: None,
        new_string: None,
        new_int: None,
        new_json: None,
        new_double: None,
        new_function: None,
        set_property_str: None,
        json_stringify: None,
        ..full_table()
    };
    Arc::new(NativeLibrary::from_table("test-shim-minimal", table))
}

/// Id of the engine behind a live handle.
pub(crate) fn engine_id(handle: Handle) -> u64 {
    // SAFETY: callers pass handles created by `create` that are still live.
    unsafe { engine(handle) }.id
}

/// How many times the engine `id` has been freed.
pub(crate) fn times_freed(id: u64) -> usize {
    FREED
        .lock()
        .expect("freed list")
        .iter()
        .filter(|freed| **freed == id)
        .count()
}
