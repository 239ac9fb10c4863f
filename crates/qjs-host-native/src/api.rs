//! Layout of the shim library's C interface.

use qjs_host_core::ValueTag;
use std::ffi::{c_char, c_int, c_void};

/// Payload of a `JSValue`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawPayload {
    pub int32: i32,
    pub float64: f64,
    pub ptr: *mut c_void,
}

/// A `JSValue` as passed by value across the boundary.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawValue {
    pub u: RawPayload,
    pub tag: i64,
}

pub const TAG_BIG_INT: i64 = -10;
pub const TAG_SYMBOL: i64 = -8;
pub const TAG_STRING: i64 = -7;
pub const TAG_OBJECT: i64 = -1;
pub const TAG_INT: i64 = 0;
pub const TAG_BOOL: i64 = 1;
pub const TAG_NULL: i64 = 2;
pub const TAG_UNDEFINED: i64 = 3;
pub const TAG_EXCEPTION: i64 = 6;
pub const TAG_FLOAT64: i64 = 7;

impl RawValue {
    pub fn value_tag(&self) -> ValueTag {
        tag_for(self.tag)
    }
}

/// Map an engine tag to a [`ValueTag`].
///
/// The C table cannot tell arrays or functions apart from plain objects, so
/// every object reports [`ValueTag::Object`].
pub fn tag_for(tag: i64) -> ValueTag {
    match tag {
        TAG_INT => ValueTag::Int,
        TAG_BOOL => ValueTag::Bool,
        TAG_NULL => ValueTag::Null,
        TAG_UNDEFINED => ValueTag::Undefined,
        TAG_EXCEPTION => ValueTag::Exception,
        TAG_FLOAT64 => ValueTag::Float,
        TAG_OBJECT => ValueTag::Object,
        TAG_STRING => ValueTag::String,
        TAG_SYMBOL => ValueTag::Symbol,
        _ => ValueTag::Other,
    }
}

/// Opaque `QuickJS_t`.
pub type Handle = *mut c_void;

/// Callback accepted by `quickjs_new_function`.
pub type NativeCallback =
    unsafe extern "C" fn(this_val: RawValue, argc: c_int, argv: *mut RawValue) -> RawValue;

pub(crate) type CreateFn = unsafe extern "C" fn() -> Handle;
pub(crate) type FreeFn = unsafe extern "C" fn(Handle);
pub(crate) type SourceFn = unsafe extern "C" fn(Handle, *const c_char) -> RawValue;
pub(crate) type PredicateFn = unsafe extern "C" fn(Handle, RawValue) -> bool;
pub(crate) type MessageFn = unsafe extern "C" fn(Handle) -> *const c_char;
pub(crate) type ToCStringFn = unsafe extern "C" fn(Handle, RawValue) -> *const c_char;
pub(crate) type ToIntFn = unsafe extern "C" fn(Handle, RawValue) -> c_int;
pub(crate) type ConstantFn = unsafe extern "C" fn(Handle) -> RawValue;
pub(crate) type NewIntFn = unsafe extern "C" fn(Handle, c_int) -> RawValue;
pub(crate) type NewDoubleFn = unsafe extern "C" fn(Handle, f64) -> RawValue;
pub(crate) type NewFunctionFn =
    unsafe extern "C" fn(Handle, *const c_char, c_int, NativeCallback) -> RawValue;
pub(crate) type SetPropertyFn = unsafe extern "C" fn(Handle, *const c_char, RawValue) -> c_int;

/// `ToBool` entry; the header declares a C `bool`, the shipped shim an
/// `int` that is negative when the conversion threw.
#[derive(Clone, Copy)]
pub(crate) enum ToBoolFn {
    Bool(PredicateFn),
    Int(ToIntFn),
}

/// Entry points resolved from the shim library.
///
/// The first block is exported by every shim build. The rest is only in
/// builds that follow the full header; calls that need a missing entry fail
/// with `MissingSymbol`.
#[derive(Clone, Copy)]
pub(crate) struct FunctionTable {
    pub create: CreateFn,
    pub free: FreeFn,
    pub eval: SourceFn,
    pub is_exception: PredicateFn,
    pub to_cstring: ToCStringFn,
    pub to_bool: ToBoolFn,
    pub to_int: ToIntFn,

    pub get_exception: Option<MessageFn>,
    pub new_undefined: Option<ConstantFn>,
    pub new_null: Option<ConstantFn>,
    pub new_true: Option<ConstantFn>,
    pub new_false: Option<ConstantFn>,
    pub new_string: Option<SourceFn>,
    pub new_int: Option<NewIntFn>,
    pub new_json: Option<SourceFn>,
    pub new_double: Option<NewDoubleFn>,
    pub new_function: Option<NewFunctionFn>,
    pub set_property_str: Option<SetPropertyFn>,
    pub json_stringify: Option<ToCStringFn>,
}
