//! Value handles for the embedded backend.

use crate::runtime::JsRuntime;
use qjs_host_core::{RuntimeId, ValueTag};
use rquickjs::{Persistent, Value};
use std::fmt;
use std::marker::PhantomData;

/// Opaque reference to a JS value living in one [`JsRuntime`].
///
/// The handle borrows its runtime, so it cannot outlive it and the runtime
/// cannot be freed while the handle exists. Dropping the handle releases its
/// reference to the engine value.
pub struct JsValue<'rt> {
    runtime_id: RuntimeId,
    tag: ValueTag,
    slot: Slot,
    _runtime: PhantomData<&'rt JsRuntime>,
}

pub(crate) enum Slot {
    Live(Persistent<Value<'static>>),
    /// Marker returned by a raising evaluation; the exception itself is
    /// parked on the runtime until `get_exception` fetches it.
    Exception,
}

impl<'rt> JsValue<'rt> {
    pub(crate) fn live(
        runtime_id: RuntimeId,
        tag: ValueTag,
        value: Persistent<Value<'static>>,
    ) -> Self {
        Self {
            runtime_id,
            tag,
            slot: Slot::Live(value),
            _runtime: PhantomData,
        }
    }

    pub(crate) fn exception(runtime_id: RuntimeId) -> Self {
        Self {
            runtime_id,
            tag: ValueTag::Exception,
            slot: Slot::Exception,
            _runtime: PhantomData,
        }
    }

    /// Type of the value when the handle was created
    pub fn tag(&self) -> ValueTag {
        self.tag
    }

    /// Runtime that produced this handle
    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }

    pub(crate) fn persistent(&self) -> Option<&Persistent<Value<'static>>> {
        match &self.slot {
            Slot::Live(value) => Some(value),
            Slot::Exception => None,
        }
    }

    pub(crate) fn is_exception_marker(&self) -> bool {
        matches!(self.slot, Slot::Exception)
    }
}

impl fmt::Debug for JsValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsValue")
            .field("runtime_id", &self.runtime_id)
            .field("tag", &self.tag)
            .finish()
    }
}

pub(crate) fn tag_of(value: &Value<'_>) -> ValueTag {
    if value.is_undefined() {
        ValueTag::Undefined
    } else if value.is_null() {
        ValueTag::Null
    } else if value.is_bool() {
        ValueTag::Bool
    } else if value.is_int() {
        ValueTag::Int
    } else if value.is_float() {
        ValueTag::Float
    } else if value.is_string() {
        ValueTag::String
    } else if value.is_symbol() {
        ValueTag::Symbol
    } else if value.is_array() {
        ValueTag::Array
    } else if value.is_function() {
        ValueTag::Function
    } else if value.is_object() {
        ValueTag::Object
    } else {
        ValueTag::Other
    }
}
