//! The host-facing contract shared by every engine backend
//!
//! Each method maps onto one entry of the engine's C function table. Runtime
//! creation and release stay on the concrete types, since they differ in what
//! they need (a config, a loaded library) and `free` consumes the runtime.

use crate::error::{HostError, Result};
use crate::value::ValueTag;
use serde_json::Value;

/// Operations on a live runtime handle.
///
/// Value handles borrow the runtime (`Self::Value<'rt>`), so a runtime cannot
/// be freed while one of its values is still reachable.
///
/// Exception protocol: [`eval`](Self::eval) and [`parse_json`](Self::parse_json)
/// never report script failures as `Err`. Callers check
/// [`is_exception`](Self::is_exception) on the returned handle and then fetch
/// the message with [`get_exception`](Self::get_exception).
/// [`eval_checked`](Self::eval_checked) does both steps.
pub trait EngineHost {
    /// Opaque value handle scoped to this runtime
    type Value<'rt>
    where
        Self: 'rt;

    /// Compile and run `source` in the global scope.
    fn eval(&self, source: &str) -> Result<Self::Value<'_>>;

    /// Whether `value` is the exception marker of a failed evaluation.
    fn is_exception(&self, value: &Self::Value<'_>) -> bool;

    /// Kind of value recorded when the handle was created.
    fn value_tag(&self, value: &Self::Value<'_>) -> ValueTag;

    /// Message of the pending exception; clears it.
    fn get_exception(&self) -> Result<String>;

    /// JS `ToString` conversion.
    fn coerce_string(&self, value: &Self::Value<'_>) -> Result<String>;

    /// JS `ToBoolean` conversion.
    fn coerce_bool(&self, value: &Self::Value<'_>) -> Result<bool>;

    /// JS `ToInt32` conversion: NaN and infinities become 0, fractions
    /// truncate toward zero, out-of-range values wrap modulo 2^32.
    fn coerce_int(&self, value: &Self::Value<'_>) -> Result<i32>;

    fn new_undefined(&self) -> Result<Self::Value<'_>>;

    fn new_null(&self) -> Result<Self::Value<'_>>;

    fn new_bool(&self, value: bool) -> Result<Self::Value<'_>>;

    fn new_string(&self, value: &str) -> Result<Self::Value<'_>>;

    fn new_int(&self, value: i32) -> Result<Self::Value<'_>>;

    fn new_float(&self, value: f64) -> Result<Self::Value<'_>>;

    /// Parse a JSON document into a value. Malformed input yields an
    /// exception handle, like `eval`.
    fn parse_json(&self, json: &str) -> Result<Self::Value<'_>>;

    /// `JSON.stringify`. `None` when the value has no JSON form.
    fn json_stringify(&self, value: &Self::Value<'_>) -> Result<Option<String>>;

    /// Install `value` as a property of the global object.
    fn set_global(&self, name: &str, value: Self::Value<'_>) -> Result<()>;

    fn new_true(&self) -> Result<Self::Value<'_>> {
        self.new_bool(true)
    }

    fn new_false(&self) -> Result<Self::Value<'_>> {
        self.new_bool(false)
    }

    /// Evaluate and turn a raised exception into [`HostError::Exception`].
    fn eval_checked(&self, source: &str) -> Result<Self::Value<'_>> {
        let value = self.eval(source)?;
        if self.is_exception(&value) {
            let message = self.get_exception()?;
            tracing::debug!(exception = %message, "Script raised");
            return Err(HostError::Exception(message));
        }
        Ok(value)
    }

    /// Evaluate and decode the result through `JSON.stringify`.
    ///
    /// Results without a JSON form (`undefined`, functions) decode as `Null`.
    fn eval_json(&self, source: &str) -> Result<Value> {
        let value = self.eval_checked(source)?;
        match self.json_stringify(&value)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Value::Null),
        }
    }
}
