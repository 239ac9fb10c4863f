//! Conversions between engine values and host types.

use qjs_host_core::{HostError, Result};
use rquickjs::{Coerced, Ctx, FromJs, Value};

/// Apply the engine's coercion for `T` (ToString, ToBoolean, ToInt32, ToNumber).
///
/// Type mismatches are not errors: `"abc"` coerces to `0`, `{}` to
/// `"[object Object]"`. Only an exception raised during the conversion is
/// reported.
pub(crate) fn coerce<'js, T>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<T>
where
    Coerced<T>: FromJs<'js>,
{
    match Coerced::<T>::from_js(ctx, value) {
        Ok(Coerced(inner)) => Ok(inner),
        Err(rquickjs::Error::Exception) => {
            Err(HostError::Coercion(describe_exception(ctx, ctx.catch())))
        }
        Err(err) => Err(HostError::Coercion(err.to_string())),
    }
}

/// Human-readable form of a caught exception: its string coercion followed by
/// the stack trace when the engine recorded one.
pub(crate) fn describe_exception<'js>(ctx: &Ctx<'js>, exception: Value<'js>) -> String {
    let stack = exception
        .as_object()
        .and_then(|object| object.get::<_, Option<String>>("stack").ok().flatten())
        .filter(|stack| !stack.trim().is_empty());

    let message = match Coerced::<String>::from_js(ctx, exception) {
        Ok(Coerced(message)) => message,
        Err(_) => {
            // toString itself threw; drop that secondary exception.
            let _ = ctx.catch();
            "<unprintable exception>".to_string()
        }
    };

    match stack {
        Some(stack) => format!("{message}\n{}", stack.trim_end()),
        None => message,
    }
}

/// Map an engine error from a non-evaluating call.
pub(crate) fn engine_error(ctx: &Ctx<'_>, context: &str, err: rquickjs::Error) -> HostError {
    match err {
        rquickjs::Error::Exception => HostError::Exception(describe_exception(ctx, ctx.catch())),
        other => HostError::engine(context, other.to_string()),
    }
}
