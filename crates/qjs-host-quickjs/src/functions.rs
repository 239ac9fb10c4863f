//! Host functions callable from script
//!
//! A host function is a Rust closure over JSON values. It is installed in two
//! parts: a native bridge taking and returning a JSON string, and a JS
//! wrapper under the requested name that stringifies its arguments, calls the
//! bridge and rethrows host errors as `Error` objects.

use crate::convert::engine_error;
use crate::runtime::JsRuntime;
use qjs_host_core::{HostError, Result};
use qjs_host_observability::spans;
use rquickjs::Function;
use serde_json::{Value, json};

const BRIDGE_PREFIX: &str = "__qjs_host_fn_";

impl JsRuntime {
    /// Expose `function` to script as the global `name`.
    ///
    /// Script arguments arrive as a JSON array (values without a JSON form
    /// become `null`). An `Err` from the closure is thrown in script as an
    /// `Error` whose message is the host error's display text.
    pub fn register_function<F>(&self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        validate_name(name)?;
        let bridge_name = format!("{BRIDGE_PREFIX}{name}");
        let install = wrapper_source(name, &bridge_name)?;
        let runtime_id = self.id;
        let function_name = name.to_string();

        self.context.with(|ctx| {
            let bridge = Function::new(ctx.clone(), move |payload: String| -> String {
                let span = spans::host_call(runtime_id, &function_name);
                let _guard = span.enter();
                dispatch(&function, &payload)
            })
            .map_err(|err| engine_error(&ctx, "Failed to create host function", err))?;

            ctx.globals()
                .set(bridge_name.as_str(), bridge)
                .map_err(|err| engine_error(&ctx, "Failed to install host function", err))?;
            ctx.eval::<(), _>(install)
                .map_err(|err| engine_error(&ctx, "Failed to install host function wrapper", err))
        })?;

        tracing::debug!(runtime_id = %self.id, function = name, "Registered host function");
        Ok(())
    }
}

fn dispatch<F>(function: &F, payload: &str) -> String
where
    F: Fn(&[Value]) -> Result<Value>,
{
    let reply = match serde_json::from_str::<Vec<Value>>(payload) {
        Ok(args) => match function(&args) {
            Ok(value) => json!({ "ok": value }),
            Err(err) => {
                tracing::debug!(error = %err, "Host function failed");
                json!({ "error": err.to_string() })
            }
        },
        Err(err) => json!({ "error": format!("Invalid host call payload: {err}") }),
    };
    reply.to_string()
}

fn wrapper_source(name: &str, bridge_name: &str) -> Result<String> {
    let name = serde_json::to_string(name)?;
    let bridge_name = serde_json::to_string(bridge_name)?;
    Ok(format!(
        r#"
        (function (name, bridge) {{
            const call = globalThis[bridge];
            globalThis[name] = function (...args) {{
                const reply = JSON.parse(call(JSON.stringify(args)));
                if (Object.prototype.hasOwnProperty.call(reply, "error")) {{
                    throw new Error(reply.error);
                }}
                return reply.ok;
            }};
        }})({name}, {bridge_name});
        "#
    ))
}

/// Names must be plain JS identifiers.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(HostError::InvalidArgument(format!(
            "host function name `{name}` is not a valid identifier"
        )))
    }
}
