//! Runtime limits and evaluation mode

use qjs_host_quickjs::{EngineHost, JsRuntime, QuickJsConfig};

#[test]
fn test_memory_limit_raises_engine_exception() {
    let config = QuickJsConfig::new().with_memory_limit(Some(4 * 1024 * 1024));
    let runtime = JsRuntime::create_with_config(config).expect("create runtime");

    let value = runtime
        .eval(
            "(function () { const blocks = []; \
             while (true) { blocks.push(new Array(100000).fill(1)); } })()",
        )
        .expect("eval");
    assert!(runtime.is_exception(&value));
    runtime.get_exception().expect("pending exception");
}

#[test]
fn test_deep_recursion_raises_stack_overflow() {
    let config = QuickJsConfig::new().with_max_stack_size(Some(256 * 1024));
    let runtime = JsRuntime::create_with_config(config).expect("create runtime");

    let value = runtime
        .eval("function down(n) { return down(n + 1) + 1; } down(0)")
        .expect("eval");
    assert!(runtime.is_exception(&value));
    let message = runtime.get_exception().expect("pending exception");
    assert!(message.contains("stack"), "unexpected message: {message}");
}

#[test]
fn test_sloppy_mode_by_default() {
    let runtime = JsRuntime::create().expect("create runtime");

    let value = runtime.eval("undeclared = 5; undeclared").expect("eval");
    assert!(!runtime.is_exception(&value));
    assert_eq!(runtime.coerce_int(&value).expect("coerce int"), 5);
}

#[test]
fn test_strict_mode_rejects_implicit_globals() {
    let config = QuickJsConfig::new().with_strict(true);
    let runtime = JsRuntime::create_with_config(config).expect("create runtime");

    let value = runtime.eval("undeclared = 5; undeclared").expect("eval");
    assert!(runtime.is_exception(&value));
    let message = runtime.get_exception().expect("pending exception");
    assert!(message.contains("ReferenceError"), "unexpected message: {message}");
}

#[test]
fn test_config_round_trips_through_json() {
    let config = QuickJsConfig::new()
        .with_memory_limit(Some(64 * 1024 * 1024))
        .with_gc_threshold(Some(1024 * 1024))
        .with_strict(true);

    let json = serde_json::to_string(&config).expect("serialize");
    let decoded: QuickJsConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, config);

    let partial: QuickJsConfig =
        serde_json::from_str(r#"{"max_stack_size": 1048576}"#).expect("deserialize partial");
    assert_eq!(partial.max_stack_size, Some(1_048_576));
    assert!(!partial.strict);
}

#[test]
fn test_runtime_reports_its_config() {
    let config = QuickJsConfig::new().with_gc_threshold(Some(4096));
    let runtime = JsRuntime::create_with_config(config.clone()).expect("create runtime");
    assert_eq!(runtime.config(), &config);
}
