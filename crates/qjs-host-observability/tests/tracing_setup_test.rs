use qjs_host_core::RuntimeId;
use qjs_host_observability::{spans, tracing_setup};
use std::path::Path;

#[test]
fn test_init_tracing_is_idempotent() {
    tracing_setup::init_tracing();
    tracing_setup::init_tracing_with_default("debug");
}

#[test]
fn test_spans_carry_metadata() {
    let subscriber = tracing_subscriber::registry();
    tracing::subscriber::with_default(subscriber, || {
        let id = RuntimeId::next();

        let span = spans::eval_script(id, 12);
        let metadata = span.metadata().expect("span enabled");
        assert_eq!(metadata.name(), "eval_script");
        assert!(metadata.fields().field("runtime_id").is_some());
        assert!(metadata.fields().field("source_len").is_some());

        let span = spans::load_library(Path::new("build/os/QuickJs.so"));
        let metadata = span.metadata().expect("span enabled");
        assert_eq!(metadata.name(), "load_library");
        assert!(metadata.fields().field("path").is_some());
    });
}
