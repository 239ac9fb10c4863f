//! Locating and loading the shim library

use qjs_host_native::{
    HostError, NativeConfig, NativeLibrary, NativeRuntime, library_extension, library_path,
};
use std::path::Path;
use test_support::support::library::LibraryDir;

#[test]
fn test_library_extension_per_platform() {
    assert_eq!(library_extension("linux").expect("linux"), "so");
    assert_eq!(library_extension("windows").expect("windows"), "dll");
    assert_eq!(library_extension("macos").expect("macos"), "dylib");
}

#[test]
fn test_unsupported_platform() {
    let err = library_extension("freebsd").expect_err("freebsd has no artifact");
    assert!(matches!(err, HostError::UnsupportedPlatform(ref os) if os == "freebsd"));
    assert!(err.is_construction());
}

#[test]
fn test_library_path() {
    let path = library_path(Path::new("build/os"), "linux").expect("path");
    assert_eq!(path, Path::new("build/os/QuickJs.so"));
    let path = library_path(Path::new("libs"), "windows").expect("path");
    assert_eq!(path, Path::new("libs/QuickJs.dll"));
}

#[test]
fn test_missing_library() {
    let dir = LibraryDir::empty();
    let err = NativeLibrary::load(&dir.path()).expect_err("nothing to load");

    assert!(matches!(err, HostError::LibraryNotFound { .. }), "got {err:?}");
    assert!(err.is_construction());
}

#[test]
fn test_corrupt_library() {
    let file_name = library_path(Path::new(""), std::env::consts::OS)
        .expect("supported test platform")
        .display()
        .to_string();
    let dir = LibraryDir::with_corrupt_library(&file_name);
    let err = NativeLibrary::load(&dir.path()).expect_err("not a shared object");

    assert!(matches!(err, HostError::LibraryLoad { .. }), "got {err:?}");
    assert!(err.is_construction());
}

#[test]
fn test_config_prefers_explicit_dir() {
    let config = NativeConfig::new().with_library_dir("/opt/quickjs");
    assert_eq!(config.resolve_dir(), Path::new("/opt/quickjs"));
}

/// Runs against a built shim: `QJS_HOST_LIB_DIR=... cargo test -- --ignored`.
/// The protocol itself is covered by the unit tests next to `NativeRuntime`.
#[test]
#[ignore = "needs QJS_HOST_LIB_DIR pointing at a built QuickJs library"]
fn test_native_runtime_end_to_end() {
    use qjs_host_native::EngineHost;

    let runtime = NativeRuntime::create_default().expect("create runtime");
    let value = runtime.eval("var x = 40 + 2; x").expect("eval");
    assert!(!runtime.is_exception(&value));
    assert_eq!(runtime.coerce_int(&value).expect("coerce int"), 42);

    let value = runtime.eval("throw new Error('x')").expect("eval");
    assert!(runtime.is_exception(&value));
    assert!(runtime.get_exception().expect("pending").contains('x'));
    assert!(matches!(
        runtime.get_exception(),
        Err(HostError::NoPendingException)
    ));
    runtime.free();
}
