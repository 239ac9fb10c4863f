//! Locating and loading the shim library

use crate::api::{FunctionTable, ToBoolFn};
use libloading::Library;
use qjs_host_core::{HostError, Result};
use qjs_host_observability::spans;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Environment variable overriding the library directory.
pub const LIBRARY_DIR_ENV: &str = "QJS_HOST_LIB_DIR";

/// Directory searched when nothing else is configured.
pub const DEFAULT_LIBRARY_DIR: &str = "build/os";

const LIBRARY_STEM: &str = "QuickJs";

// Header spelling first, then the spelling the shipped shim exports.
const TO_CSTRING: &[&str] = &["quickjs_js_ToCString", "quick_js_ToCString"];
const TO_INT: &[&str] = &["quickjs_js_ToInt", "quick_js_ToInt"];
const NEW_JSON: &[&str] = &["quickjs_new_json", "quick_js_ParseJSON"];
const JSON_STRINGIFY: &[&str] = &["quickjs_js_JSONStringify", "quick_js_JSONStringify"];

static GLOBAL: Mutex<Option<Arc<NativeLibrary>>> = Mutex::new(None);

/// Where to look for the shim library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    pub library_dir: Option<PathBuf>,
}

impl NativeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Explicit directory, else `QJS_HOST_LIB_DIR`, else `build/os`.
    pub fn resolve_dir(&self) -> PathBuf {
        pick_dir(self.library_dir.as_deref(), std::env::var_os(LIBRARY_DIR_ENV))
    }
}

fn pick_dir(explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    match (explicit, env) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_LIBRARY_DIR),
    }
}

/// Shared-library extension for an OS name as reported by
/// `std::env::consts::OS`.
pub fn library_extension(os: &str) -> Result<&'static str> {
    match os {
        "linux" => Ok("so"),
        "windows" => Ok("dll"),
        "macos" => Ok("dylib"),
        other => Err(HostError::UnsupportedPlatform(other.to_string())),
    }
}

/// `<dir>/QuickJs.<ext>` for the given OS.
pub fn library_path(dir: &Path, os: &str) -> Result<PathBuf> {
    let extension = library_extension(os)?;
    Ok(dir.join(format!("{LIBRARY_STEM}.{extension}")))
}

/// A loaded shim library with its function table resolved.
pub struct NativeLibrary {
    path: PathBuf,
    pub(crate) table: FunctionTable,
    // Keeps the code behind `table` mapped.
    _library: Option<Library>,
}

impl NativeLibrary {
    /// Load the library for the current platform from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = library_path(dir, std::env::consts::OS)?;
        let span = spans::load_library(&path);
        let _guard = span.enter();

        if !path.is_file() {
            return Err(HostError::LibraryNotFound {
                path: path.display().to_string(),
            });
        }

        // SAFETY: loading runs the library's initializers; the shim has none
        // beyond the C++ runtime's own.
        let library = unsafe { Library::new(&path) }.map_err(|e| HostError::LibraryLoad {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let table = resolve(&library)?;

        tracing::info!(
            full_table = table.get_exception.is_some() && table.set_property_str.is_some(),
            json_stringify = table.json_stringify.is_some(),
            "Native library loaded"
        );
        Ok(Self {
            path,
            table,
            _library: Some(library),
        })
    }

    /// Library whose table is implemented in-process.
    #[cfg(test)]
    pub(crate) fn from_table(path: impl Into<PathBuf>, table: FunctionTable) -> Self {
        Self {
            path: path.into(),
            table,
            _library: None,
        }
    }

    /// Process-wide library, loaded on first use.
    ///
    /// The first successful load is cached; `config` is only consulted until
    /// then. A failed load is not cached.
    pub fn global(config: &NativeConfig) -> Result<Arc<Self>> {
        let mut cached = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(library) = cached.as_ref() {
            return Ok(Arc::clone(library));
        }
        let library = Arc::new(Self::load(&config.resolve_dir())?);
        *cached = Some(Arc::clone(&library));
        Ok(library)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn supports_json_stringify(&self) -> bool {
        self.table.json_stringify.is_some()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("json_stringify", &self.supports_json_stringify())
            .finish_non_exhaustive()
    }
}

fn resolve(library: &Library) -> Result<FunctionTable> {
    // SAFETY: each type matches the prototype declared in QuickJs.h, or in
    // QuickJs.cc for the `quick_js_` spellings.
    unsafe {
        Ok(FunctionTable {
            create: required(library, &["quickjs_create"])?,
            free: required(library, &["quickjs_free"])?,
            eval: required(library, &["quickjs_eval"])?,
            is_exception: required(library, &["quickjs_is_exception"])?,
            to_cstring: required(library, TO_CSTRING)?,
            to_bool: to_bool(library)?,
            to_int: required(library, TO_INT)?,
            get_exception: optional(library, &["quickjs_get_exception"]),
            new_undefined: optional(library, &["quickjs_new_undefined"]),
            new_null: optional(library, &["quickjs_new_null"]),
            new_true: optional(library, &["quickjs_new_true"]),
            new_false: optional(library, &["quickjs_new_false"]),
            new_string: optional(library, &["quickjs_new_string"]),
            new_int: optional(library, &["quickjs_new_int"]),
            new_json: optional(library, NEW_JSON),
            new_double: optional(library, &["quickjs_new_double"]),
            new_function: optional(library, &["quickjs_new_function"]),
            set_property_str: optional(library, &["quickjs_set_property_str"]),
            json_stringify: optional(library, JSON_STRINGIFY),
        })
    }
}

/// # Safety
///
/// See [`symbol`].
unsafe fn to_bool(library: &Library) -> Result<ToBoolFn> {
    if let Ok(entry) = unsafe { symbol(library, "quickjs_js_ToBool") } {
        return Ok(ToBoolFn::Bool(entry));
    }
    unsafe { symbol(library, "quick_js_ToBool") }.map(ToBoolFn::Int)
}

/// First exported spelling of `names`.
///
/// # Safety
///
/// See [`symbol`].
unsafe fn required<T: Copy>(library: &Library, names: &[&str]) -> Result<T> {
    let mut missing = None;
    for name in names {
        match unsafe { symbol(library, name) } {
            Ok(entry) => return Ok(entry),
            Err(err) => missing = Some(err),
        }
    }
    Err(missing.unwrap_or_else(|| HostError::MissingSymbol {
        symbol: String::new(),
        source: "no symbol name given".into(),
    }))
}

/// # Safety
///
/// See [`symbol`].
unsafe fn optional<T: Copy>(library: &Library, names: &[&str]) -> Option<T> {
    let entry = unsafe { required(library, names) }.ok();
    if entry.is_none() {
        tracing::debug!(symbols = ?names, "Optional symbol not exported");
    }
    entry
}

/// # Safety
///
/// `T` must be the function pointer type of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|e| {
        HostError::MissingSymbol {
            symbol: name.to_string(),
            source: Box::new(e),
        }
    })?;
    Ok(*symbol)
}
