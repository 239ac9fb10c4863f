//! Type tags for opaque value handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse JS type of a value handle, recorded when the handle is created.
///
/// The tag is informational: coercions never consult it and follow the
/// engine's own conversion rules instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTag {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    String,
    Symbol,
    Object,
    Array,
    Function,
    /// The evaluation that produced this handle raised
    Exception,
    /// Anything else the engine can hold (bigint, module, uninitialized)
    Other,
}

impl ValueTag {
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Object => "object",
            Self::Array => "array",
            Self::Function => "function",
            Self::Exception => "exception",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
