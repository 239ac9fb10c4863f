//! Core types shared by the QuickJS host backends.

pub mod error;
pub mod ids;
pub mod traits;
pub mod value;

pub use error::{HostError, Result};
pub use ids::RuntimeId;
pub use traits::EngineHost;
pub use value::ValueTag;
