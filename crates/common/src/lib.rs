//! Common types, field declarations, and errors shared across `encrypted-fields` crates.

pub mod error;
pub mod protocol;

pub use error::{FieldError, Result};
pub use protocol::{FieldSpec, SemanticType};
