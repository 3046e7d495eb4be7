//! Core types and configuration for the lexicloud keyword pipeline.
//!
//! This crate provides the document and keyword types, term normalization,
//! error handling and run configuration used across all lexicloud crates.

pub mod config;
pub mod error;
pub mod term;
pub mod types;

pub use config::{LexiConfig, MergeMode};
pub use error::{LexiError, Result};
pub use term::normalize_term;
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LexiConfig, MergeMode};
    pub use crate::error::{LexiError, Result};
    pub use crate::term::normalize_term;
    pub use crate::types::*;
}
