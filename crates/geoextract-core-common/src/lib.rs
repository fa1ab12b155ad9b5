//! Common types and traits shared across `geoextract` crates.
//!
//! This crate provides the contracts that sit between `geoextract-core` and the
//! query engine that executes its statements, preventing circular dependencies
//! and letting the resolver and extract engine be tested against stub engines.

pub mod engine;
pub mod formats;
pub mod types;

// Re-export commonly used types
pub use engine::{EngineError, EngineResult, QueryEngine};
pub use formats::OutputFormat;
pub use types::{ColumnDescriptor, DatasetLocator, Row};
