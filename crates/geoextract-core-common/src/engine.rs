//! Query engine contract.
//!
//! The extract pipeline never talks to `DataFusion` directly; it depends on the
//! narrow [`QueryEngine`] trait below. Implementations own exactly one engine
//! session and execute statements one at a time.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formats::OutputFormat;
use crate::types::{ColumnDescriptor, DatasetLocator, Row};

/// Errors raised by a [`QueryEngine`].
///
/// Engine errors are propagated to the caller unchanged; the engine never
/// retries a failed statement.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine rejected or failed a statement
    #[error("Query execution failed: {0}")]
    Query(#[from] datafusion::error::DataFusionError),

    /// The partition-set could not be opened
    #[error("Dataset '{location}' is unavailable: {message}")]
    DatasetUnavailable {
        /// The partition location that was requested
        location: String,
        /// Why it could not be opened
        message: String,
    },

    /// The dataset schema cannot be extracted as requested
    #[error("Schema error: {0}")]
    Schema(String),

    /// Result rows could not be materialized
    #[error("Failed to decode result rows: {0}")]
    Decode(String),

    /// The output file could not be written
    #[error("Failed to write '{path}': {source}")]
    Write {
        /// The output path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EngineError {
    /// Wraps any error raised while producing `path`.
    pub fn write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EngineError::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Executes statements against a columnar dataset.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Makes the partition-set named by `locator` queryable and returns the
    /// table name statements must use to reference it.
    ///
    /// Registering the same locator twice returns the same name.
    async fn register_dataset(&self, locator: &DatasetLocator) -> EngineResult<String>;

    /// Returns the column names and types of the partition-set without
    /// materializing any rows.
    async fn describe_schema(&self, locator: &DatasetLocator) -> EngineResult<Vec<ColumnDescriptor>>;

    /// Executes `statement` and materializes every result row.
    ///
    /// Row order is whatever the engine produces unless the statement
    /// itself orders its output.
    async fn run_query(&self, statement: &str) -> EngineResult<Vec<Row>>;

    /// Executes `statement` and writes its result to `output` in `format`,
    /// returning the number of rows written.
    ///
    /// The write is atomic: on failure nothing is left at `output`.
    async fn copy_to(
        &self,
        statement: &str,
        output: &Path,
        format: OutputFormat,
    ) -> EngineResult<u64>;
}
