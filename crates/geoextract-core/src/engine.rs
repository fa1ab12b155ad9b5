//! `DataFusion` implementation of [`QueryEngine`].
//!
//! One [`DataFusionEngine`] owns one `SessionContext` for one invocation.
//! Every call takes the engine lock, so statements never run concurrently.

use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arrow_json::writer::JsonArray;
use async_trait::async_trait;
use datafusion::arrow::array::{Array, RecordBatch, UInt64Array};
use datafusion::config::TableParquetOptions;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{ParquetReadOptions, SessionConfig, SessionContext};
use datafusion_geojson::{GeoJsonWriterOptions, write_geojson};
use log::{debug, info};
use object_store::aws::AmazonS3Builder;
use url::Url;

use crate::config::ExtractConfig;
use crate::{
    ColumnDescriptor, DatasetLocator, EngineError, EngineResult, OutputFormat, QueryEngine, Row,
};

/// Compression applied to Parquet output.
pub const PARQUET_COMPRESSION: &str = "zstd(3)";

const DEFAULT_S3_REGION: &str = "us-west-2";

/// Query engine backed by an in-process `DataFusion` session.
pub struct DataFusionEngine {
    ctx: SessionContext,
    release_root: String,
    geometry_column: String,
    tables: Mutex<HashMap<DatasetLocator, String>>,
    lock: tokio::sync::Mutex<()>,
}

impl DataFusionEngine {
    /// Open a session able to read partitions under `config.release_root`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatasetUnavailable`] when the root is an S3 URL
    /// whose object store cannot be configured.
    pub fn open(config: &ExtractConfig) -> EngineResult<Self> {
        let session_config = SessionConfig::new()
            .set_bool("datafusion.execution.parquet.schema_force_view_types", false)
            .set_bool("datafusion.execution.parquet.pushdown_filters", true);
        let ctx = SessionContext::new_with_config(session_config);
        datafusion_spatial::register_spatial_functions(&ctx);

        if config.release_root.starts_with("s3://") {
            register_s3_object_store(&ctx, &config.release_root)?;
        }

        debug!("Opened engine for {}", config.release_root);
        Ok(Self {
            ctx,
            release_root: config.release_root.clone(),
            geometry_column: config.geometry_column.clone(),
            tables: Mutex::new(HashMap::new()),
            lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Release the session. Dropping the engine has the same effect.
    pub fn close(self) {
        let registered = self.tables.lock().map(|t| t.len()).unwrap_or_default();
        debug!("Closing engine ({registered} registered table(s))");
    }

    async fn table_for(&self, locator: &DatasetLocator) -> EngineResult<String> {
        if let Some(name) = self.cached_table(locator) {
            return Ok(name);
        }

        let location = locator.location(&self.release_root);
        let unavailable = |message: String| EngineError::DatasetUnavailable {
            location: location.clone(),
            message,
        };
        if let Some(dir) = local_directory(&location) {
            if !dir.is_dir() {
                return Err(unavailable("directory does not exist".to_string()));
            }
        }

        let name = self.unique_table_name(locator);
        info!("Registering {location} as {name}");
        self.ctx
            .register_parquet(name.as_str(), &location, ParquetReadOptions::default())
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let provider = self
            .ctx
            .table_provider(name.as_str())
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if provider.schema().fields().is_empty() {
            self.ctx.deregister_table(name.as_str())?;
            return Err(unavailable("no parquet files found".to_string()));
        }

        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(locator.clone(), name.clone());
        }
        Ok(name)
    }

    fn cached_table(&self, locator: &DatasetLocator) -> Option<String> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(locator).cloned())
    }

    fn unique_table_name(&self, locator: &DatasetLocator) -> String {
        let base = locator.table_name();
        let taken = self
            .tables
            .lock()
            .map(|tables| tables.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        let mut name = base.clone();
        let mut suffix = 1;
        while taken.contains(&name) {
            suffix += 1;
            name = format!("{base}_{suffix}");
        }
        name
    }

    async fn write_parquet(&self, statement: &str, target: &Path) -> EngineResult<u64> {
        let target_str = target
            .to_str()
            .ok_or_else(|| EngineError::write(target, "path is not valid UTF-8"))?;

        let mut parquet_options = TableParquetOptions::default();
        parquet_options.global.compression = Some(PARQUET_COMPRESSION.to_string());

        let counts = self
            .ctx
            .sql(statement)
            .await?
            .write_parquet(
                target_str,
                DataFrameWriteOptions::new().with_single_file_output(true),
                Some(parquet_options),
            )
            .await?;
        Ok(written_rows(&counts))
    }

    async fn write_geojson(&self, statement: &str, target: &Path) -> EngineResult<u64> {
        let batches = self.ctx.sql(statement).await?.collect().await?;
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();

        let file = File::create(target).map_err(|e| EngineError::write(target, e))?;
        let mut writer = BufWriter::new(file);
        let options = GeoJsonWriterOptions::default().with_geometry_column(&self.geometry_column);
        write_geojson(&mut writer, &batches, &options).map_err(|e| EngineError::write(target, e))?;
        Ok(rows as u64)
    }
}

#[async_trait]
impl QueryEngine for DataFusionEngine {
    async fn register_dataset(&self, locator: &DatasetLocator) -> EngineResult<String> {
        let _guard = self.lock.lock().await;
        self.table_for(locator).await
    }

    async fn describe_schema(&self, locator: &DatasetLocator) -> EngineResult<Vec<ColumnDescriptor>> {
        let _guard = self.lock.lock().await;
        let name = self.table_for(locator).await?;
        let provider = self.ctx.table_provider(name.as_str()).await?;
        Ok(provider
            .schema()
            .fields()
            .iter()
            .map(|field| ColumnDescriptor::from(field.as_ref()))
            .collect())
    }

    async fn run_query(&self, statement: &str) -> EngineResult<Vec<Row>> {
        let _guard = self.lock.lock().await;
        let batches = self.ctx.sql(statement).await?.collect().await?;
        batches_to_rows(&batches)
    }

    async fn copy_to(
        &self,
        statement: &str,
        output: &Path,
        format: OutputFormat,
    ) -> EngineResult<u64> {
        let _guard = self.lock.lock().await;

        if output.file_name().is_none() {
            return Err(EngineError::write(output, "output path has no file name"));
        }
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let parent = fs::canonicalize(&parent).map_err(|e| EngineError::write(output, e))?;

        // Written next to the output so the final rename stays on one filesystem.
        let staging = tempfile::Builder::new()
            .prefix(".geoextract-")
            .tempdir_in(&parent)
            .map_err(|e| EngineError::write(output, e))?;
        // The Parquet writer treats an extensionless target as a directory.
        let staged = staging
            .path()
            .join(format!("extract.{}", format.extension()));

        let rows = match format {
            OutputFormat::Parquet => self.write_parquet(statement, &staged).await?,
            OutputFormat::GeoJson => self.write_geojson(statement, &staged).await?,
        };

        fs::rename(&staged, output).map_err(|e| EngineError::write(output, e))?;
        info!("Wrote {rows} row(s) to {} ({format})", output.display());
        Ok(rows)
    }
}

/// Materialize batches as JSON rows, keeping nulls as explicit keys.
fn batches_to_rows(batches: &[RecordBatch]) -> EngineResult<Vec<Row>> {
    let mut writer = arrow_json::WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer
        .write_batches(&refs)
        .map_err(|e| EngineError::Decode(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| EngineError::Decode(e.to_string()))?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer).map_err(|e| EngineError::Decode(e.to_string()))
}

/// Sum of the `count` column `DataFusion` returns from a write.
fn written_rows(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .filter_map(|batch| batch.column_by_name("count"))
        .filter_map(|column| column.as_any().downcast_ref::<UInt64Array>())
        .map(|counts| counts.iter().flatten().sum::<u64>())
        .sum()
}

fn local_directory(location: &str) -> Option<PathBuf> {
    if let Some(path) = location.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if location.contains("://") {
        return None;
    }
    Some(PathBuf::from(location))
}

fn register_s3_object_store(ctx: &SessionContext, root: &str) -> EngineResult<()> {
    let unavailable = |message: String| EngineError::DatasetUnavailable {
        location: root.to_string(),
        message,
    };
    let url = Url::parse(root).map_err(|e| unavailable(e.to_string()))?;
    let bucket = url
        .host_str()
        .ok_or_else(|| unavailable("S3 URL has no bucket".to_string()))?;

    let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

    let region = env::var("AWS_REGION")
        .or_else(|_| env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| DEFAULT_S3_REGION.to_string());
    builder = builder.with_region(region);

    let has_access_key = env::var("AWS_ACCESS_KEY_ID").is_ok();
    let has_secret_key = env::var("AWS_SECRET_ACCESS_KEY").is_ok();
    if !(has_access_key && has_secret_key) {
        debug!("No AWS credentials found; using unsigned requests");
        builder = builder.with_skip_signature(true);
    }

    let store = builder.build().map_err(|e| unavailable(e.to_string()))?;
    let store_url =
        Url::parse(&format!("s3://{bucket}")).map_err(|e| unavailable(e.to_string()))?;
    ctx.register_object_store(&store_url, Arc::new(store));
    Ok(())
}
