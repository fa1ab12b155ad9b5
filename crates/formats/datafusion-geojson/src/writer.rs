//! `GeoJSON` writer implementation for converting Arrow record batches to features

use std::io::Write as IoWrite;

use arrow_array::cast::AsArray;
use arrow_array::{Array, RecordBatch, StringArray};
use arrow_json::writer::JsonArray;
use arrow_schema::DataType;
use datafusion_common::{DataFusionError, Result};
use geojson::{Feature, JsonObject};

/// Options for `GeoJSON` writing
#[derive(Debug, Clone)]
pub struct GeoJsonWriterOptions {
    /// Column holding `GeoJSON` geometry text (default: "geometry")
    pub geometry_column_name: String,
}

impl Default for GeoJsonWriterOptions {
    fn default() -> Self {
        Self {
            geometry_column_name: "geometry".to_string(),
        }
    }
}

impl GeoJsonWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the geometry column name
    #[must_use]
    pub fn with_geometry_column(mut self, name: impl Into<String>) -> Self {
        self.geometry_column_name = name.into();
        self
    }
}

/// Write record batches as one `GeoJSON` `FeatureCollection`, one feature
/// per line.
///
/// An empty input still produces a valid, empty `FeatureCollection`.
///
/// # Errors
///
/// Returns an error if the geometry column is missing, a geometry value is not
/// valid `GeoJSON`, a property column cannot be encoded as JSON, or writing to
/// the output fails
pub fn write_geojson<W: IoWrite>(
    writer: &mut W,
    batches: &[RecordBatch],
    options: &GeoJsonWriterOptions,
) -> Result<()> {
    let mut sink = FeatureSink::new(writer);
    sink.begin()?;
    for batch in batches {
        for feature in batch_to_features(batch, options)? {
            sink.push(&feature)?;
        }
    }
    sink.end()
}

/// Write record batches to `GeoJSON` bytes
///
/// # Errors
///
/// Returns an error if `GeoJSON` serialization fails
pub fn write_geojson_to_bytes(
    batches: &[RecordBatch],
    options: &GeoJsonWriterOptions,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_geojson(&mut buffer, batches, options)?;
    Ok(buffer)
}

struct FeatureSink<'a, W: IoWrite> {
    writer: &'a mut W,
    written: usize,
}

impl<'a, W: IoWrite> FeatureSink<'a, W> {
    fn new(writer: &'a mut W) -> Self {
        Self { writer, written: 0 }
    }

    fn begin(&mut self) -> Result<()> {
        self.raw(b"{\"type\":\"FeatureCollection\",\"features\":[")
    }

    fn push(&mut self, feature: &Feature) -> Result<()> {
        if self.written > 0 {
            self.raw(b",")?;
        }
        self.raw(b"\n")?;

        let encoded =
            serde_json::to_vec(feature).map_err(|e| DataFusionError::External(Box::new(e)))?;
        self.raw(&encoded)?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.raw(b"\n]}\n")?;
        self.writer.flush().map_err(DataFusionError::IoError)
    }

    fn raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(DataFusionError::IoError)
    }
}

fn batch_to_features(batch: &RecordBatch, options: &GeoJsonWriterOptions) -> Result<Vec<Feature>> {
    let schema = batch.schema();
    let geometry_idx = schema
        .index_of(&options.geometry_column_name)
        .map_err(|_| {
            DataFusionError::Plan(format!(
                "GeoJSON output requires a '{}' column",
                options.geometry_column_name
            ))
        })?;

    let geometries = geometry_text(batch.column(geometry_idx).as_ref())?;
    let property_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|idx| *idx != geometry_idx)
        .collect();
    let mut properties = if property_indices.is_empty() {
        vec![JsonObject::new(); batch.num_rows()]
    } else {
        encode_properties(&batch.project(&property_indices)?)?
    };

    let mut features = Vec::with_capacity(batch.num_rows());
    for (row, properties) in properties.drain(..).enumerate() {
        let geometry = if geometries.is_null(row) {
            None
        } else {
            let parsed: geojson::Geometry = serde_json::from_str(geometries.value(row))
                .map_err(|e| {
                    DataFusionError::Execution(format!(
                        "Invalid GeoJSON geometry in row {row}: {e}"
                    ))
                })?;
            Some(parsed)
        };

        features.push(Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(features)
}

fn geometry_text(column: &dyn Array) -> Result<StringArray> {
    match column.data_type() {
        DataType::Utf8 => Ok(column.as_string::<i32>().clone()),
        DataType::LargeUtf8 | DataType::Utf8View => {
            let cast = arrow_cast::cast(column, &DataType::Utf8)?;
            Ok(cast.as_string::<i32>().clone())
        },
        other => Err(DataFusionError::Plan(format!(
            "GeoJSON geometry column must hold GeoJSON text, found {other}"
        ))),
    }
}

/// Encode every row's properties as a JSON object, keeping null values.
fn encode_properties(batch: &RecordBatch) -> Result<Vec<JsonObject>> {
    let mut writer = arrow_json::WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write(batch)?;
    writer.finish()?;
    let buffer = writer.into_inner();

    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer).map_err(|e| DataFusionError::External(Box::new(e)))
}
