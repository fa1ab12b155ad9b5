//! Bounded spatial extract.
//!
//! One statement per extract: a cheap overlap test on the per-row bbox
//! struct, the exact intersection against the division boundary, and the
//! projection chosen by the column planner.

use std::path::PathBuf;

use log::{debug, info};

use crate::bbox::BoundingBox;
use crate::config::ExtractConfig;
use crate::division::Division;
use crate::error::Result;
use crate::planner::{ColumnPlan, ColumnTreatment};
use crate::sql::{bbox_overlap_predicate, quote_ident, quote_literal};
use crate::utils::ArrowDataTypeExt;
use crate::{ColumnDescriptor, DatasetLocator, EngineError, OutputFormat, QueryEngine};

/// A single unit of work.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub division: Division,
    pub dataset: DatasetLocator,
    /// Destination file; its extension selects the output format
    pub output: PathBuf,
}

impl ExtractRequest {
    #[must_use]
    pub fn new(division: Division, dataset: DatasetLocator, output: impl Into<PathBuf>) -> Self {
        Self {
            division,
            dataset,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        OutputFormat::from_path(&self.output)
    }
}

/// Write the rows of `request.dataset` intersecting the division boundary to
/// `request.output`, returning the output path.
///
/// # Errors
///
/// Returns the engine error unchanged when the partition cannot be opened,
/// the statement fails, or the file cannot be written; nothing is left at the
/// output path in that case.
pub async fn extract(
    engine: &dyn QueryEngine,
    request: &ExtractRequest,
    config: &ExtractConfig,
) -> Result<PathBuf> {
    let bbox = BoundingBox::of(&request.division.boundary)?;
    let format = request.format();
    info!(
        "Extracting theme={} type={} inside {} to {} ({format})",
        request.dataset.theme,
        request.dataset.kind,
        request.division.name,
        request.output.display()
    );

    let table = engine.register_dataset(&request.dataset).await?;
    let columns = engine.describe_schema(&request.dataset).await?;
    for column in &columns {
        debug!("  {}: {}", column.name, column.data_type.format());
    }

    let plan = ColumnPlan::for_format(&columns, format, &config.geometry_column)?;
    let statement = build_statement(&table, &columns, &plan, &bbox, &request.division, config)?;
    debug!("Extract statement: {statement}");

    let rows = engine.copy_to(&statement, &request.output, format).await?;
    info!("Extracted {rows} row(s)");
    Ok(request.output.clone())
}

/// Compose the extract statement.
///
/// # Errors
///
/// Returns [`EngineError::Schema`] when the geometry column is missing.
pub fn build_statement(
    table: &str,
    columns: &[ColumnDescriptor],
    plan: &ColumnPlan,
    bbox: &BoundingBox,
    division: &Division,
    config: &ExtractConfig,
) -> Result<String> {
    let has_column = |name: &str| columns.iter().any(|c| c.name == name);
    if !has_column(&config.geometry_column) {
        return Err(EngineError::Schema(format!(
            "dataset has no '{}' geometry column",
            config.geometry_column
        ))
        .into());
    }

    let mut predicates = Vec::with_capacity(2);
    if has_column(&config.bbox_column) {
        predicates.push(bbox_overlap_predicate(&config.bbox_column, bbox));
    } else {
        debug!("No '{}' column; skipping bbox prune", config.bbox_column);
    }
    predicates.push(format!(
        "st_intersects({}, {})",
        quote_ident(&config.geometry_column),
        quote_literal(&division.boundary_geojson)
    ));

    Ok(format!(
        "SELECT {} FROM {} WHERE {}",
        projection(plan),
        quote_ident(table),
        predicates.join(" AND ")
    ))
}

fn projection(plan: &ColumnPlan) -> String {
    match plan {
        ColumnPlan::SelectAll => "*".to_string(),
        ColumnPlan::Projected(columns) => columns
            .iter()
            .map(|column| {
                let name = quote_ident(&column.name);
                match column.treatment {
                    ColumnTreatment::Passthrough => name,
                    ColumnTreatment::ReencodeAsText => format!("to_json({name}) AS {name}"),
                    ColumnTreatment::GeometryAsText => format!("st_asgeojson({name}) AS {name}"),
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineResult, Row};
    use arrow_schema::{DataType, Field, Fields};
    use async_trait::async_trait;
    use geo_types::{Geometry, polygon};
    use std::path::Path;
    use std::sync::Mutex;

    fn division() -> Division {
        let boundary = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
        ]);
        Division {
            id: "div".to_string(),
            name: "Triangle".to_string(),
            boundary_geojson: datafusion_shared::geometry_to_geojson(&boundary).unwrap(),
            boundary,
            subtype: None,
            class: None,
        }
    }

    fn bbox_struct() -> DataType {
        DataType::Struct(Fields::from(
            ["xmin", "xmax", "ymin", "ymax"]
                .map(|n| Field::new(n, DataType::Float32, true))
                .to_vec(),
        ))
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", DataType::Utf8),
            ColumnDescriptor::new("geometry", DataType::Binary),
            ColumnDescriptor::new("bbox", bbox_struct()),
            ColumnDescriptor::new("height", DataType::Float64),
        ]
    }

    #[derive(Default)]
    struct RecordingEngine {
        copies: Mutex<Vec<(String, PathBuf, OutputFormat)>>,
    }

    #[async_trait]
    impl QueryEngine for RecordingEngine {
        async fn register_dataset(&self, locator: &DatasetLocator) -> EngineResult<String> {
            Ok(locator.table_name())
        }

        async fn describe_schema(
            &self,
            _locator: &DatasetLocator,
        ) -> EngineResult<Vec<ColumnDescriptor>> {
            Ok(columns())
        }

        async fn run_query(&self, _statement: &str) -> EngineResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn copy_to(
            &self,
            statement: &str,
            output: &Path,
            format: OutputFormat,
        ) -> EngineResult<u64> {
            self.copies
                .lock()
                .unwrap()
                .push((statement.to_string(), output.to_path_buf(), format));
            Ok(3)
        }
    }

    #[test]
    fn test_native_statement() {
        let bbox = BoundingBox::of(&division().boundary).unwrap();
        let statement = build_statement(
            "buildings_building",
            &columns(),
            &ColumnPlan::SelectAll,
            &bbox,
            &division(),
            &ExtractConfig::default(),
        )
        .unwrap();

        assert!(statement.starts_with("SELECT * FROM \"buildings_building\" WHERE "));
        assert!(statement.contains("\"bbox\"['xmin'] <= 2.0"));
        assert!(statement.contains("st_intersects(\"geometry\", '{"));
        assert!(statement.contains("\"Polygon\""));
    }

    #[test]
    fn test_interchange_projection() {
        let mut schema = columns();
        schema.push(ColumnDescriptor::new("names", bbox_struct()));
        let plan = ColumnPlan::for_format(&schema, OutputFormat::GeoJson, "geometry").unwrap();
        let bbox = BoundingBox::of(&division().boundary).unwrap();
        let statement = build_statement(
            "t",
            &schema,
            &plan,
            &bbox,
            &division(),
            &ExtractConfig::default(),
        )
        .unwrap();

        assert!(statement.starts_with(
            "SELECT \"id\", st_asgeojson(\"geometry\") AS \"geometry\", \
             to_json(\"bbox\") AS \"bbox\", \"height\", to_json(\"names\") AS \"names\" FROM"
        ));
    }

    #[test]
    fn test_missing_bbox_column_skips_prune() {
        let schema = vec![ColumnDescriptor::new("geometry", DataType::Binary)];
        let bbox = BoundingBox::of(&division().boundary).unwrap();
        let statement = build_statement(
            "t",
            &schema,
            &ColumnPlan::SelectAll,
            &bbox,
            &division(),
            &ExtractConfig::default(),
        )
        .unwrap();
        assert!(!statement.contains("bbox"));
        assert!(statement.contains("WHERE st_intersects("));
    }

    #[test]
    fn test_missing_geometry_column() {
        let schema = vec![ColumnDescriptor::new("id", DataType::Utf8)];
        let bbox = BoundingBox::of(&division().boundary).unwrap();
        let err = build_statement(
            "t",
            &schema,
            &ColumnPlan::SelectAll,
            &bbox,
            &division(),
            &ExtractConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("geometry"));
    }

    #[tokio::test]
    async fn test_extract_uses_format_from_extension() {
        let engine = RecordingEngine::default();
        let request = ExtractRequest::new(
            division(),
            DatasetLocator::new("2024-08-20.0", "places", "place"),
            "out/Places.GeoJSON",
        );

        let output = extract(&engine, &request, &ExtractConfig::default())
            .await
            .unwrap();
        assert_eq!(output, PathBuf::from("out/Places.GeoJSON"));

        let copies = engine.copies.lock().unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].2, OutputFormat::GeoJson);
        assert!(copies[0].0.contains("FROM \"places_place\""));
    }
}
