//! Schema-aware column planning.
//!
//! The planner is the only place that knows which column types an output
//! format can carry. The extractor consumes a [`ColumnPlan`] verbatim.

use std::collections::BTreeSet;

use arrow_schema::DataType;
use log::debug;

use crate::utils::ArrowDataTypeExt;
use crate::{ColumnDescriptor, EngineError, EngineResult, OutputFormat};

/// How one column reaches the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTreatment {
    /// Selected unchanged
    Passthrough,
    /// Encoded as JSON text under the same name
    ReencodeAsText,
    /// The WKB geometry, converted to `GeoJSON` text
    GeometryAsText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub name: String,
    pub treatment: ColumnTreatment,
}

/// Column selection for one extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPlan {
    /// Native output: every column unchanged.
    SelectAll,
    /// Interchange output: columns in dataset order with their treatment.
    Projected(Vec<PlannedColumn>),
}

impl ColumnPlan {
    /// Build the plan for `format`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Schema`] when interchange output is requested
    /// and `geometry_column` is not in the schema.
    pub fn for_format(
        columns: &[ColumnDescriptor],
        format: OutputFormat,
        geometry_column: &str,
    ) -> EngineResult<Self> {
        if !format.is_interchange() {
            return Ok(ColumnPlan::SelectAll);
        }

        if !columns.iter().any(|c| c.name == geometry_column) {
            return Err(EngineError::Schema(format!(
                "{format} output needs a '{geometry_column}' column, found: {}",
                columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let planned = columns
            .iter()
            .map(|column| {
                let treatment = if column.name == geometry_column {
                    ColumnTreatment::GeometryAsText
                } else if requires_text_encoding(&column.data_type) {
                    debug!(
                        "Re-encoding '{}' ({}) as JSON text",
                        column.name,
                        column.data_type.format()
                    );
                    ColumnTreatment::ReencodeAsText
                } else {
                    ColumnTreatment::Passthrough
                };
                PlannedColumn {
                    name: column.name.clone(),
                    treatment,
                }
            })
            .collect();
        Ok(ColumnPlan::Projected(planned))
    }

    /// Columns selected unchanged. Empty for [`ColumnPlan::SelectAll`], which
    /// selects everything without naming it.
    #[must_use]
    pub fn passthrough_columns(&self) -> BTreeSet<&str> {
        self.names_with(&ColumnTreatment::Passthrough).collect()
    }

    /// Columns re-encoded as text, in dataset order.
    #[must_use]
    pub fn reencode_as_text_columns(&self) -> Vec<&str> {
        self.names_with(&ColumnTreatment::ReencodeAsText).collect()
    }

    /// Whether the raw geometry is kept out of the projection.
    #[must_use]
    pub fn excludes_raw_geometry(&self) -> bool {
        matches!(self, ColumnPlan::Projected(_))
    }

    fn names_with<'a>(
        &'a self,
        treatment: &'a ColumnTreatment,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let columns: &[PlannedColumn] = match self {
            ColumnPlan::SelectAll => &[],
            ColumnPlan::Projected(columns) => columns,
        };
        columns
            .iter()
            .filter(move |c| &c.treatment == treatment)
            .map(|c| c.name.as_str())
    }
}

/// Whether a column of `data_type` must be turned into text for interchange
/// output. Every nested type qualifies.
#[must_use]
pub fn requires_text_encoding(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Struct(_)
            | DataType::Map(_, _)
            | DataType::List(_)
            | DataType::LargeList(_)
            | DataType::FixedSizeList(_, _)
            | DataType::ListView(_)
            | DataType::LargeListView(_)
    )
}
