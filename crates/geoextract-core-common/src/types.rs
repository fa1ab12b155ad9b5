//! Data types shared between the extract pipeline and the query engine.

use arrow_schema::{DataType, Field};

/// One materialized result row, keyed by column name.
///
/// Structured columns arrive as nested JSON objects, maps as objects keyed by
/// the map key and lists as arrays.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Identifies one partition-set of the remote dataset.
///
/// The partition lives at `<root>/<release>/theme=<theme>/type=<kind>/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetLocator {
    /// Dataset release, e.g. `2024-08-20.0`
    pub release: String,
    /// Theme partition, e.g. `buildings`
    pub theme: String,
    /// Type partition, e.g. `building`
    pub kind: String,
}

impl DatasetLocator {
    /// Theme holding administrative boundaries.
    pub const DIVISIONS_THEME: &'static str = "divisions";
    /// Type holding division polygons.
    pub const DIVISION_AREA_TYPE: &'static str = "division_area";

    #[must_use]
    pub fn new(
        release: impl Into<String>,
        theme: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            release: release.into(),
            theme: theme.into(),
            kind: kind.into(),
        }
    }

    /// Locator of the division polygons in `release`.
    #[must_use]
    pub fn divisions(release: impl Into<String>) -> Self {
        Self::new(release, Self::DIVISIONS_THEME, Self::DIVISION_AREA_TYPE)
    }

    /// Partition path relative to the release root, with a trailing slash.
    #[must_use]
    pub fn partition_path(&self) -> String {
        format!("{}/theme={}/type={}/", self.release, self.theme, self.kind)
    }

    /// Full partition location under `root` (a URL or a local directory).
    ///
    /// ```
    /// use geoextract_core_common::DatasetLocator;
    ///
    /// let locator = DatasetLocator::new("2024-08-20.0", "buildings", "building");
    /// assert_eq!(
    ///     locator.location("s3://overturemaps-us-west-2/release/"),
    ///     "s3://overturemaps-us-west-2/release/2024-08-20.0/theme=buildings/type=building/"
    /// );
    /// ```
    #[must_use]
    pub fn location(&self, root: &str) -> String {
        format!("{}/{}", root.trim_end_matches('/'), self.partition_path())
    }

    /// Table name the engine registers this partition-set under.
    #[must_use]
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.theme, self.kind)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect()
    }
}

/// Name and declared type of one dataset column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl From<&Field> for ColumnDescriptor {
    fn from(field: &Field) -> Self {
        Self::new(field.name(), field.data_type().clone())
    }
}
