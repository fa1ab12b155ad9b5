//! Utility functions and extension traits.

use arrow_schema::DataType;

/// Extension trait for formatting Arrow [`DataType`] into human-readable strings.
///
/// Nested types render their children, which makes column plans readable in
/// debug logs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use arrow_schema::{DataType, Field};
/// use geoextract_core::utils::ArrowDataTypeExt;
///
/// assert_eq!(DataType::Utf8.format(), "String");
///
/// let list = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
/// assert_eq!(list.format(), "List<String>");
/// ```
pub trait ArrowDataTypeExt {
    /// Format the data type into a human-readable string.
    fn format(&self) -> String;
}

impl ArrowDataTypeExt for DataType {
    fn format(&self) -> String {
        match self {
            DataType::Utf8 | DataType::Utf8View => "String".to_string(),
            DataType::LargeUtf8 => "LargeString".to_string(),
            DataType::BinaryView => "Binary".to_string(),
            DataType::Timestamp(unit, tz) => {
                let tz_str = tz.as_ref().map_or("", |t| t.as_ref());
                format!("Timestamp({unit:?}, {tz_str})")
            },
            DataType::List(field) | DataType::ListView(field) => {
                format!("List<{}>", field.data_type().format())
            },
            DataType::LargeList(field) | DataType::LargeListView(field) => {
                format!("LargeList<{}>", field.data_type().format())
            },
            DataType::FixedSizeList(field, size) => {
                format!("FixedSizeList<{}; {size}>", field.data_type().format())
            },
            DataType::Struct(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name(), f.data_type().format()))
                    .collect();
                format!("Struct<{}>", inner.join(", "))
            },
            DataType::Map(entries, _) => match entries.data_type() {
                DataType::Struct(kv) if kv.len() == 2 => format!(
                    "Map<{}, {}>",
                    kv[0].data_type().format(),
                    kv[1].data_type().format()
                ),
                _ => "Map".to_string(),
            },
            other => format!("{other}"),
        }
    }
}
