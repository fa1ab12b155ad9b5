//! The division model and its name precedence.

use std::collections::BTreeMap;

use geo_types::Geometry;
use serde::Deserialize;

use crate::error::{ExtractError, Result};
use crate::Row;

/// Where a division's display name may come from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// `names.common["en"]`
    CommonEnglish,
    /// `names.primary`
    Primary,
}

impl NameSource {
    /// Lookup order used at every site that needs a division's name.
    pub const PRECEDENCE: [NameSource; 2] = [NameSource::CommonEnglish, NameSource::Primary];
}

/// The `names` record of a division row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DivisionNames {
    #[serde(default)]
    pub primary: Option<String>,
    /// Common names keyed by language tag.
    #[serde(default)]
    pub common: Option<BTreeMap<String, Option<String>>>,
}

impl DivisionNames {
    /// The name held by one source, skipping blank values.
    #[must_use]
    pub fn get(&self, source: NameSource) -> Option<&str> {
        let value = match source {
            NameSource::CommonEnglish => self
                .common
                .as_ref()
                .and_then(|common| common.get("en"))
                .and_then(Option::as_deref),
            NameSource::Primary => self.primary.as_deref(),
        };
        value.filter(|name| !name.trim().is_empty())
    }

    /// First name found walking [`NameSource::PRECEDENCE`].
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use geoextract_core::division::DivisionNames;
    ///
    /// let names = DivisionNames {
    ///     primary: Some("Den Haag".to_string()),
    ///     common: Some(BTreeMap::from([("en".to_string(), Some("The Hague".to_string()))])),
    /// };
    /// assert_eq!(names.display_name(), Some("The Hague"));
    /// ```
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        NameSource::PRECEDENCE
            .iter()
            .find_map(|source| self.get(*source))
    }
}

/// A ranked-search candidate: just enough to compare names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DivisionCandidate {
    pub id: String,
    #[serde(default)]
    pub names: Option<DivisionNames>,
}

impl DivisionCandidate {
    /// Decode one result row.
    ///
    /// # Errors
    ///
    /// Returns an engine decode error when `id` is missing or `names` is not a
    /// record.
    pub fn from_row(row: Row) -> Result<Self> {
        decode_row(row)
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.names.as_ref().and_then(DivisionNames::display_name)
    }
}

/// A resolved administrative boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Division {
    pub id: String,
    /// Display name derived through [`NameSource::PRECEDENCE`]; falls back to
    /// the id when the row has no names.
    pub name: String,
    pub boundary: Geometry<f64>,
    /// `boundary` as `GeoJSON` geometry text.
    pub boundary_geojson: String,
    pub subtype: Option<String>,
    pub class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DivisionRecord {
    id: String,
    #[serde(default)]
    names: Option<DivisionNames>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    geometry_geojson: Option<String>,
}

impl Division {
    /// Alias the division fetch gives the boundary's `GeoJSON` text.
    pub const GEOJSON_ALIAS: &'static str = "geometry_geojson";

    /// Decode a row holding `id`, `names`, `subtype`, `class` and the
    /// boundary as `GeoJSON` text under [`Division::GEOJSON_ALIAS`].
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidGeometry`] for a missing or empty
    /// boundary and an engine decode error for malformed rows.
    pub fn from_row(row: Row) -> Result<Self> {
        let record: DivisionRecord = decode_row(row)?;
        let boundary_geojson = record.geometry_geojson.ok_or_else(|| {
            ExtractError::invalid_geometry(format!("division {} has no boundary", record.id))
        })?;
        let boundary = datafusion_shared::geometry_from_geojson(&boundary_geojson)
            .map_err(|e| ExtractError::invalid_geometry(format!("division {}: {e}", record.id)))?;
        crate::bbox::BoundingBox::of(&boundary)?;

        let name = record
            .names
            .as_ref()
            .and_then(DivisionNames::display_name)
            .map_or_else(|| record.id.clone(), str::to_string);

        Ok(Self {
            id: record.id,
            name,
            boundary,
            boundary_geojson,
            subtype: record.subtype,
            class: record.class,
        })
    }
}

fn decode_row<T: serde::de::DeserializeOwned>(row: Row) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| crate::EngineError::Decode(format!("division row: {e}")).into())
}
