//! Geometry encodings shared by the spatial functions and format writers.
//!
//! Rows carry geometry as WKB bytes; boundaries and interchange output carry
//! it as `GeoJSON` text. Everything in between is a [`geo_types::Geometry`].

use std::error::Error as StdError;
use std::fmt;

use datafusion_common::DataFusionError;
use geo_types::Geometry;
use geojson::GeoJson;
use geozero::ToGeo;
use geozero::wkb::Wkb;

/// Which encoding a geometry was being decoded from or encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryEncoding {
    Wkb,
    GeoJson,
}

impl fmt::Display for GeometryEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryEncoding::Wkb => f.write_str("WKB"),
            GeometryEncoding::GeoJson => f.write_str("GeoJSON"),
        }
    }
}

/// Errors that can occur while converting geometries between encodings.
#[derive(Debug)]
pub enum GeometryCodecError {
    /// The input could not be decoded.
    Decode {
        /// Encoding of the input.
        encoding: GeometryEncoding,
        /// Human readable description of the failure.
        message: String,
        /// Optional context describing what was being decoded.
        context: Option<String>,
    },
    /// The input decoded to something that is not a single geometry.
    NotAGeometry {
        /// What was found instead, e.g. `"FeatureCollection"`.
        found: String,
    },
    /// The geometry could not be encoded.
    Encode {
        /// Target encoding.
        encoding: GeometryEncoding,
        /// Human readable description of the failure.
        message: String,
    },
}

impl GeometryCodecError {
    /// Attach context to a decode error, returning the updated error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let GeometryCodecError::Decode {
            context: existing, ..
        } = &mut self
        {
            *existing = Some(context.into());
        }
        self
    }
}

impl fmt::Display for GeometryCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryCodecError::Decode {
                encoding,
                message,
                context,
            } => {
                let context = context
                    .as_deref()
                    .map(|c| format!(" in {c}"))
                    .unwrap_or_default();
                write!(f, "Failed to decode {encoding} geometry{context}: {message}")
            },
            GeometryCodecError::NotAGeometry { found } => {
                write!(f, "Expected a GeoJSON geometry, found {found}")
            },
            GeometryCodecError::Encode { encoding, message } => {
                write!(f, "Failed to encode geometry as {encoding}: {message}")
            },
        }
    }
}

impl StdError for GeometryCodecError {}

impl From<GeometryCodecError> for DataFusionError {
    fn from(err: GeometryCodecError) -> Self {
        DataFusionError::External(Box::new(err))
    }
}

/// Result type alias that uses [`GeometryCodecError`].
pub type GeometryCodecResult<T> = Result<T, GeometryCodecError>;

/// Decode ISO or extended WKB bytes.
pub fn geometry_from_wkb(bytes: &[u8]) -> GeometryCodecResult<Geometry<f64>> {
    Wkb(bytes.to_vec())
        .to_geo()
        .map_err(|err| GeometryCodecError::Decode {
            encoding: GeometryEncoding::Wkb,
            message: err.to_string(),
            context: None,
        })
}

/// Parse `GeoJSON` text holding a geometry object.
///
/// A `Feature` is accepted and its geometry extracted; a feature without a
/// geometry or a `FeatureCollection` is rejected.
pub fn geometry_from_geojson(text: &str) -> GeometryCodecResult<Geometry<f64>> {
    let parsed: GeoJson = text.parse().map_err(|err: geojson::Error| GeometryCodecError::Decode {
        encoding: GeometryEncoding::GeoJson,
        message: err.to_string(),
        context: None,
    })?;

    let geometry = match parsed {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature.geometry.ok_or_else(|| {
            GeometryCodecError::NotAGeometry {
                found: "Feature without geometry".to_string(),
            }
        })?,
        GeoJson::FeatureCollection(_) => {
            return Err(GeometryCodecError::NotAGeometry {
                found: "FeatureCollection".to_string(),
            });
        },
    };

    geometry_from_geojson_value(geometry)
}

/// Convert an already-parsed `GeoJSON` geometry.
pub fn geometry_from_geojson_value(
    geometry: geojson::Geometry,
) -> GeometryCodecResult<Geometry<f64>> {
    Geometry::<f64>::try_from(geometry).map_err(|err| GeometryCodecError::Decode {
        encoding: GeometryEncoding::GeoJson,
        message: err.to_string(),
        context: None,
    })
}

/// Render a geometry as compact `GeoJSON` geometry text.
pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> GeometryCodecResult<String> {
    let value = geojson::Value::from(geometry);
    serde_json::to_string(&geojson::Geometry::new(value)).map_err(|err| {
        GeometryCodecError::Encode {
            encoding: GeometryEncoding::GeoJson,
            message: err.to_string(),
        }
    })
}

/// Convert WKB bytes straight to `GeoJSON` text.
pub fn wkb_to_geojson(bytes: &[u8]) -> GeometryCodecResult<String> {
    geometry_from_wkb(bytes).and_then(|geometry| geometry_to_geojson(&geometry))
}
