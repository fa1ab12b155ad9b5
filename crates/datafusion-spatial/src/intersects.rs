//! Intersection predicates over WKB geometry columns.
//!
//! - `st_intersects(geometry, boundary)` is the exact predicate: `geometry` is
//!   a WKB column and `boundary` is `GeoJSON` text, normally a literal.
//! - `st_envelope_intersects(geometry, xmin, ymin, xmax, ymax)` compares the
//!   geometry's bounding rectangle with an axis-aligned query envelope.
//!
//! Both return `NULL` when any input is `NULL` and fail the query on
//! undecodable geometry.

use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use arrow_array::Array;
use arrow_array::builder::BooleanBuilder;
use arrow_schema::DataType;
use datafusion::error::Result;
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDFImpl, Signature, Volatility,
};
use datafusion_shared::{geometry_from_geojson, geometry_from_wkb};
use geo::{BoundingRect, Intersects};
use geo_types::{Geometry, Rect, coord};

use crate::args::{scalar_text, take_args, to_binary, to_float64, to_utf8};

/// A boundary with its bounding rectangle computed once.
#[derive(Debug, Clone)]
pub struct PreparedBoundary {
    geometry: Geometry<f64>,
    rect: Option<Rect<f64>>,
}

impl PreparedBoundary {
    #[must_use]
    pub fn new(geometry: Geometry<f64>) -> Self {
        let rect = geometry.bounding_rect();
        Self { geometry, rect }
    }

    /// Exact intersection test, short-circuited on disjoint rectangles.
    #[must_use]
    pub fn intersects(&self, other: &Geometry<f64>) -> bool {
        match (self.rect, other.bounding_rect()) {
            (Some(ours), Some(theirs)) if !ours.intersects(&theirs) => false,
            (_, None) | (None, _) => false,
            _ => self.geometry.intersects(other),
        }
    }
}

fn parse_boundary(text: &str) -> Result<PreparedBoundary> {
    let geometry =
        geometry_from_geojson(text).map_err(|err| err.with_context("st_intersects boundary"))?;
    Ok(PreparedBoundary::new(geometry))
}

/// The last literal boundary seen, keyed on its text. A statement passes the
/// same literal for every batch, so it is parsed once per statement.
#[derive(Debug, Default)]
struct BoundaryCache(Mutex<Option<(String, Arc<PreparedBoundary>)>>);

impl BoundaryCache {
    fn get_or_parse(&self, text: &str) -> Result<Arc<PreparedBoundary>> {
        if let Ok(cached) = self.0.lock() {
            if let Some((key, boundary)) = cached.as_ref() {
                if key == text {
                    return Ok(Arc::clone(boundary));
                }
            }
        }

        let boundary = Arc::new(parse_boundary(text)?);
        if let Ok(mut cached) = self.0.lock() {
            *cached = Some((text.to_string(), Arc::clone(&boundary)));
        }
        Ok(boundary)
    }
}

/// Boundary argument: one prepared literal, or text per row.
enum BoundaryArg {
    Literal(Option<Arc<PreparedBoundary>>),
    PerRow(arrow_array::StringArray),
}

impl BoundaryArg {
    fn try_new(value: ColumnarValue, rows: usize, cache: &BoundaryCache) -> Result<Self> {
        match value {
            ColumnarValue::Scalar(scalar) => {
                let boundary = scalar_text(&scalar)?
                    .map(|text| cache.get_or_parse(text))
                    .transpose()?;
                Ok(BoundaryArg::Literal(boundary))
            },
            array @ ColumnarValue::Array(_) => Ok(BoundaryArg::PerRow(to_utf8(array, rows)?)),
        }
    }

    fn get(&self, row: usize) -> Result<Option<Arc<PreparedBoundary>>> {
        match self {
            BoundaryArg::Literal(boundary) => Ok(boundary.clone()),
            BoundaryArg::PerRow(texts) if texts.is_null(row) => Ok(None),
            BoundaryArg::PerRow(texts) => Ok(Some(Arc::new(parse_boundary(texts.value(row))?))),
        }
    }
}

/// `st_intersects(geometry_wkb, boundary_geojson) -> Boolean`
#[derive(Debug)]
pub struct StIntersects {
    signature: Signature,
    boundaries: BoundaryCache,
}

impl StIntersects {
    pub fn new() -> Self {
        Self {
            signature: Signature::any(2, Volatility::Immutable),
            boundaries: BoundaryCache::default(),
        }
    }
}

// The cache does not change results, so it takes no part in equality.
impl PartialEq for StIntersects {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for StIntersects {}

impl Hash for StIntersects {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

impl Default for StIntersects {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarUDFImpl for StIntersects {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "st_intersects"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Boolean)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let rows = args.number_rows;
        let [geometry, boundary] = take_args::<2>(self.name(), args.args)?;
        let boundary = BoundaryArg::try_new(boundary, rows, &self.boundaries)?;
        let geometries = to_binary(geometry, rows)?;

        // A NULL literal boundary matches nothing.
        if let BoundaryArg::Literal(None) = boundary {
            let mut builder = BooleanBuilder::with_capacity(rows);
            builder.append_nulls(rows);
            return Ok(ColumnarValue::Array(Arc::new(builder.finish())));
        }

        let mut builder = BooleanBuilder::with_capacity(rows);
        for row in 0..rows {
            if geometries.is_null(row) {
                builder.append_null();
                continue;
            }
            let Some(prepared) = boundary.get(row)? else {
                builder.append_null();
                continue;
            };
            let geometry = geometry_from_wkb(geometries.value(row))?;
            builder.append_value(prepared.intersects(&geometry));
        }
        Ok(ColumnarValue::Array(Arc::new(builder.finish())))
    }
}

/// `st_envelope_intersects(geometry_wkb, xmin, ymin, xmax, ymax) -> Boolean`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StEnvelopeIntersects {
    signature: Signature,
}

impl StEnvelopeIntersects {
    pub fn new() -> Self {
        Self {
            signature: Signature::any(5, Volatility::Immutable),
        }
    }
}

impl Default for StEnvelopeIntersects {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarUDFImpl for StEnvelopeIntersects {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "st_envelope_intersects"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Boolean)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let rows = args.number_rows;
        let [geometry, xmin, ymin, xmax, ymax] = take_args::<5>(self.name(), args.args)?;
        let geometries = to_binary(geometry, rows)?;
        let xmin = to_float64(xmin, rows)?;
        let ymin = to_float64(ymin, rows)?;
        let xmax = to_float64(xmax, rows)?;
        let ymax = to_float64(ymax, rows)?;

        let mut builder = BooleanBuilder::with_capacity(rows);
        for row in 0..rows {
            if geometries.is_null(row)
                || xmin.is_null(row)
                || ymin.is_null(row)
                || xmax.is_null(row)
                || ymax.is_null(row)
            {
                builder.append_null();
                continue;
            }
            let envelope = Rect::new(
                coord! { x: xmin.value(row), y: ymin.value(row) },
                coord! { x: xmax.value(row), y: ymax.value(row) },
            );
            let geometry = geometry_from_wkb(geometries.value(row))?;
            let hit = geometry
                .bounding_rect()
                .is_some_and(|rect| rect.intersects(&envelope));
            builder.append_value(hit);
        }
        Ok(ColumnarValue::Array(Arc::new(builder.finish())))
    }
}
