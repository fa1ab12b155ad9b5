//! Spatial and encoding functions for `DataFusion`.
//!
//! Geometry columns are WKB, boundaries are `GeoJSON` text:
//!
//! | Function | Returns |
//! |---|---|
//! | `st_intersects(geometry, boundary_geojson)` | `Boolean` |
//! | `st_envelope_intersects(geometry, xmin, ymin, xmax, ymax)` | `Boolean` |
//! | `st_asgeojson(geometry)` | `Utf8` |
//! | `to_json(value)` | `Utf8` |
//!
//! ```no_run
//! use datafusion::prelude::SessionContext;
//!
//! let ctx = SessionContext::new();
//! datafusion_spatial::register_spatial_functions(&ctx);
//! ```

mod args;
pub mod geojson;
pub mod intersects;
pub mod json;

use datafusion::logical_expr::ScalarUDF;
use datafusion::prelude::SessionContext;

pub use geojson::StAsGeoJson;
pub use intersects::{PreparedBoundary, StEnvelopeIntersects, StIntersects};
pub use json::ToJson;

/// All functions provided by this crate.
#[must_use]
pub fn spatial_functions() -> Vec<ScalarUDF> {
    vec![
        ScalarUDF::new_from_impl(StIntersects::new()),
        ScalarUDF::new_from_impl(StEnvelopeIntersects::new()),
        ScalarUDF::new_from_impl(StAsGeoJson::new()),
        ScalarUDF::new_from_impl(ToJson::new()),
    ]
}

/// Register every function with `ctx`.
pub fn register_spatial_functions(ctx: &SessionContext) {
    for udf in spatial_functions() {
        ctx.register_udf(udf);
    }
}
