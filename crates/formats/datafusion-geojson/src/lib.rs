//! `GeoJSON` output for Arrow record batches.
//!
//! The writer expects the geometry column to already hold `GeoJSON` geometry
//! text (for example the output of `st_asgeojson`); every other column becomes
//! a feature property. Columns must be JSON-encodable scalars or values that
//! were re-encoded as text beforehand.

pub mod writer;

pub use writer::{GeoJsonWriterOptions, write_geojson, write_geojson_to_bytes};
