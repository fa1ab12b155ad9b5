//! `geoextract-core` resolves a place to an administrative boundary and
//! extracts the rows of a remote Overture-style dataset that intersect it.
//!
//! This crate includes:
//! - **Geometry utilities** ([`bbox`]): bounding boxes and centre scaling.
//! - **Division resolution** ([`resolver`]): by identifier, or by free text
//!   through a [`geocode::Geocoder`] and fuzzy name ranking.
//! - **Column planning** ([`planner`]): which columns the output format can
//!   carry as-is and which must be re-encoded as JSON text.
//! - **Extraction** ([`extract`]): one bounded intersection statement written
//!   atomically to Parquet or `GeoJSON`.
//! - **Engine adapter** ([`engine`]): the `DataFusion` implementation of
//!   [`QueryEngine`].
//!
//! [`pipeline::run`] ties these together for one invocation.

pub mod bbox;
pub mod config;
pub mod division;
pub mod engine;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod pipeline;
pub mod planner;
pub mod release;
pub mod resolver;
pub mod sql;
pub mod utils;

pub use geoextract_core_common::{
    ColumnDescriptor, DatasetLocator, EngineError, EngineResult, OutputFormat, QueryEngine, Row,
};

pub use bbox::BoundingBox;
pub use config::ExtractConfig;
pub use division::Division;
pub use error::{ExtractError, Result};
