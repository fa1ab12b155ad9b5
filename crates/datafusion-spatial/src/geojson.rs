//! `st_asgeojson(geometry_wkb) -> Utf8`
//!
//! Renders each WKB geometry as compact `GeoJSON` geometry text. This is the
//! form the interchange writer embeds as feature geometry.

use std::any::Any;
use std::sync::Arc;

use arrow_array::Array;
use arrow_array::builder::StringBuilder;
use arrow_schema::DataType;
use datafusion::error::Result;
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDFImpl, Signature, Volatility,
};
use datafusion_shared::wkb_to_geojson;

use crate::args::{take_args, to_binary};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StAsGeoJson {
    signature: Signature,
}

impl StAsGeoJson {
    pub fn new() -> Self {
        Self {
            signature: Signature::any(1, Volatility::Immutable),
        }
    }
}

impl Default for StAsGeoJson {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarUDFImpl for StAsGeoJson {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "st_asgeojson"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Utf8)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let rows = args.number_rows;
        let [geometry] = take_args::<1>(self.name(), args.args)?;
        let geometries = to_binary(geometry, rows)?;

        let mut builder = StringBuilder::with_capacity(rows, rows * 64);
        for row in 0..rows {
            if geometries.is_null(row) {
                builder.append_null();
            } else {
                builder.append_value(wkb_to_geojson(geometries.value(row))?);
            }
        }
        Ok(ColumnarValue::Array(Arc::new(builder.finish())))
    }
}
