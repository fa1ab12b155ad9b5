//! Argument coercion shared by the spatial functions.
//!
//! Functions accept any physical string/binary/numeric layout (`Utf8View`,
//! `LargeBinary`, `Float32`, ...) and normalize it with a cast before use.

use arrow_array::cast::AsArray;
use arrow_array::types::Float64Type;
use arrow_array::{ArrayRef, BinaryArray, Float64Array, StringArray};
use arrow_schema::DataType;
use datafusion::common::ScalarValue;
use datafusion::error::{DataFusionError, Result};
use datafusion::logical_expr::ColumnarValue;

/// Split the call arguments into exactly `N` values.
pub(crate) fn take_args<const N: usize>(
    name: &str,
    args: Vec<ColumnarValue>,
) -> Result<[ColumnarValue; N]> {
    args.try_into().map_err(|args: Vec<ColumnarValue>| {
        DataFusionError::Plan(format!(
            "{name} expects {N} argument(s), got {}",
            args.len()
        ))
    })
}

pub(crate) fn to_binary(value: ColumnarValue, rows: usize) -> Result<BinaryArray> {
    let array = value.into_array(rows)?;
    let cast = cast_to(&array, &DataType::Binary)?;
    Ok(cast.as_binary::<i32>().clone())
}

pub(crate) fn to_float64(value: ColumnarValue, rows: usize) -> Result<Float64Array> {
    let array = value.into_array(rows)?;
    let cast = cast_to(&array, &DataType::Float64)?;
    Ok(cast.as_primitive::<Float64Type>().clone())
}

pub(crate) fn to_utf8(value: ColumnarValue, rows: usize) -> Result<StringArray> {
    let array = value.into_array(rows)?;
    let cast = cast_to(&array, &DataType::Utf8)?;
    Ok(cast.as_string::<i32>().clone())
}

/// Text of a scalar string argument; `Ok(None)` for a SQL `NULL`.
pub(crate) fn scalar_text(value: &ScalarValue) -> Result<Option<&str>> {
    match value {
        ScalarValue::Utf8(text) | ScalarValue::LargeUtf8(text) | ScalarValue::Utf8View(text) => {
            Ok(text.as_deref())
        },
        ScalarValue::Null => Ok(None),
        other => Err(DataFusionError::Plan(format!(
            "expected a string argument, got {}",
            other.data_type()
        ))),
    }
}

fn cast_to(array: &ArrayRef, data_type: &DataType) -> Result<ArrayRef> {
    if array.data_type() == data_type {
        return Ok(ArrayRef::clone(array));
    }
    Ok(arrow_cast::cast(array, data_type)?)
}
