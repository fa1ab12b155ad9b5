//! `to_json(value) -> Utf8`
//!
//! Re-encodes any value, including structs, maps and lists, as JSON text.
//! Maps become objects keyed by the map key. `NULL` stays `NULL`.

use std::any::Any;
use std::sync::Arc;

use arrow_array::{Array, RecordBatch};
use arrow_array::builder::StringBuilder;
use arrow_schema::{DataType, Field, Schema};
use datafusion::error::{DataFusionError, Result};
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDFImpl, Signature, Volatility,
};
use serde_json::Value;

use crate::args::take_args;

const VALUE_KEY: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToJson {
    signature: Signature,
}

impl ToJson {
    pub fn new() -> Self {
        Self {
            signature: Signature::any(1, Volatility::Immutable),
        }
    }
}

impl Default for ToJson {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarUDFImpl for ToJson {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "to_json"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Utf8)
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let rows = args.number_rows;
        let [value] = take_args::<1>(self.name(), args.args)?;
        let array = value.into_array(rows)?;

        // Encode the column as one-key JSON lines, then lift the value back out.
        let schema = Schema::new(vec![Field::new(VALUE_KEY, array.data_type().clone(), true)]);
        let batch = RecordBatch::try_new(Arc::new(schema), vec![array])?;
        let mut writer = arrow_json::LineDelimitedWriter::new(Vec::new());
        writer.write(&batch)?;
        writer.finish()?;
        let buffer = writer.into_inner();

        let mut builder = StringBuilder::with_capacity(rows, buffer.len());
        for line in buffer.split(|b| *b == b'\n').filter(|line| !line.is_empty()) {
            let mut object: serde_json::Map<String, Value> = serde_json::from_slice(line)
                .map_err(|err| DataFusionError::Execution(format!("to_json: {err}")))?;
            match object.remove(VALUE_KEY) {
                None | Some(Value::Null) => builder.append_null(),
                Some(value) => builder.append_value(value.to_string()),
            }
        }

        let encoded = builder.finish();
        if encoded.len() != rows {
            return Err(DataFusionError::Internal(format!(
                "to_json produced {} values for {rows} rows",
                encoded.len()
            )));
        }
        Ok(ColumnarValue::Array(Arc::new(encoded)))
    }
}
