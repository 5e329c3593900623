//! Arrow views of the feature schema.
//!
//! Lets tabular inputs (Parquet files, Arrow batches) enter the same
//! normalization path as JSON: rows become JSON objects keyed by column
//! name, so missing or mistyped columns are reported per record.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde_json::{Map, Number, Value};

use crate::record::FeatureVector;
use crate::schema::FIELDS;

/// Arrow schema of a normalized feature matrix: 13 non-nullable Float64 columns.
pub fn feature_schema() -> Schema {
    Schema::new(
        FIELDS
            .iter()
            .map(|f| Field::new(f.name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    )
}

/// Build a RecordBatch from normalized feature vectors.
pub fn features_to_batch(rows: &[FeatureVector]) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = (0..FIELDS.len())
        .map(|i| Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r[i]))) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(feature_schema()), columns)
}

/// Convert every row of a batch into a JSON object keyed by column name.
///
/// Numeric columns become JSON numbers (non-finite values become strings so
/// the normalizer rejects them), nulls become `null`, everything else is
/// rendered with Arrow's display formatting.
pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<Value>, ArrowError> {
    let schema = batch.schema();
    let mut rows = vec![Map::new(); batch.num_rows()];

    for (field, col) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();

        if field.data_type().is_numeric() {
            let floats = cast(col, &DataType::Float64)?;
            let floats = floats
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| ArrowError::CastError(format!("column '{name}' is not Float64")))?;
            for (row, out) in rows.iter_mut().enumerate() {
                let value = if floats.is_null(row) {
                    Value::Null
                } else {
                    let v = floats.value(row);
                    Number::from_f64(v)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(v.to_string()))
                };
                out.insert(name.clone(), value);
            }
        } else {
            let fmt = ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())?;
            for (row, out) in rows.iter_mut().enumerate() {
                let value = if col.is_null(row) {
                    Value::Null
                } else {
                    Value::String(fmt.value(row).to_string())
                };
                out.insert(name.clone(), value);
            }
        }
    }

    Ok(rows.into_iter().map(Value::Object).collect())
}
