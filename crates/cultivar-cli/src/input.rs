//! Input files: JSON payloads (with optional upload envelope) or Parquet tables.

use std::path::Path;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use cultivar_core::columnar::records_from_batch;
use cultivar_core::unwrap_envelope;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;
use tracing::info;

/// Load a request payload. Parquet files always yield a batch.
pub fn load(path: &Path) -> anyhow::Result<Value> {
    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        load_parquet(path)
    } else {
        load_json(path)
    }
}

fn load_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(unwrap_envelope(value))
}

fn load_parquet(path: &Path) -> anyhow::Result<Value> {
    let file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>()?;

    let mut records = Vec::new();
    for batch in &batches {
        records.extend(records_from_batch(batch)?);
    }
    info!(rows = records.len(), path = %path.display(), "read parquet records");
    Ok(Value::Array(records))
}
