//! Terminal rendering of prediction results, health and schema.
//!
//! Results go through an Arrow RecordBatch so the table layout comes from
//! Arrow's pretty printer.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use cultivar_core::columnar::features_to_batch;
use cultivar_core::schema::FIELDS;
use cultivar_core::{FeatureVector, Health, ResponseDocument, ResponseEntry};

// ── Public API ──

/// Print a response document as a table (or JSON) plus a one-line summary.
pub fn print_document(doc: &ResponseDocument, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(doc)?);
        return Ok(());
    }

    let entries = doc.entries();
    if entries.is_empty() {
        println!("(no records)");
        return Ok(());
    }

    println!("{}", render_results(entries)?);
    let ok = entries.iter().filter(|e| e.is_ok()).count();
    println!(
        "{} record(s): {ok} classified, {} failed",
        entries.len(),
        entries.len() - ok
    );
    Ok(())
}

/// Inference time, and the number of HTTP calls when the result came from a server.
pub fn timing_line(elapsed: Duration, calls: Option<usize>) -> String {
    let secs = elapsed.as_secs_f64();
    match calls {
        Some(n) => format!("elapsed {secs:.3} s over {n} request(s)"),
        None => format!("inference time {secs:.3} s"),
    }
}

pub fn render_features(rows: &[FeatureVector]) -> anyhow::Result<String> {
    let batch = features_to_batch(rows)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

pub fn print_health(health: &Health) {
    println!("Backend online");
    println!("  {:<12} {}", "model", health.model);
    println!("  {:<12} {}", "version", health.version);
    println!("  {:<12} {}", "classes", health.classes.join(", "));
    println!("  {:<12} {}", "features", health.features);
    println!("  {:<12} {}", "started_at", health.started_at);
}

pub fn print_schema() {
    for (i, f) in FIELDS.iter().enumerate() {
        println!(
            "  {:>2}  {:<30} {:<30} [{}, {}]",
            i, f.name, f.description, f.example_range.0, f.example_range.1
        );
    }
}

// ── Result table ──

fn render_results(entries: &[ResponseEntry]) -> anyhow::Result<String> {
    let batch = results_batch(entries)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

/// One row per entry: position, status, prediction, label, one column per
/// class probability (when any entry has them), error message.
fn results_batch(entries: &[ResponseEntry]) -> Result<RecordBatch, ArrowError> {
    let classes: BTreeSet<&str> = entries
        .iter()
        .filter_map(|e| match e {
            ResponseEntry::Ok {
                probabilities: Some(p),
                ..
            } => Some(p.keys().map(String::as_str)),
            _ => None,
        })
        .flatten()
        .collect();

    let mut fields = vec![
        Field::new("#", DataType::UInt64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("prediction", DataType::UInt32, true),
        Field::new("label", DataType::Utf8, true),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(0..entries.len() as u64)),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| {
            if e.is_ok() { "ok" } else { "error" }
        }))),
        Arc::new(UInt32Array::from_iter(entries.iter().map(|e| match e {
            ResponseEntry::Ok { prediction, .. } => Some(*prediction),
            ResponseEntry::Error { .. } => None,
        }))),
        Arc::new(StringArray::from_iter(entries.iter().map(|e| e.label()))),
    ];

    for class in &classes {
        fields.push(Field::new(format!("p({class})"), DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from_iter(entries.iter().map(|e| {
            match e {
                ResponseEntry::Ok {
                    probabilities: Some(p),
                    ..
                } => p.get(*class).copied(),
                _ => None,
            }
        }))));
    }

    fields.push(Field::new("error", DataType::Utf8, true));
    columns.push(Arc::new(StringArray::from_iter(entries.iter().map(|e| {
        match e {
            ResponseEntry::Error { error } => Some(error.message.as_str()),
            ResponseEntry::Ok { .. } => None,
        }
    }))));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}
