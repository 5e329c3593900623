//! Response shaping: positional outcomes → response document.

use std::collections::BTreeMap;

use cultivar_core::{ErrorDetail, ResponseDocument, ResponseEntry};
use thiserror::Error;
use tracing::error;

use crate::adapter::ClassId;
use crate::coordinator::{Outcome, PredictionResult};
use crate::labels::class_name;

/// Shaping failures. Each indicates a model/label-table mismatch and fails
/// the whole response.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("model produced unknown label id {0}")]
    UnknownLabel(ClassId),

    #[error("single-record request produced {0} results")]
    NotSingle(usize),
}

/// Build the response document.
///
/// `classes` gives the class id of each probability column, as reported by
/// the model adapter.
pub fn shape(outcome: &Outcome, classes: &[ClassId]) -> Result<ResponseDocument, ShapeError> {
    let entries = outcome
        .results
        .iter()
        .map(|r| shape_entry(r, classes))
        .collect::<Result<Vec<_>, _>>()?;

    if outcome.batch {
        return Ok(ResponseDocument::Batch(entries));
    }
    match <[ResponseEntry; 1]>::try_from(entries) {
        Ok([entry]) => Ok(ResponseDocument::Single(entry)),
        Err(entries) => Err(ShapeError::NotSingle(entries.len())),
    }
}

fn shape_entry(result: &PredictionResult, classes: &[ClassId]) -> Result<ResponseEntry, ShapeError> {
    match result {
        PredictionResult::Invalid(err) => Ok(ResponseEntry::Error {
            error: ErrorDetail::from(err),
        }),
        PredictionResult::Classified {
            class,
            probabilities,
        } => {
            let label = lookup(*class)?;
            let probabilities = match probabilities {
                Some(row) => {
                    let mut named = BTreeMap::new();
                    for (id, p) in classes.iter().zip(row) {
                        named.insert(lookup(*id)?.to_string(), *p);
                    }
                    Some(named)
                }
                None => None,
            };
            Ok(ResponseEntry::Ok {
                prediction: *class,
                label: label.to_string(),
                probabilities,
            })
        }
    }
}

fn lookup(id: ClassId) -> Result<&'static str, ShapeError> {
    class_name(id).ok_or_else(|| {
        error!(class = id, "model label has no class name; label table and model disagree");
        ShapeError::UnknownLabel(id)
    })
}
