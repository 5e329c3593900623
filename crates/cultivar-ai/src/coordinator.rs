//! Batch coordination: payload → per-record outcomes in input order.
//!
//! Each record is normalized on its own. Only the records that normalized
//! are sent to the model, as one matrix in their original relative order;
//! failures are merged back by position afterwards.

use cultivar_core::{BatchRequest, FeatureVector, PayloadError, PredictMode, RecordError, normalize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::adapter::{ClassId, ModelAdapter, ModelError};

/// Outcome for one input position.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResult {
    Classified {
        class: ClassId,
        /// One value per model class, present when probabilities were requested.
        probabilities: Option<Vec<f64>>,
    },
    Invalid(RecordError),
}

/// Results for a whole request.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Whether the payload was a list (and so must be answered with a list).
    pub batch: bool,
    /// Exactly one result per input record, in input order.
    pub results: Vec<PredictionResult>,
}

/// Request-level failures. Per-record problems never end up here.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model returned {got} predictions for {expected} valid records")]
    MissingPrediction { expected: usize, got: usize },
}

/// Normalize, classify and reassemble a request payload.
pub fn process(
    model: &ModelAdapter,
    payload: &Value,
    mode: PredictMode,
) -> Result<Outcome, PredictError> {
    let request = BatchRequest::detect(payload)?;

    let normalized: Vec<Result<FeatureVector, RecordError>> =
        request.records().iter().map(normalize).collect();
    let matrix: Vec<FeatureVector> = normalized
        .iter()
        .filter_map(|r| r.as_ref().ok().copied())
        .collect();

    let (labels, probabilities): (Vec<ClassId>, Vec<Option<Vec<f64>>>) =
        if mode.wants_probabilities() {
            let (labels, proba) = model.classify_with_probabilities(&matrix)?;
            (labels, proba.into_iter().map(Some).collect())
        } else {
            let labels = model.classify(&matrix)?;
            let none = vec![None; labels.len()];
            (labels, none)
        };

    let got = labels.len();
    let mut predictions = labels.into_iter().zip(probabilities);
    let mut results = Vec::with_capacity(normalized.len());
    for record in normalized {
        let result = match record {
            Ok(_) => {
                let (class, probabilities) = predictions
                    .next()
                    .ok_or(PredictError::MissingPrediction {
                        expected: matrix.len(),
                        got,
                    })?;
                PredictionResult::Classified {
                    class,
                    probabilities,
                }
            }
            Err(err) => PredictionResult::Invalid(err),
        };
        results.push(result);
    }

    debug!(
        records = results.len(),
        classified = matrix.len(),
        invalid = results.len() - matrix.len(),
        batch = request.is_batch(),
        "processed prediction request"
    );

    Ok(Outcome {
        batch: request.is_batch(),
        results,
    })
}
