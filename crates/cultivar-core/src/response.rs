//! Wire types shared by the server and the client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::RecordError;

/// Which prediction endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictMode {
    /// Labels only (`/predict`).
    Labels,
    /// Labels plus per-class probabilities (`/predict-with-probability`).
    WithProbabilities,
}

impl PredictMode {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Labels => "/predict",
            Self::WithProbabilities => "/predict-with-probability",
        }
    }

    pub fn wants_probabilities(&self) -> bool {
        matches!(self, Self::WithProbabilities)
    }
}

/// Outcome for one input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseEntry {
    Ok {
        /// Raw class index produced by the model.
        prediction: u32,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probabilities: Option<BTreeMap<String, f64>>,
    },
    Error {
        error: ErrorDetail,
    },
}

impl ResponseEntry {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Ok { label, .. } => Some(label),
            Self::Error { .. } => None,
        }
    }
}

/// Error descriptor carried by a failed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorDetail {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

impl From<&RecordError> for ErrorDetail {
    fn from(err: &RecordError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            fields: err.fields().into_iter().map(String::from).collect(),
        }
    }
}

/// Response body: one entry for a single record, a list for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDocument {
    Single(ResponseEntry),
    Batch(Vec<ResponseEntry>),
}

impl ResponseDocument {
    /// Entries in input order.
    pub fn entries(&self) -> &[ResponseEntry] {
        match self {
            Self::Single(entry) => std::slice::from_ref(entry),
            Self::Batch(entries) => entries,
        }
    }

    pub fn into_entries(self) -> Vec<ResponseEntry> {
        match self {
            Self::Single(entry) => vec![entry],
            Self::Batch(entries) => entries,
        }
    }
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub model: String,
    pub version: String,
    pub classes: Vec<String>,
    pub features: usize,
    /// RFC 3339 start time of the serving process.
    pub started_at: String,
}
