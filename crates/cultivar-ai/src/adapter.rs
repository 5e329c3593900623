//! Model adapter: the single, read-only model handle used for every request.
//!
//! Loaded once at process start. A load failure is
//! [`ModelError::Unavailable`], which the server treats as fatal; once an
//! adapter exists it always has a model, so per-request code never sees a
//! half-initialized handle.

use std::path::{Path, PathBuf};

use cultivar_core::FeatureVector;
use thiserror::Error;
use tracing::info;

use crate::forest::{ForestError, RandomForest};
use crate::labels::class_name;

/// Raw class identifier produced by the model.
pub type ClassId = u32;

/// Probabilities must sum to one within this tolerance.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Read-only classifier behind the adapter.
///
/// Implementations must not mutate state in `predict_proba`; the adapter is
/// shared across concurrent requests without locking.
pub trait Classify: Send + Sync {
    /// Class ids in probability-column order.
    fn classes(&self) -> &[ClassId];

    /// One probability per class for a single row.
    fn predict_proba(&self, x: &FeatureVector) -> Vec<f64>;
}

impl Classify for RandomForest {
    fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    fn predict_proba(&self, x: &FeatureVector) -> Vec<f64> {
        RandomForest::predict_proba(self, x)
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable ({}): {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: ForestError,
    },

    #[error("model class {class} has no cultivar name")]
    UnlabelledClass { class: ClassId },

    #[error("row {row}: model returned {got} probabilities for {expected} classes")]
    ClassCount {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("row {row}: probabilities are not a distribution (sum {sum})")]
    InvalidDistribution { row: usize, sum: f64 },
}

/// Owner of the model handle.
pub struct ModelAdapter {
    model: Box<dyn Classify>,
    name: String,
}

impl ModelAdapter {
    /// Load a random-forest export from disk.
    ///
    /// Every class the model can emit must have a name in the label table.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let forest = RandomForest::load(path).map_err(|source| ModelError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(&class) = forest.classes.iter().find(|c| class_name(**c).is_none()) {
            return Err(ModelError::UnlabelledClass { class });
        }
        info!(
            path = %path.display(),
            trees = forest.trees.len(),
            classes = forest.classes.len(),
            "loaded model"
        );
        let name = format!("Random Forest Wine Classifier ({} trees)", forest.trees.len());
        Ok(Self::new(forest, name))
    }

    pub fn new(model: impl Classify + 'static, name: impl Into<String>) -> Self {
        Self {
            model: Box::new(model),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[ClassId] {
        self.model.classes()
    }

    /// One label per row, in row order.
    pub fn classify(&self, matrix: &[FeatureVector]) -> Result<Vec<ClassId>, ModelError> {
        Ok(self.classify_with_probabilities(matrix)?.0)
    }

    /// Labels plus a validated probability row per input row.
    ///
    /// The label is the most probable class; ties go to the earlier class.
    pub fn classify_with_probabilities(
        &self,
        matrix: &[FeatureVector],
    ) -> Result<(Vec<ClassId>, Vec<Vec<f64>>), ModelError> {
        let classes = self.model.classes();
        let mut labels = Vec::with_capacity(matrix.len());
        let mut probabilities = Vec::with_capacity(matrix.len());

        for (row, x) in matrix.iter().enumerate() {
            let proba = self.model.predict_proba(x);
            check_distribution(row, &proba, classes.len())?;

            let best = proba
                .iter()
                .enumerate()
                .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });
            labels.push(classes[best]);
            probabilities.push(proba);
        }

        Ok((labels, probabilities))
    }
}

fn check_distribution(row: usize, proba: &[f64], expected: usize) -> Result<(), ModelError> {
    if proba.len() != expected || expected == 0 {
        return Err(ModelError::ClassCount {
            row,
            expected,
            got: proba.len(),
        });
    }
    let sum: f64 = proba.iter().sum();
    let valid = proba.iter().all(|p| p.is_finite() && *p >= 0.0)
        && (sum - 1.0).abs() <= PROBABILITY_TOLERANCE;
    if !valid {
        return Err(ModelError::InvalidDistribution { row, sum });
    }
    Ok(())
}
