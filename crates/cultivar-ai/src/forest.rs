//! Random-forest classifier loaded from a JSON export.
//!
//! Inference only. Trees are exported from a fitted scikit-learn
//! `RandomForestClassifier` as flat node arrays in pre-order: a split node
//! sends a sample left when `x[feature] <= threshold`, a leaf carries the
//! per-class sample counts that reached it.

use std::path::Path;

use cultivar_core::FeatureVector;
use cultivar_core::schema::{self, ARITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse model file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(String),
}

/// One node of a decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Split feature index; `None` marks a leaf.
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    /// Per-class counts at a leaf, one entry per class.
    #[serde(default)]
    pub value: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Model data for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    /// Class ids in probability-column order.
    pub classes: Vec<u32>,
    /// Training column names; checked against the feature schema when present.
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Load and validate a forest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ForestError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ForestError> {
        let forest: Self = serde_json::from_str(text)?;
        forest.validate()?;
        Ok(forest)
    }

    /// Structural checks so that prediction can never index out of bounds
    /// or loop.
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.n_features != ARITY {
            return Err(invalid(format!(
                "model expects {} features, schema has {ARITY}",
                self.n_features
            )));
        }
        if !self.feature_names.is_empty() && !self.feature_names.iter().map(String::as_str).eq(schema::names())
        {
            return Err(invalid("feature_names do not match the schema order"));
        }
        if self.classes.is_empty() {
            return Err(invalid("no classes"));
        }
        let mut seen = self.classes.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.classes.len() {
            return Err(invalid("duplicate class ids"));
        }
        if self.trees.is_empty() {
            return Err(invalid("no trees"));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(invalid(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                self.validate_node(t, i, node, tree.nodes.len())?;
            }
        }
        Ok(())
    }

    fn validate_node(
        &self,
        t: usize,
        i: usize,
        node: &TreeNode,
        len: usize,
    ) -> Result<(), ForestError> {
        match node.feature {
            Some(feature) => {
                if feature >= ARITY {
                    return Err(invalid(format!("tree {t} node {i}: feature {feature} out of range")));
                }
                if !node.threshold.is_finite() {
                    return Err(invalid(format!("tree {t} node {i}: non-finite threshold")));
                }
                // Pre-order export: children always follow their parent.
                for child in [node.left, node.right] {
                    match child {
                        Some(c) if c > i && c < len => {}
                        _ => {
                            return Err(invalid(format!(
                                "tree {t} node {i}: bad child index {child:?}"
                            )));
                        }
                    }
                }
            }
            None => {
                if node.value.len() != self.classes.len() {
                    return Err(invalid(format!(
                        "tree {t} leaf {i}: {} class counts for {} classes",
                        node.value.len(),
                        self.classes.len()
                    )));
                }
                if node.value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(invalid(format!("tree {t} leaf {i}: negative or non-finite count")));
                }
                if node.value.iter().sum::<f64>() <= 0.0 {
                    return Err(invalid(format!("tree {t} leaf {i}: empty distribution")));
                }
            }
        }
        Ok(())
    }

    /// Mean of the normalized leaf distributions across all trees.
    pub fn predict_proba(&self, x: &FeatureVector) -> Vec<f64> {
        let mut proba = vec![0.0f64; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(x);
            let total: f64 = leaf.value.iter().sum();
            for (p, v) in proba.iter_mut().zip(&leaf.value) {
                *p += v / total;
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n;
        }
        proba
    }
}

impl DecisionTree {
    fn leaf(&self, x: &FeatureVector) -> &TreeNode {
        let mut node = &self.nodes[0];
        while let (Some(feature), Some(left), Some(right)) = (node.feature, node.left, node.right) {
            node = if x[feature] <= node.threshold {
                &self.nodes[left]
            } else {
                &self.nodes[right]
            };
        }
        node
    }
}

fn invalid(msg: impl Into<String>) -> ForestError {
    ForestError::Invalid(msg.into())
}
