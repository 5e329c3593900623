//! Inference layer: random-forest model handle, batch coordination, response shaping.

pub mod adapter;
pub mod coordinator;
pub mod forest;
pub mod labels;
pub mod shaper;

pub use adapter::{ClassId, Classify, ModelAdapter, ModelError};
pub use coordinator::{Outcome, PredictError, PredictionResult, process};
pub use forest::RandomForest;
pub use shaper::{ShapeError, shape};
