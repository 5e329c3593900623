//! Client for the prediction API, as used by the dashboard and the CLI.

pub mod http;

pub use http::{ClientError, PredictClient, Prediction};
