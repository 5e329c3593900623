pub mod columnar;
pub mod payload;
pub mod record;
pub mod response;
pub mod schema;

pub use payload::{BatchRequest, PayloadError, unwrap_envelope};
pub use record::{FeatureVector, RecordError, normalize};
pub use response::{ErrorDetail, Health, PredictMode, ResponseDocument, ResponseEntry};
pub use schema::{ARITY, FIELDS, FeatureField};
