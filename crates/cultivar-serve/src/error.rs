use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cultivar_ai::{ModelError, PredictError, ShapeError};
use cultivar_core::{ErrorDetail, ResponseEntry};
use thiserror::Error;
use tracing::{error, warn};

/// Start-up failures.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("server I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Request-level failures, answered without per-record entries.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MalformedJson(_) | Self::Predict(PredictError::InvalidPayload(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Predict(_) | Self::Shape(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson(_) => "malformed_json",
            Self::Predict(PredictError::InvalidPayload(_)) => "invalid_payload",
            Self::Predict(_) => "model_error",
            Self::Shape(ShapeError::UnknownLabel(_)) => "unknown_label",
            Self::Shape(_) => "shape_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "prediction request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "rejected prediction request");
        }
        let body = ResponseEntry::Error {
            error: ErrorDetail::new(self.kind(), self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
