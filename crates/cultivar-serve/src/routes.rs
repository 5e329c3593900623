use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cultivar_ai::labels::class_name;
use cultivar_ai::{process, shape};
use cultivar_core::{ARITY, Health, PredictMode, ResponseDocument, ResponseEntry};
use serde_json::Value;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub(crate) async fn health(State(state): State<AppState>) -> Json<Health> {
    let classes = state
        .model()
        .classes()
        .iter()
        .map(|id| class_name(*id).map_or_else(|| format!("unknown({id})"), String::from))
        .collect();
    Json(Health {
        status: "healthy".into(),
        model: state.model().name().to_string(),
        version: env!("CARGO_PKG_VERSION").into(),
        classes,
        features: ARITY,
        started_at: state.started_at.to_rfc3339(),
    })
}

pub(crate) async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    respond(&state, &body, PredictMode::Labels)
}

pub(crate) async fn predict_with_probability(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    respond(&state, &body, PredictMode::WithProbabilities)
}

/// Parse, classify and shape one request.
///
/// A batch is always 200 with per-record entries; a single record that fails
/// validation is 422 with its error entry as the body.
fn respond(state: &AppState, body: &[u8], mode: PredictMode) -> Result<Response, ApiError> {
    let payload: Value = serde_json::from_slice(body)?;
    let outcome = process(state.model(), &payload, mode)?;
    let doc = shape(&outcome, state.model().classes())?;

    let entries = doc.entries();
    let ok = entries.iter().filter(|e| e.is_ok()).count();
    info!(
        endpoint = mode.endpoint(),
        records = entries.len(),
        ok,
        failed = entries.len() - ok,
        "served prediction"
    );

    let status = match &doc {
        ResponseDocument::Single(ResponseEntry::Error { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    Ok((status, Json(doc)).into_response())
}
