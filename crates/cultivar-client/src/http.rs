//! HTTP client for the prediction API.
//!
//! Batches are sent as one request. Servers that only accept a single
//! record per call reject a list with 422 and an "object expected" detail;
//! the client then calls the endpoint once per record and assembles the
//! entries in input order. Fallback entries follow the same contract as
//! true batch entries: one per record, `ok` or `error`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use cultivar_ai::ClassId;
use cultivar_ai::labels::class_name;
use cultivar_core::{ErrorDetail, Health, PredictMode, ResponseDocument, ResponseEntry};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A response document and the time spent on the wire to get it.
#[derive(Debug)]
pub struct Prediction {
    pub document: ResponseDocument,
    /// Summed over every HTTP call, fallback calls included.
    pub elapsed: Duration,
    pub calls: usize,
}

/// Client for a prediction server.
pub struct PredictClient {
    client: reqwest::Client,
    base_url: String,
}

impl PredictClient {
    /// Create a client for the given base URL, like `http://localhost:8000`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the health document.
    pub async fn health(&self) -> Result<Health, ClientError> {
        let url = format!("{}/", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Request predictions for one record (object) or many (array).
    ///
    /// A single record rejected by validation comes back as `Ok` with an
    /// error entry, the same as a failed record inside a batch.
    pub async fn predict(
        &self,
        payload: &Value,
        mode: PredictMode,
    ) -> Result<Prediction, ClientError> {
        let url = format!("{}{}", self.base_url, mode.endpoint());
        let records = payload.as_array().map_or(1, Vec::len);

        info!(url = %url, records, "requesting predictions");
        let started = Instant::now();
        let resp = self
            .client
            .post(&url)
            .timeout(DEFAULT_TIMEOUT)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        let elapsed = started.elapsed();

        if status.is_success() {
            let document = parse_document(&body, payload.is_object())?;
            info!(
                entries = document.entries().len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "predictions received"
            );
            return Ok(Prediction {
                document,
                elapsed,
                calls: 1,
            });
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Value::Array(records) = payload
                && expects_object(&body)
            {
                warn!(
                    records = records.len(),
                    "server rejected batch; falling back to one request per record"
                );
                let (entries, fallback) = self.predict_each(&url, records).await;
                let elapsed = elapsed + fallback;
                info!(
                    entries = entries.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "fallback predictions received"
                );
                return Ok(Prediction {
                    document: ResponseDocument::Batch(entries),
                    elapsed,
                    calls: records.len() + 1,
                });
            }
            if payload.is_object()
                && let Ok(entry) = serde_json::from_str::<ResponseEntry>(&body)
            {
                return Ok(Prediction {
                    document: ResponseDocument::Single(entry),
                    elapsed,
                    calls: 1,
                });
            }
        }

        Err(ClientError::Server {
            status: status.as_u16(),
            body,
        })
    }

    async fn predict_each(&self, url: &str, records: &[Value]) -> (Vec<ResponseEntry>, Duration) {
        let mut entries = Vec::with_capacity(records.len());
        let mut total = Duration::ZERO;
        for (i, record) in records.iter().enumerate() {
            let started = Instant::now();
            let entry = self.predict_one(url, record).await;
            let elapsed = started.elapsed();
            debug!(
                record = i,
                ok = entry.is_ok(),
                elapsed_ms = elapsed.as_millis() as u64,
                "fallback call"
            );
            total += elapsed;
            entries.push(entry);
        }
        (entries, total)
    }

    /// One fallback call. Every failure becomes an error entry for this
    /// record only.
    async fn predict_one(&self, url: &str, record: &Value) -> ResponseEntry {
        let sent = self
            .client
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .json(record)
            .send()
            .await;
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => return error_entry("transport", format!("request failed: {e}")),
        };
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return error_entry("transport", format!("reading response: {e}")),
        };

        if status.is_success() {
            return parse_entry(&body).unwrap_or_else(|e| {
                error_entry("invalid_response", format!("unexpected response body: {e}"))
            });
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return serde_json::from_str(&body)
                .unwrap_or_else(|_| error_entry("rejected", body));
        }
        error_entry("server_error", format!("{status}: {body}"))
    }
}

/// Body of a single-record FastAPI backend:
/// `{"prediction": 0, "class_name": "class_0", "probabilities": {"class_0": 0.9, ..}}`.
#[derive(Debug, Deserialize)]
struct LegacyPrediction {
    prediction: ClassId,
    class_name: String,
    #[serde(default)]
    probabilities: Option<BTreeMap<String, f64>>,
}

impl LegacyPrediction {
    fn into_entry(self) -> ResponseEntry {
        let Some(label) = class_name(self.prediction) else {
            return error_entry(
                "unknown_label",
                format!(
                    "class {} ({}) has no cultivar name",
                    self.prediction, self.class_name
                ),
            );
        };
        let probabilities = self
            .probabilities
            .map(|p| p.into_iter().map(|(k, v)| (cultivar_key(k), v)).collect());
        ResponseEntry::Ok {
            prediction: self.prediction,
            label: label.to_string(),
            probabilities,
        }
    }
}

/// `class_2` → `Cultivar C`. Keys without a known class index are kept.
fn cultivar_key(key: String) -> String {
    let index = key.rsplit('_').next().and_then(|i| i.parse::<ClassId>().ok());
    match index.and_then(class_name) {
        Some(name) => name.to_string(),
        None => key,
    }
}

/// One entry, in either this server's shape or the legacy one.
fn parse_entry(body: &str) -> Result<ResponseEntry, serde_json::Error> {
    serde_json::from_str::<ResponseEntry>(body).or_else(|e| {
        serde_json::from_str::<LegacyPrediction>(body)
            .map(LegacyPrediction::into_entry)
            .map_err(|_| e)
    })
}

fn parse_document(body: &str, single: bool) -> Result<ResponseDocument, serde_json::Error> {
    if single {
        return parse_entry(body).map(ResponseDocument::Single);
    }
    serde_json::from_str(body)
}

fn error_entry(kind: &str, message: String) -> ResponseEntry {
    ResponseEntry::Error {
        error: ErrorDetail::new(kind, message),
    }
}

/// Whether a 422 body says the server wanted a single object, not a list.
///
/// Recognizes FastAPI/pydantic validation details
/// (`{"detail": [{"msg": "Input should be a valid dictionary or object ..."}]}`).
fn expects_object(body: &str) -> bool {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    parsed["detail"].as_array().is_some_and(|details| {
        details.iter().any(|d| {
            d["msg"]
                .as_str()
                .is_some_and(|msg| msg.contains("dictionary or object"))
        })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use cultivar_ai::{ModelAdapter, RandomForest};
    use cultivar_serve::{AppState, router};
    use serde_json::json;

    use super::*;

    const DEMO_MODEL: &str = include_str!("../../../models/wine_forest.json");
    const SINGLE: &str = include_str!("../../../demos/single.json");

    fn single() -> Value {
        serde_json::from_str(SINGLE).unwrap()
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_demo_server() -> PredictClient {
        let forest = RandomForest::from_json_str(DEMO_MODEL).unwrap();
        let app = router(AppState::new(ModelAdapter::new(forest, "demo")));
        PredictClient::new(spawn(app).await)
    }

    /// A FastAPI-style server that accepts exactly one object per
    /// call and rejects lists with a pydantic-style 422.
    async fn spawn_single_only_server(calls: Arc<AtomicUsize>) -> PredictClient {
        async fn handler(
            State(calls): State<Arc<AtomicUsize>>,
            Json(body): Json<Value>,
        ) -> (AxumStatus, Json<Value>) {
            calls.fetch_add(1, Ordering::SeqCst);
            if body.is_array() {
                return (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": [{
                        "type": "model_attributes_type",
                        "msg": "Input should be a valid dictionary or object to extract fields from"
                    }]})),
                );
            }
            match body["alcohol"].as_f64() {
                Some(_) => (
                    AxumStatus::OK,
                    Json(json!({
                        "prediction": 1,
                        "class_name": "class_1",
                        "probabilities": { "class_0": 0.1, "class_1": 0.8, "class_2": 0.1 }
                    })),
                ),
                None => (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": [{
                        "type": "missing",
                        "loc": ["body", "alcohol"],
                        "msg": "Field required"
                    }]})),
                ),
            }
        }

        let app = Router::new()
            .route("/predict-with-probability", post(handler))
            .with_state(calls);
        PredictClient::new(spawn(app).await)
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = PredictClient::new("http://localhost:8000/".into());
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn recognizes_object_expected_detail() {
        let body = r#"{"detail":[{"type":"model_attributes_type","msg":"Input should be a valid dictionary or object to extract fields from"}]}"#;
        assert!(expects_object(body));
        assert!(!expects_object(r#"{"detail":[{"msg":"field required"}]}"#));
        assert!(!expects_object("not json"));
    }

    #[test]
    fn legacy_body_maps_to_cultivar_entry() {
        let body = r#"{"prediction":2,"class_name":"class_2","probabilities":{"class_0":0.05,"class_1":0.15,"class_2":0.8}}"#;
        let ResponseEntry::Ok {
            prediction,
            label,
            probabilities: Some(p),
        } = parse_entry(body).unwrap()
        else {
            panic!("expected ok entry with probabilities");
        };
        assert_eq!(prediction, 2);
        assert_eq!(label, "Cultivar C");
        assert_eq!(p["Cultivar C"], 0.8);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn legacy_body_without_probabilities() {
        let entry = parse_entry(r#"{"prediction":0,"class_name":"class_0"}"#).unwrap();
        assert_eq!(entry.label(), Some("Cultivar A"));
        assert!(matches!(
            entry,
            ResponseEntry::Ok {
                probabilities: None,
                ..
            }
        ));
    }

    #[test]
    fn legacy_unknown_class_is_error_entry() {
        let entry = parse_entry(r#"{"prediction":9,"class_name":"class_9"}"#).unwrap();
        match entry {
            ResponseEntry::Error { error } => assert_eq!(error.kind, "unknown_label"),
            other => panic!("expected error entry, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_body_is_json_error() {
        assert!(parse_entry(r#"{"result":"maybe"}"#).is_err());
    }

    #[test]
    fn probability_keys_are_renamed() {
        assert_eq!(cultivar_key("class_1".into()), "Cultivar B");
        assert_eq!(cultivar_key("Cultivar A".into()), "Cultivar A");
        assert_eq!(cultivar_key("class_7".into()), "class_7");
    }

    #[tokio::test]
    async fn health_from_live_server() {
        let client = spawn_demo_server().await;
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.features, 13);
    }

    #[tokio::test]
    async fn single_prediction() {
        let client = spawn_demo_server().await;
        let prediction = client
            .predict(&single(), PredictMode::WithProbabilities)
            .await
            .unwrap();
        assert_eq!(prediction.calls, 1);
        let ResponseDocument::Single(ResponseEntry::Ok {
            label,
            probabilities,
            ..
        }) = prediction.document
        else {
            panic!("expected single ok entry");
        };
        assert_eq!(label, "Cultivar A");
        assert_eq!(probabilities.map(|p| p.len()), Some(3));
    }

    #[tokio::test]
    async fn invalid_single_is_error_entry() {
        let client = spawn_demo_server().await;
        let prediction = client
            .predict(&json!({ "alcohol": 13.0 }), PredictMode::Labels)
            .await
            .unwrap();
        match prediction.document {
            ResponseDocument::Single(ResponseEntry::Error { error }) => {
                assert_eq!(error.kind, "missing_field");
                assert_eq!(error.fields.len(), 12);
            }
            other => panic!("expected single error entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_prediction_in_one_call() {
        let client = spawn_demo_server().await;
        let prediction = client
            .predict(&json!([single(), {}, single()]), PredictMode::Labels)
            .await
            .unwrap();
        let ok: Vec<bool> = prediction
            .document
            .entries()
            .iter()
            .map(ResponseEntry::is_ok)
            .collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(prediction.calls, 1);
        assert!(prediction.elapsed > Duration::ZERO);
    }

    #[tokio::test]
    async fn scalar_payload_is_server_error() {
        let client = spawn_demo_server().await;
        let err = client
            .predict(&json!(5), PredictMode::Labels)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 400, .. }));
    }

    #[tokio::test]
    async fn falls_back_to_one_call_per_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = spawn_single_only_server(calls.clone()).await;

        let payload = json!([single(), { "ash": 2.0 }, single()]);
        let prediction = client
            .predict(&payload, PredictMode::WithProbabilities)
            .await
            .unwrap();

        // One rejected batch call plus one call per record.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(prediction.calls, 4);
        assert!(prediction.elapsed > Duration::ZERO);

        let ResponseDocument::Batch(entries) = prediction.document else {
            panic!("expected batch document");
        };
        assert_eq!(entries.len(), 3);
        match &entries[0] {
            ResponseEntry::Ok {
                prediction,
                label,
                probabilities: Some(p),
            } => {
                assert_eq!(*prediction, 1);
                assert_eq!(label, "Cultivar B");
                assert_eq!(p["Cultivar B"], 0.8);
                assert!((p.values().sum::<f64>() - 1.0).abs() < 1e-6);
            }
            other => panic!("expected ok entry with probabilities, got {other:?}"),
        }
        match &entries[1] {
            ResponseEntry::Error { error } => assert_eq!(error.kind, "rejected"),
            other => panic!("expected rejected entry, got {other:?}"),
        }
        assert!(entries[2].is_ok());
    }

    #[tokio::test]
    async fn every_fallback_success_is_ok() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = spawn_single_only_server(calls.clone()).await;

        let prediction = client
            .predict(&json!([single(), single()]), PredictMode::WithProbabilities)
            .await
            .unwrap();
        assert!(prediction.document.entries().iter().all(ResponseEntry::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_record_against_legacy_server() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = spawn_single_only_server(calls.clone()).await;

        let prediction = client
            .predict(&single(), PredictMode::WithProbabilities)
            .await
            .unwrap();
        match prediction.document {
            ResponseDocument::Single(entry) => assert_eq!(entry.label(), Some("Cultivar B")),
            other => panic!("expected single document, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let client = PredictClient::new("http://127.0.0.1:1".into());
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
    }
}
