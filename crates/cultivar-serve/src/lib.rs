//! HTTP prediction API.
//!
//! `GET /` reports health, `POST /predict` returns labels and
//! `POST /predict-with-probability` adds per-class probabilities. Both
//! prediction routes accept one record (a JSON object) or many (an array).

mod config;
mod error;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use cultivar_ai::ModelAdapter;
use tokio::net::TcpListener;
use tracing::info;

pub use config::{DEFAULT_BIND, ServeConfig};
pub use error::{ApiError, ServeError};

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    model: Arc<ModelAdapter>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(model: ModelAdapter) -> Self {
        Self {
            model: Arc::new(model),
            started_at: Utc::now(),
        }
    }

    pub fn model(&self) -> &ModelAdapter {
        &self.model
    }
}

/// Build the API router around a loaded model.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/predict", post(routes::predict))
        .route(
            "/predict-with-probability",
            post(routes::predict_with_probability),
        )
        .with_state(state)
}

/// Load the model and serve until Ctrl-C.
///
/// A model that fails to load is fatal: no listener is opened.
pub async fn serve(config: ServeConfig) -> Result<(), ServeError> {
    let model = ModelAdapter::load(&config.model_path)?;
    let state = AppState::new(model);

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, model = state.model().name(), "serving predictions");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivar_ai::ModelError;

    #[tokio::test]
    async fn missing_model_is_fatal() {
        let config = ServeConfig {
            model_path: "/nonexistent/wine_forest.json".into(),
            bind: "127.0.0.1:0".parse().unwrap(),
        };
        let err = serve(config).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Model(ModelError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn model_with_unnamed_class_is_fatal() {
        let demo = include_str!("../../../models/wine_forest.json");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.json");
        std::fs::write(
            &path,
            demo.replacen("\"classes\": [0, 1, 2]", "\"classes\": [0, 1, 7]", 1),
        )
        .unwrap();

        let config = ServeConfig {
            model_path: path,
            bind: "127.0.0.1:0".parse().unwrap(),
        };
        let err = serve(config).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Model(ModelError::UnlabelledClass { class: 7 })
        ));
    }
}
