//! HTTP prediction service.
//!
//! The model is loaded once at start-up and shared, read-only, by every request through the
//! router state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::common::AnomalyDetector;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::model::ModelArtifact;

mod error;
pub mod routes;

pub use error::ApiError;

/// What `/health` reports about the loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub n_estimators: usize,
    pub features: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn AnomalyDetector>,
    pub model: Arc<ModelInfo>,
}

impl AppState {
    pub fn new(detector: Arc<dyn AnomalyDetector>, model: ModelInfo) -> Self {
        AppState {
            detector,
            model: Arc::new(model),
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        let model = ModelInfo {
            n_estimators: artifact.forest().n_estimators(),
            features: artifact.features().to_vec(),
        };
        AppState::new(Arc::new(artifact), model)
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(routes::predict))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the model, bind the configured address and serve until Ctrl-C.
pub async fn serve(config: &ServiceConfig) -> Result<()> {
    let artifact = ModelArtifact::load(&config.model_path)?;
    let addr = config.resolve().await?;
    let state = AppState::from_artifact(artifact);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        model = %config.model_path.display(),
        "machine-watch v{} listening",
        env!("CARGO_PKG_VERSION")
    );
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
