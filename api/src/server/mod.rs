//! API Server Module
//!
//! Router construction and the listening loop.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use phishguard_core::PipelineConfig;

use crate::handlers::{download_route, health_check, predict_route, train_route, ApiState};
use crate::models::ApiConfig;

/// Build the application router over shared state
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/train", get(train_route))
        .route("/predict", post(predict_route))
        .route("/download", get(download_route))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Main API server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(pipeline_config: PipelineConfig) -> Self {
        let config = ApiConfig::from(&pipeline_config.serving);
        let state = Arc::new(ApiState::new(pipeline_config));
        Self { config, state }
    }

    /// Override the listen address
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.host = host.into();
        self.config.port = port;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        let app = router(self.state.clone());

        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!(
            "PhishGuard API server listening on {}",
            listener.local_addr()?
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        Ok(())
    }
}
