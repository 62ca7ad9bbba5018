//! API Models Module
//!
//! Request and response bodies for the HTTP endpoints.

use phishguard_core::config::ServingConfig;
use phishguard_core::ModelTrainerArtifact;
use serde::{Deserialize, Serialize};

/// Where the server listens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl From<&ServingConfig> for ApiConfig {
    fn from(serving: &ServingConfig) -> Self {
        Self {
            host: serving.host.clone(),
            port: serving.port,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Result of a pipeline run triggered over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub message: String,
    pub artifact: ModelTrainerArtifact,
}

/// Result of a batch prediction
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Rows scored
    pub rows: usize,
    /// One label per row, 0.0 or 1.0
    pub predictions: Vec<f64>,
    /// The scored CSV written for `/download`
    pub output_path: String,
}

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
