//! API Handlers Module
//!
//! Request handlers for health, training and batch prediction.

use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::path::PathBuf;
use std::sync::Arc;

use phishguard_core::{DataTable, NetworkModel, PipelineConfig, PipelineError, TrainingPipeline};

use crate::models::{ErrorResponse, HealthResponse, PredictResponse, TrainResponse};

/// Name of the multipart field holding the uploaded CSV
pub const UPLOAD_FIELD: &str = "file";

/// File written by `/predict` and served by `/download`
pub const PREDICTION_FILE: &str = "output.csv";

/// Represents the state of the API server
pub struct ApiState {
    /// Pipeline configuration, also the source of model and output paths
    pub config: PipelineConfig,
}

impl ApiState {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn prediction_file(&self) -> PathBuf {
        self.config.serving.prediction_dir.join(PREDICTION_FILE)
    }
}

/// A failed request, rendered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let status = match error.root() {
            PipelineError::MissingArtifact(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::MalformedRecord { .. }
            | PipelineError::SchemaMismatch(_)
            | PipelineError::EmptyDataset(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        } else {
            tracing::warn!("{}", self.message);
        }
        let body = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "phishguard-api".to_string(),
    })
}

/// Run the full training pipeline. Disabled in production.
#[debug_handler]
pub async fn train_route(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<TrainResponse>, ApiError> {
    if state.config.is_production() {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "Training disabled in production",
        ));
    }

    tracing::info!("Training triggered over HTTP");
    let config = state.config.clone();
    let artifact = tokio::task::spawn_blocking(move || TrainingPipeline::new(config)?.run_pipeline())
        .await
        .map_err(|e| ApiError::internal(format!("Training task failed: {}", e)))?
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(TrainResponse {
        message: "Training is successful".to_string(),
        artifact,
    }))
}

/// Score an uploaded CSV with the published model
#[debug_handler]
pub async fn predict_route(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{}' field", UPLOAD_FIELD)))?;
    tracing::debug!("Received {} byte upload for prediction", bytes.len());

    let output_path = state.prediction_file();
    let model_dir = state.config.final_model_dir.clone();
    let target_column = state.config.target_column.clone();
    let output = output_path.clone();

    let predictions = tokio::task::spawn_blocking(move || -> Result<Vec<f64>, ApiError> {
        let table = DataTable::read_csv_bytes(&bytes)?;
        let model = NetworkModel::load_from_dir(&model_dir)?;
        let scored = model.score_table(table, &target_column)?;
        scored.write_csv(&output)?;

        let column = scored
            .column(phishguard_core::PREDICTION_COLUMN)
            .ok_or_else(|| ApiError::internal("Prediction column was not appended"))?;
        Ok(column.to_vec())
    })
    .await
    .map_err(|e| ApiError::internal(format!("Prediction task failed: {}", e)))??;

    tracing::info!(
        "Scored {} rows into {}",
        predictions.len(),
        output_path.display()
    );
    Ok(Json(PredictResponse {
        rows: predictions.len(),
        predictions,
        output_path: output_path.display().to_string(),
    }))
}

/// Return the last prediction file
#[debug_handler]
pub async fn download_route(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let path = state.prediction_file();
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                "No prediction file found",
            ))
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", PREDICTION_FILE),
            ),
        ],
        content,
    )
        .into_response())
}
