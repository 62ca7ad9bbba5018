//! Stage artifacts
//!
//! Each stage returns a plain record of the files it produced. The next stage
//! reads its inputs from these paths only.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::trainer::metrics::{ClassificationMetric, ModelReport};
use crate::trainer::registry::{Hyperparams, ModelKind};

/// Output of data ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitArtifact {
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
}

/// Output of data validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    /// True when no column drifted
    pub validation_status: bool,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    /// Set only when rows were rejected
    pub invalid_train_file_path: Option<PathBuf>,
    pub invalid_test_file_path: Option<PathBuf>,
    pub drift_report_file_path: PathBuf,
    pub drifted_columns: Vec<String>,
}

/// Output of data transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
}

/// Output of the model trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub final_model_file_path: PathBuf,
    pub best_model: ModelKind,
    pub best_params: Hyperparams,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
    /// Train f1 minus test f1
    pub overfit_gap: f64,
    pub overfitting: bool,
    pub report: ModelReport,
}
