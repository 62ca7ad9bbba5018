//! PhishGuard Core Module
//!
//! The training pipeline for the phishing URL classifier: ingestion from the
//! document store, schema and drift validation, KNN imputation, model search
//! and selection, and the deployable preprocessor plus model bundle.

pub mod artifact;
pub mod config;
pub mod error;
pub mod estimator;
pub mod ingestion;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod table;
pub mod tracking;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use artifact::{ModelTrainerArtifact, SplitArtifact, TransformationArtifact, ValidationArtifact};
pub use config::{DeploymentEnvironment, DriftCorrection, DriftPolicy, PipelineConfig, RunLayout};
pub use error::{PipelineError, Result, Stage};
pub use estimator::NetworkModel;
pub use pipeline::TrainingPipeline;
pub use table::DataTable;

/// Column appended to scored tables
pub const PREDICTION_COLUMN: &str = "predicted_column";
