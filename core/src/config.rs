//! Pipeline Configuration
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `PHISHGUARD__*` environment variables (`__` separates nested keys, so
//! `PHISHGUARD__SOURCE__URL` sets `source.url`).

use chrono::Local;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::trainer::registry::{default_registry, ModelSpec};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "PHISHGUARD";

/// Format of the per-run artifact directory name
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Production,
}

/// What to do when validation reports drift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Abort the run after the drift report is written
    #[default]
    Block,
    /// Log the drifted columns and continue
    Warn,
}

/// How the drift threshold is shared across the tested columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftCorrection {
    /// Each of the n columns is tested at `threshold / n`, so the chance of
    /// flagging any column between two splits of one dataset stays within
    /// `threshold`
    #[default]
    Bonferroni,
    /// Every column is tested at `threshold`
    None,
}

impl DriftCorrection {
    pub fn column_threshold(self, threshold: f64, n_columns: usize) -> f64 {
        match self {
            DriftCorrection::Bonferroni => threshold / n_columns.max(1) as f64,
            DriftCorrection::None => threshold,
        }
    }
}

/// Upstream document collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/network_data.db".to_string(),
            database: "Network_Security_System".to_string(),
            collection: "Network_Data_Collection".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Fraction of rows held out for testing
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Family-wise significance level of the per-column KS tests
    pub drift_threshold: f64,
    pub drift_correction: DriftCorrection,
    pub drift_policy: DriftPolicy,
    /// Accepted raw label values, negative class first
    pub label_classes: [f64; 2],
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.05,
            drift_correction: DriftCorrection::Bonferroni,
            drift_policy: DriftPolicy::Block,
            label_classes: [-1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    pub n_neighbors: usize,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self { n_neighbors: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub cv_folds: usize,
    /// Minimum test f1 for the best model to be accepted
    pub expected_score: f64,
    /// Train/test f1 gap above which a warning is logged
    pub overfit_threshold: f64,
    pub seed: u64,
    /// Candidate model families, searched in order
    pub candidates: Vec<ModelSpec>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            expected_score: 0.6,
            overfit_threshold: 0.05,
            seed: 42,
            candidates: default_registry(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub dir: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("mlruns"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub host: String,
    pub port: u16,
    pub prediction_dir: PathBuf,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            prediction_dir: PathBuf::from("prediction_output"),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub environment: DeploymentEnvironment,
    pub source: SourceConfig,
    /// Root under which each run gets a timestamped directory
    pub artifact_dir: PathBuf,
    /// Where the accepted model and preprocessor are published
    pub final_model_dir: PathBuf,
    pub schema_path: PathBuf,
    pub target_column: String,
    pub ingestion: IngestionConfig,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
    pub trainer: TrainerConfig,
    pub tracking: TrackingConfig,
    pub serving: ServingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: DeploymentEnvironment::Development,
            source: SourceConfig::default(),
            artifact_dir: PathBuf::from("artifact"),
            final_model_dir: PathBuf::from("final_models"),
            schema_path: PathBuf::from("config/schema.yaml"),
            target_column: "Result".to_string(),
            ingestion: IngestionConfig::default(),
            validation: ValidationConfig::default(),
            transformation: TransformationConfig::default(),
            trainer: TrainerConfig::default(),
            tracking: TrackingConfig::default(),
            serving: ServingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(PipelineError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        let config: PipelineConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Configuration loaded: environment={:?}", config.environment);
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Config(format!(
                "ingestion.test_ratio must be in (0, 1), got {ratio}"
            )));
        }

        let threshold = self.validation.drift_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(PipelineError::Config(format!(
                "validation.drift_threshold must be in (0, 1), got {threshold}"
            )));
        }

        let [negative, positive] = self.validation.label_classes;
        if negative == positive {
            return Err(PipelineError::Config(
                "validation.label_classes must name two distinct values".to_string(),
            ));
        }

        if self.transformation.n_neighbors == 0 {
            return Err(PipelineError::Config(
                "transformation.n_neighbors must be at least 1".to_string(),
            ));
        }

        if self.trainer.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "trainer.cv_folds must be at least 2, got {}",
                self.trainer.cv_folds
            )));
        }

        if self.trainer.candidates.is_empty() {
            return Err(PipelineError::Config(
                "trainer.candidates must list at least one model".to_string(),
            ));
        }

        if self.target_column.is_empty() {
            return Err(PipelineError::Config(
                "target_column must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Experiment tracking is skipped in production
    pub fn tracking_enabled(&self) -> bool {
        self.environment != DeploymentEnvironment::Production
    }

    pub fn is_production(&self) -> bool {
        self.environment == DeploymentEnvironment::Production
    }

    /// Stage paths for a run directory named `timestamp`
    pub fn stage_paths(&self, timestamp: &str) -> RunLayout {
        RunLayout::new(self, timestamp)
    }
}

/// Data ingestion output locations
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionPaths {
    pub feature_store_file: PathBuf,
    pub training_file: PathBuf,
    pub testing_file: PathBuf,
}

/// Data validation output locations
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPaths {
    pub valid_train_file: PathBuf,
    pub valid_test_file: PathBuf,
    pub invalid_train_file: PathBuf,
    pub invalid_test_file: PathBuf,
    pub drift_report_file: PathBuf,
}

/// Data transformation output locations
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationPaths {
    pub transformed_train_file: PathBuf,
    pub transformed_test_file: PathBuf,
    pub transformed_object_file: PathBuf,
}

/// Model trainer output locations
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerPaths {
    pub trained_model_file: PathBuf,
    pub final_model_file: PathBuf,
    pub final_preprocessor_file: PathBuf,
}

/// Every path one pipeline run writes to, rooted at
/// `<artifact_dir>/<timestamp>/`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLayout {
    pub root: PathBuf,
    pub ingestion: IngestionPaths,
    pub validation: ValidationPaths,
    pub transformation: TransformationPaths,
    pub trainer: TrainerPaths,
}

/// File names shared between the trainer and serving
pub const FINAL_MODEL_FILE: &str = "model.bin";
pub const FINAL_PREPROCESSOR_FILE: &str = "preprocessor.bin";

impl RunLayout {
    pub fn new(config: &PipelineConfig, timestamp: &str) -> Self {
        let root = config.artifact_dir.join(timestamp);

        let ingestion_dir = root.join("data_ingestion");
        let validation_dir = root.join("data_validation");
        let transformation_dir = root.join("data_transformation");
        let trainer_dir = root.join("model_trainer");

        Self {
            ingestion: IngestionPaths {
                feature_store_file: ingestion_dir.join("feature_store").join("phisingData.csv"),
                training_file: ingestion_dir.join("ingested").join("train.csv"),
                testing_file: ingestion_dir.join("ingested").join("test.csv"),
            },
            validation: ValidationPaths {
                valid_train_file: validation_dir.join("validated").join("train.csv"),
                valid_test_file: validation_dir.join("validated").join("test.csv"),
                invalid_train_file: validation_dir.join("invalid").join("train.csv"),
                invalid_test_file: validation_dir.join("invalid").join("test.csv"),
                drift_report_file: validation_dir.join("drift_report").join("report.yaml"),
            },
            transformation: TransformationPaths {
                transformed_train_file: transformation_dir.join("transformed").join("train.bin"),
                transformed_test_file: transformation_dir.join("transformed").join("test.bin"),
                transformed_object_file: transformation_dir
                    .join("transformed_object")
                    .join(FINAL_PREPROCESSOR_FILE),
            },
            trainer: TrainerPaths {
                trained_model_file: trainer_dir.join("trained_model").join(FINAL_MODEL_FILE),
                final_model_file: config.final_model_dir.join(FINAL_MODEL_FILE),
                final_preprocessor_file: config.final_model_dir.join(FINAL_PREPROCESSOR_FILE),
            },
            root,
        }
    }

    /// Layout for a run starting now
    pub fn now(config: &PipelineConfig) -> Self {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::new(config, &timestamp)
    }
}
