//! Training Pipeline
//!
//! Runs ingestion, validation, transformation and model training in order.
//! Each stage reads only the artifact of the stage before it, and any stage
//! failure is returned wrapped once with its stage and call site.

use phishguard_databases::{DocumentSource, SqliteDocumentStore};
use tracing::{info, warn};

use crate::artifact::{
    ModelTrainerArtifact, SplitArtifact, TransformationArtifact, ValidationArtifact,
};
use crate::config::{DriftPolicy, PipelineConfig, RunLayout};
use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::tracking::tracker_for;
use crate::{ingestion, trainer, transformation, validation};

pub struct TrainingPipeline {
    config: PipelineConfig,
    layout: RunLayout,
}

impl TrainingPipeline {
    /// A pipeline whose artifacts go under a directory named for the current
    /// time.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let layout = RunLayout::now(&config);
        Ok(Self { config, layout })
    }

    /// A pipeline with an explicit run directory name
    pub fn with_timestamp(config: PipelineConfig, timestamp: &str) -> Result<Self> {
        config.validate()?;
        let layout = config.stage_paths(timestamp);
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Ingest from the configured document store
    pub fn start_data_ingestion(&self) -> Result<SplitArtifact> {
        let store = SqliteDocumentStore::connect(&self.config.source.url)
            .map_err(PipelineError::from)
            .in_stage(Stage::Ingestion)?;
        self.start_data_ingestion_from(&store)
    }

    pub fn start_data_ingestion_from(&self, source: &dyn DocumentSource) -> Result<SplitArtifact> {
        ingestion::ingest(&self.config, &self.layout.ingestion, source).in_stage(Stage::Ingestion)
    }

    /// Validate the split. Drift is enforced here per the configured policy.
    pub fn start_data_validation(&self, split: &SplitArtifact) -> Result<ValidationArtifact> {
        let artifact = validation::validate(&self.config, &self.layout.validation, split)
            .in_stage(Stage::Validation)?;

        if !artifact.validation_status {
            match self.config.validation.drift_policy {
                DriftPolicy::Block => {
                    return Err(PipelineError::DriftDetected {
                        columns: artifact.drifted_columns.clone(),
                    })
                    .in_stage(Stage::Validation);
                }
                DriftPolicy::Warn => warn!(
                    "Continuing despite drift in: {}",
                    artifact.drifted_columns.join(", ")
                ),
            }
        }

        Ok(artifact)
    }

    pub fn start_data_transformation(
        &self,
        validation: &ValidationArtifact,
    ) -> Result<TransformationArtifact> {
        transformation::transform(&self.config, &self.layout.transformation, validation)
            .in_stage(Stage::Transformation)
    }

    pub fn start_model_trainer(
        &self,
        transformation: &TransformationArtifact,
    ) -> Result<ModelTrainerArtifact> {
        let tracker = tracker_for(&self.config);
        trainer::train(
            &self.config,
            &self.layout.trainer,
            transformation,
            tracker.as_ref(),
        )
        .in_stage(Stage::ModelTrainer)
    }

    /// Run every stage against the configured document store
    pub fn run_pipeline(&self) -> Result<ModelTrainerArtifact> {
        let split = self.start_data_ingestion()?;
        self.run_from_split(split)
    }

    /// Run every stage against an already opened source
    pub fn run_pipeline_with(&self, source: &dyn DocumentSource) -> Result<ModelTrainerArtifact> {
        let split = self.start_data_ingestion_from(source)?;
        self.run_from_split(split)
    }

    fn run_from_split(&self, split: SplitArtifact) -> Result<ModelTrainerArtifact> {
        info!("Training pipeline run at {}", self.layout.root.display());
        let validation = self.start_data_validation(&split)?;
        let transformation = self.start_data_transformation(&validation)?;
        let trained = self.start_model_trainer(&transformation)?;
        info!(
            "Training pipeline completed: {} with test f1 {:.4}",
            trained.best_model, trained.test_metric.f1_score
        );
        Ok(trained)
    }
}
