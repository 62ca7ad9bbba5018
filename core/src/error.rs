//! Pipeline errors
//!
//! Every stage returns [`Result`]. The pipeline driver wraps a failing stage
//! exactly once in [`PipelineError::Stage`], which records the stage and the
//! source location of the call that failed.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use phishguard_databases::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Ingestion,
    Validation,
    Transformation,
    ModelTrainer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "Data Ingestion",
            Stage::Validation => "Data Validation",
            Stage::Transformation => "Data Transformation",
            Stage::ModelTrainer => "Model Trainer",
        };
        f.write_str(name)
    }
}

/// Training pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document source unavailable: {0}")]
    SourceUnavailable(#[source] StoreError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Fitting {model} failed: {reason}")]
    FitFailure { model: String, reason: String },

    #[error("Serialization of '{}' failed: {reason}", path.display())]
    SerializationFailure { path: PathBuf, reason: String },

    #[error("Malformed value in column '{column}': {reason}")]
    MalformedRecord { column: String, reason: String },

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Data drift detected in columns: {}", columns.join(", "))]
    DriftDetected { columns: Vec<String> },

    #[error("Best model {model} scored {score:.4} on test data, below the expected {expected:.4}")]
    ModelRejected {
        model: String,
        score: f64,
        expected: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} failed at {location}: {source}")]
    Stage {
        stage: Stage,
        location: &'static Location<'static>,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fit(model: impl fmt::Display, reason: impl fmt::Display) -> Self {
        PipelineError::FitFailure {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::SerializationFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The underlying error beneath any stage wrappers
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage the error was raised in, if it has been wrapped
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<StoreError> for PipelineError {
    /// A reachable store holding an unreadable document is a data error.
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::MalformedDocument {
                collection,
                id,
                reason,
            } => PipelineError::MalformedRecord {
                column: format!("{collection}[{id}]"),
                reason,
            },
            StoreError::Encoding(e) => PipelineError::MalformedRecord {
                column: "<document>".to_string(),
                reason: e.to_string(),
            },
            other => PipelineError::SourceUnavailable(other),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(error: config::ConfigError) -> Self {
        PipelineError::Config(error.to_string())
    }
}

/// Attach the failing stage and caller location to an error
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    #[track_caller]
    fn in_stage(self, stage: Stage) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(PipelineError::Stage {
                stage,
                location: Location::caller(),
                source: Box::new(error),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> Result<()> {
        Err(PipelineError::SchemaMismatch("3 columns, expected 4".to_string()))
    }

    #[test]
    fn test_stage_wrapper_records_location_and_root() {
        let line = line!() + 1;
        let error = failing().in_stage(Stage::Validation).unwrap_err();

        match &error {
            PipelineError::Stage {
                stage, location, ..
            } => {
                assert_eq!(*stage, Stage::Validation);
                assert!(location.file().ends_with("error.rs"));
                assert_eq!(location.line(), line);
            }
            other => panic!("expected stage wrapper, got {other:?}"),
        }

        assert!(matches!(error.root(), PipelineError::SchemaMismatch(_)));
        assert_eq!(error.stage(), Some(Stage::Validation));
        assert!(error.to_string().starts_with("Data Validation failed at"));
    }

    #[test]
    fn test_store_errors_split_into_source_and_data_faults() {
        let unavailable = PipelineError::from(StoreError::Unavailable {
            url: "sqlite://missing.db".to_string(),
            reason: "no such file".to_string(),
        });
        assert!(matches!(unavailable, PipelineError::SourceUnavailable(_)));

        let malformed = PipelineError::from(StoreError::MalformedDocument {
            collection: "Network_Data_Collection".to_string(),
            id: 7,
            reason: "not a JSON object".to_string(),
        });
        match malformed {
            PipelineError::MalformedRecord { column, reason } => {
                assert_eq!(column, "Network_Data_Collection[7]");
                assert_eq!(reason, "not a JSON object");
            }
            other => panic!("expected malformed record, got {other:?}"),
        }

        let encoding = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            PipelineError::from(StoreError::Encoding(encoding)),
            PipelineError::MalformedRecord { .. }
        ));
    }

    #[test]
    fn test_ok_passes_through_unchanged() {
        let value: Result<u8> = Ok(7);
        assert_eq!(value.in_stage(Stage::Ingestion).unwrap(), 7);
    }
}
