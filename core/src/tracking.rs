//! Experiment tracking
//!
//! Training metrics are recorded through [`ExperimentTracker`]. Tracking never
//! fails a run: errors are logged and dropped by [`record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::trainer::metrics::ClassificationMetric;
use crate::trainer::registry::{Hyperparams, ModelKind};

/// Which split a metric was computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

/// One tracked evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub model: ModelKind,
    pub params: Hyperparams,
    pub split: Split,
    pub metric: ClassificationMetric,
}

impl RunRecord {
    pub fn new(params: &Hyperparams, split: Split, metric: ClassificationMetric) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            logged_at: Utc::now(),
            model: params.kind(),
            params: params.clone(),
            split,
            metric,
        }
    }
}

pub trait ExperimentTracker: Send + Sync {
    fn log_run(&self, record: &RunRecord) -> Result<()>;
}

/// Discards every record
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log_run(&self, _record: &RunRecord) -> Result<()> {
        Ok(())
    }
}

/// Writes each record as `<dir>/<run_id>.json`
pub struct LocalRunTracker {
    dir: PathBuf,
}

impl LocalRunTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every record in the tracking directory, oldest first
    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::io(&self.dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
            let record: RunRecord = serde_json::from_str(&content)
                .map_err(|e| PipelineError::serialization(&path, e))?;
            records.push(record);
        }

        records.sort_by_key(|record| record.logged_at);
        Ok(records)
    }
}

impl ExperimentTracker for LocalRunTracker {
    fn log_run(&self, record: &RunRecord) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;
        let path = self.dir.join(format!("{}.json", record.run_id));
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| PipelineError::serialization(&path, e))?;
        fs::write(&path, content).map_err(|e| PipelineError::io(&path, e))?;
        debug!("Tracked {} {:?} metrics in {}", record.model, record.split, path.display());
        Ok(())
    }
}

/// Tracker for the configured environment
pub fn tracker_for(config: &PipelineConfig) -> Box<dyn ExperimentTracker> {
    if config.tracking_enabled() {
        Box::new(LocalRunTracker::new(&config.tracking.dir))
    } else {
        Box::new(NoopTracker)
    }
}

/// Log a record, downgrading failure to a warning
pub fn record(tracker: &dyn ExperimentTracker, record: RunRecord) {
    if let Err(e) = tracker.log_run(&record) {
        warn!("Experiment tracking failed for {}: {}", record.model, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentEnvironment;
    use crate::trainer::registry::LogisticParams;
    use tempfile::TempDir;

    fn sample_record(split: Split) -> RunRecord {
        RunRecord::new(
            &Hyperparams::LogisticRegression(LogisticParams::default()),
            split,
            ClassificationMetric {
                f1_score: 0.9,
                precision_score: 0.8,
                recall_score: 1.0,
            },
        )
    }

    #[test]
    fn test_local_tracker_writes_one_file_per_run() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let tracker = LocalRunTracker::new(temp_dir.path().join("mlruns"));

        tracker.log_run(&sample_record(Split::Train)).unwrap();
        tracker.log_run(&sample_record(Split::Test)).unwrap();

        let runs = tracker.runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].model, ModelKind::LogisticRegression);
        assert!(runs.iter().any(|run| run.split == Split::Test));
    }

    #[test]
    fn test_production_uses_noop_tracker() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = PipelineConfig::default();
        config.environment = DeploymentEnvironment::Production;
        config.tracking.dir = temp_dir.path().join("mlruns");

        let tracker = tracker_for(&config);
        record(tracker.as_ref(), sample_record(Split::Train));
        assert!(!config.tracking.dir.exists());
    }

    #[test]
    fn test_failed_tracking_does_not_panic() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        // A regular file where the directory should be.
        let tracker = LocalRunTracker::new(&blocker);
        assert!(tracker.log_run(&sample_record(Split::Train)).is_err());
        record(&tracker, sample_record(Split::Train));
    }
}
