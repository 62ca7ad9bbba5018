//! Data Validation Stage
//!
//! Checks both splits against the schema, writes a per-column drift report,
//! and separates rows with an unusable label into the invalid files.

pub mod drift;

pub use drift::{detect_dataset_drift, ks_2samp, ColumnDrift, DriftReport, KsResult};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::{SplitArtifact, ValidationArtifact};
use crate::config::{PipelineConfig, ValidationPaths};
use crate::error::{PipelineError, Result};
use crate::schema::Schema;
use crate::storage::write_yaml_file;
use crate::table::DataTable;

/// Split rows into those whose label is one of `classes` and the rest.
pub fn partition_by_label(
    table: &DataTable,
    target_column: &str,
    classes: &[f64],
) -> Result<(DataTable, DataTable)> {
    let labels = table.column(target_column).ok_or_else(|| {
        PipelineError::SchemaMismatch(format!("missing target column '{target_column}'"))
    })?;

    let (valid, invalid): (Vec<usize>, Vec<usize>) = (0..table.n_rows())
        .partition(|&row| classes.contains(&labels[row]));

    Ok((table.select_rows(&valid), table.select_rows(&invalid)))
}

fn require_file(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::MissingArtifact(path.to_path_buf()))
    }
}

/// Write the rejected rows, or clear a stale file when there are none
fn write_invalid(table: &DataTable, path: &Path) -> Result<Option<PathBuf>> {
    if table.is_empty() {
        if path.exists() {
            fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;
        }
        return Ok(None);
    }

    table.write_csv(path)?;
    Ok(Some(path.to_path_buf()))
}

pub fn validate(
    config: &PipelineConfig,
    paths: &ValidationPaths,
    split: &SplitArtifact,
) -> Result<ValidationArtifact> {
    info!("Starting data validation");

    require_file(&split.training_file_path)?;
    require_file(&split.testing_file_path)?;

    let schema = Schema::load(&config.schema_path)?;
    schema.require_column(&config.target_column)?;

    let train = DataTable::read_csv(&split.training_file_path)?;
    let test = DataTable::read_csv(&split.testing_file_path)?;

    let mut mismatches = Vec::new();
    for (name, table) in [("Train", &train), ("Test", &test)] {
        let problems = schema.column_problems(table);
        if !problems.is_empty() {
            mismatches.push(format!("{name} dataframe: {}", problems.join("; ")));
        }
    }
    if !mismatches.is_empty() {
        return Err(PipelineError::SchemaMismatch(mismatches.join(". ")));
    }

    for warning in schema.dtype_warnings(&train).into_iter().chain(schema.dtype_warnings(&test)) {
        warn!("{}", warning);
    }

    let report = detect_dataset_drift(
        &train,
        &test,
        config.validation.drift_threshold,
        config.validation.drift_correction,
    );
    write_yaml_file(&paths.drift_report_file, &report, true)?;
    let drifted_columns = report.drifted_columns();
    if drifted_columns.is_empty() {
        info!(
            "No drift detected across {} columns ({:?} correction)",
            report.columns().len(),
            config.validation.drift_correction
        );
    } else {
        warn!("Drift detected in columns: {}", drifted_columns.join(", "));
    }

    let classes = config.validation.label_classes;
    let (valid_train, invalid_train) = partition_by_label(&train, &config.target_column, &classes)?;
    let (valid_test, invalid_test) = partition_by_label(&test, &config.target_column, &classes)?;
    if !invalid_train.is_empty() || !invalid_test.is_empty() {
        warn!(
            "Rejected {} train and {} test rows with an invalid label",
            invalid_train.n_rows(),
            invalid_test.n_rows()
        );
    }
    if valid_train.is_empty() || valid_test.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no rows with a valid label remain in one of the splits".to_string(),
        ));
    }

    valid_train.write_csv(&paths.valid_train_file)?;
    valid_test.write_csv(&paths.valid_test_file)?;
    let invalid_train_file_path = write_invalid(&invalid_train, &paths.invalid_train_file)?;
    let invalid_test_file_path = write_invalid(&invalid_test, &paths.invalid_test_file)?;

    let validation_status = drifted_columns.is_empty();
    info!("Data validation completed: status={}", validation_status);

    Ok(ValidationArtifact {
        validation_status,
        valid_train_file_path: paths.valid_train_file.clone(),
        valid_test_file_path: paths.valid_test_file.clone(),
        invalid_train_file_path,
        invalid_test_file_path,
        drift_report_file_path: paths.drift_report_file.clone(),
        drifted_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunLayout;
    use crate::storage::read_yaml_file;
    use ndarray::{array, Array2};
    use tempfile::TempDir;

    const SCHEMA: &str = "columns:\n  - a: int64\n  - b: int64\n  - Result: int64\nnumerical_columns:\n  - a\n  - b\n";

    struct Fixture {
        _temp_dir: TempDir,
        config: PipelineConfig,
        layout: RunLayout,
        split: SplitArtifact,
    }

    fn fixture(train: &DataTable, test: &DataTable) -> Fixture {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = PipelineConfig::default();
        config.artifact_dir = temp_dir.path().join("artifact");
        config.schema_path = temp_dir.path().join("schema.yaml");
        fs::write(&config.schema_path, SCHEMA).unwrap();

        let layout = RunLayout::new(&config, "run");
        train.write_csv(&layout.ingestion.training_file).unwrap();
        test.write_csv(&layout.ingestion.testing_file).unwrap();
        let split = SplitArtifact {
            feature_store_file_path: layout.ingestion.feature_store_file.clone(),
            training_file_path: layout.ingestion.training_file.clone(),
            testing_file_path: layout.ingestion.testing_file.clone(),
        };

        Fixture {
            _temp_dir: temp_dir,
            config,
            layout,
            split,
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn balanced(n_rows: usize) -> DataTable {
        let values = Array2::from_shape_fn((n_rows, 3), |(r, c)| match c {
            0 => (r % 3) as f64 - 1.0,
            1 => ((r / 3) % 2) as f64,
            _ => if r % 2 == 0 { 1.0 } else { -1.0 },
        });
        DataTable::new(columns(&["a", "b", "Result"]), values).unwrap()
    }

    #[test]
    fn test_valid_splits_pass_and_write_report() {
        let fx = fixture(&balanced(60), &balanced(30));
        let artifact = validate(&fx.config, &fx.layout.validation, &fx.split).unwrap();

        assert!(artifact.validation_status);
        assert!(artifact.valid_train_file_path.exists());
        assert!(artifact.invalid_train_file_path.is_none());

        let report: DriftReport = read_yaml_file(&artifact.drift_report_file_path).unwrap();
        assert_eq!(report.columns().len(), 3);
    }

    #[test]
    fn test_column_count_mismatch_writes_nothing() {
        let short = DataTable::new(columns(&["a", "Result"]), array![[1.0, 1.0], [0.0, -1.0]]).unwrap();
        let fx = fixture(&short, &balanced(6));

        match validate(&fx.config, &fx.layout.validation, &fx.split) {
            Err(PipelineError::SchemaMismatch(message)) => {
                assert!(message.contains("Train dataframe"));
                assert!(!message.contains("Test dataframe"));
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }

        assert!(!fx.layout.validation.drift_report_file.exists());
        assert!(!fx.layout.validation.valid_train_file.exists());
    }

    #[test]
    fn test_rows_with_invalid_labels_are_separated() {
        let mut values = balanced(12).values().clone();
        values[[0, 2]] = f64::NAN;
        values[[1, 2]] = 0.0;
        let train = DataTable::new(columns(&["a", "b", "Result"]), values).unwrap();
        let fx = fixture(&train, &balanced(6));

        let artifact = validate(&fx.config, &fx.layout.validation, &fx.split).unwrap();
        let invalid_path = artifact.invalid_train_file_path.unwrap();
        assert_eq!(DataTable::read_csv(&invalid_path).unwrap().n_rows(), 2);
        assert_eq!(
            DataTable::read_csv(&artifact.valid_train_file_path).unwrap().n_rows(),
            10
        );
        assert!(artifact.invalid_test_file_path.is_none());
    }

    #[test]
    fn test_drift_sets_status_false() {
        let mut shifted = balanced(30).values().clone();
        shifted.column_mut(1).mapv_inplace(|v| v + 10.0);
        let test = DataTable::new(columns(&["a", "b", "Result"]), shifted).unwrap();
        let fx = fixture(&balanced(60), &test);

        let artifact = validate(&fx.config, &fx.layout.validation, &fx.split).unwrap();
        assert!(!artifact.validation_status);
        assert_eq!(artifact.drifted_columns, vec!["b".to_string()]);
    }

    #[test]
    fn test_missing_split_file_fails_fast() {
        let fx = fixture(&balanced(6), &balanced(6));
        fs::remove_file(&fx.split.testing_file_path).unwrap();
        assert!(matches!(
            validate(&fx.config, &fx.layout.validation, &fx.split),
            Err(PipelineError::MissingArtifact(_))
        ));
    }
}
