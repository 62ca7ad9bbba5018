//! Deployable model bundle
//!
//! [`NetworkModel`] pairs the fitted preprocessor with the selected classifier
//! so raw feature tables can be scored in one call.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::{FINAL_MODEL_FILE, FINAL_PREPROCESSOR_FILE};
use crate::error::Result;
use crate::storage::{load_object, save_object};
use crate::table::DataTable;
use crate::trainer::models::Classifier;
use crate::trainer::registry::ModelKind;
use crate::transformation::KnnImputer;
use crate::PREDICTION_COLUMN;

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkModel {
    preprocessor: KnnImputer,
    model: Classifier,
}

impl NetworkModel {
    pub fn new(preprocessor: KnnImputer, model: Classifier) -> Self {
        Self {
            preprocessor,
            model,
        }
    }

    pub fn preprocessor(&self) -> &KnnImputer {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.model
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// Feature columns the bundle expects
    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.feature_names()
    }

    /// Impute then classify. Labels are 0.0 or 1.0, one per row.
    pub fn predict(&self, features: &DataTable) -> Result<Array1<f64>> {
        let imputed = self.preprocessor.transform_table(features)?;
        Ok(self.model.predict(&imputed).mapv(|label| label as f64))
    }

    /// Predict for every row and append the labels as [`PREDICTION_COLUMN`].
    ///
    /// A `target_column` the bundle was not fitted on is ignored for
    /// prediction but kept in the returned table.
    pub fn score_table(&self, table: DataTable, target_column: &str) -> Result<DataTable> {
        let predictions = if table.column_index(target_column).is_some()
            && !self.feature_names().iter().any(|name| name == target_column)
        {
            let (features, _) = table.split_column(target_column)?;
            self.predict(&features)?
        } else {
            self.predict(&table)?
        };
        table.with_column(PREDICTION_COLUMN, predictions)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_object(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_object(path)
    }

    /// Load from a directory holding separately saved preprocessor and model
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let preprocessor: KnnImputer = load_object(&dir.join(FINAL_PREPROCESSOR_FILE))?;
        let model: Classifier = load_object(&dir.join(FINAL_MODEL_FILE))?;
        info!("Loaded {} model from {}", model.kind(), dir.display());
        Ok(Self::new(preprocessor, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::trainer::models::test_data::separable;
    use crate::trainer::registry::{Hyperparams, TreeParams};
    use crate::transformation::NeighborWeights;
    use tempfile::TempDir;

    fn fitted_bundle() -> (NetworkModel, DataTable) {
        let (features, targets) = separable(120, 3, 5);
        let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let table = DataTable::new(columns, features.clone()).unwrap();

        let imputer = KnnImputer::fit(&table, 3, NeighborWeights::Uniform).unwrap();
        let model = Classifier::fit(
            &Hyperparams::DecisionTree(TreeParams::default()),
            &features,
            &targets,
            0,
        )
        .unwrap();
        (NetworkModel::new(imputer, model), table)
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("model.bin");
        let (bundle, table) = fitted_bundle();

        let before = bundle.predict(&table).unwrap();
        bundle.save(&path).unwrap();
        let loaded = NetworkModel::load(&path).unwrap();

        assert_eq!(loaded.kind(), ModelKind::DecisionTree);
        assert_eq!(loaded.predict(&table).unwrap(), before);
        assert!(before.iter().all(|&label| label == 0.0 || label == 1.0));
    }

    #[test]
    fn test_predict_imputes_missing_cells() {
        let (bundle, table) = fitted_bundle();
        let mut values = table.values().clone();
        values[[0, 2]] = f64::NAN;
        let with_gap = DataTable::new(table.columns().to_vec(), values).unwrap();

        let predictions = bundle.predict(&with_gap).unwrap();
        assert_eq!(predictions.len(), table.n_rows());
    }

    #[test]
    fn test_load_from_dir_reads_separate_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (bundle, table) = fitted_bundle();
        save_object(&temp_dir.path().join(FINAL_PREPROCESSOR_FILE), bundle.preprocessor()).unwrap();
        save_object(&temp_dir.path().join(FINAL_MODEL_FILE), bundle.classifier()).unwrap();

        let loaded = NetworkModel::load_from_dir(temp_dir.path()).unwrap();
        assert_eq!(loaded.predict(&table).unwrap(), bundle.predict(&table).unwrap());
    }

    #[test]
    fn test_score_table_appends_predictions_and_keeps_label() {
        let (bundle, table) = fitted_bundle();
        let labels = ndarray::Array1::from_elem(table.n_rows(), 1.0);
        let labelled = table.clone().with_column("Result", labels).unwrap();

        let scored = bundle.score_table(labelled, "Result").unwrap();
        assert_eq!(scored.columns().last().map(String::as_str), Some(PREDICTION_COLUMN));
        assert!(scored.column("Result").is_some());
        assert_eq!(
            scored.column(PREDICTION_COLUMN).unwrap().to_owned(),
            bundle.predict(&table).unwrap()
        );
    }

    #[test]
    fn test_score_table_rejects_unknown_columns() {
        let (bundle, table) = fitted_bundle();
        let extra = table.with_column("unexpected", ndarray::Array1::zeros(120)).unwrap();
        assert!(bundle.score_table(extra, "Result").is_err());
    }

    #[test]
    fn test_missing_bundle_is_missing_artifact() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        assert!(matches!(
            NetworkModel::load(&temp_dir.path().join("model.bin")),
            Err(PipelineError::MissingArtifact(_))
        ));
    }
}
