//! Data Transformation Stage
//!
//! Fits the imputer on the validated training rows only, applies it to both
//! splits, remaps labels to {0, 1} and saves numeric arrays with the label as
//! the last column.

pub mod imputer;

pub use imputer::{KnnImputer, NeighborWeights};

use ndarray::{concatenate, Array1, Array2, Axis};
use tracing::info;

use crate::artifact::{TransformationArtifact, ValidationArtifact};
use crate::config::{PipelineConfig, TransformationPaths};
use crate::error::{PipelineError, Result};
use crate::storage::{save_array, save_object};
use crate::table::DataTable;

/// Raw label values mapped to class indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelEncoding {
    pub negative: f64,
    pub positive: f64,
}

impl Default for LabelEncoding {
    fn default() -> Self {
        Self {
            negative: -1.0,
            positive: 1.0,
        }
    }
}

impl LabelEncoding {
    pub fn from_classes([negative, positive]: [f64; 2]) -> Self {
        Self { negative, positive }
    }

    pub fn encode(&self, raw: f64) -> Result<f64> {
        if raw == self.negative {
            Ok(0.0)
        } else if raw == self.positive {
            Ok(1.0)
        } else if raw.is_nan() {
            Err(PipelineError::InvalidLabel("missing label".to_string()))
        } else {
            Err(PipelineError::InvalidLabel(format!(
                "{raw} is neither {} nor {}",
                self.negative, self.positive
            )))
        }
    }

    pub fn encode_all(&self, raw: &Array1<f64>) -> Result<Array1<f64>> {
        raw.iter().map(|&value| self.encode(value)).collect()
    }
}

/// Separate the features from the encoded target
pub fn split_features_and_target(
    table: &DataTable,
    target_column: &str,
    encoding: &LabelEncoding,
) -> Result<(DataTable, Array1<f64>)> {
    let (features, raw_target) = table.split_column(target_column)?;
    let target = encoding.encode_all(&raw_target)?;
    Ok((features, target))
}

fn with_target(features: Array2<f64>, target: Array1<f64>) -> Result<Array2<f64>> {
    let target = target.insert_axis(Axis(1));
    concatenate(Axis(1), &[features.view(), target.view()])
        .map_err(|e| PipelineError::SchemaMismatch(e.to_string()))
}

pub fn transform(
    config: &PipelineConfig,
    paths: &TransformationPaths,
    validation: &ValidationArtifact,
) -> Result<TransformationArtifact> {
    info!("Starting data transformation");

    let train = DataTable::read_csv(&validation.valid_train_file_path)?;
    let test = DataTable::read_csv(&validation.valid_test_file_path)?;

    let encoding = LabelEncoding::from_classes(config.validation.label_classes);
    let (train_features, train_target) =
        split_features_and_target(&train, &config.target_column, &encoding)?;
    let (test_features, test_target) =
        split_features_and_target(&test, &config.target_column, &encoding)?;

    let imputer = KnnImputer::fit(
        &train_features,
        config.transformation.n_neighbors,
        NeighborWeights::Uniform,
    )?;

    let train_arr = with_target(imputer.transform_table(&train_features)?, train_target)?;
    let test_arr = with_target(imputer.transform_table(&test_features)?, test_target)?;

    save_array(&paths.transformed_train_file, &train_arr)?;
    save_array(&paths.transformed_test_file, &test_arr)?;
    save_object(&paths.transformed_object_file, &imputer)?;

    info!(
        "Data transformation completed: train {:?}, test {:?}, {} cells imputed",
        train_arr.dim(),
        test_arr.dim(),
        train_features.missing_count() + test_features.missing_count()
    );

    Ok(TransformationArtifact {
        transformed_train_file_path: paths.transformed_train_file.clone(),
        transformed_test_file_path: paths.transformed_test_file.clone(),
        transformed_object_file_path: paths.transformed_object_file.clone(),
    })
}
