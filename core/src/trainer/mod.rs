//! Model Trainer Stage
//!
//! Searches every configured model family, ranks the refitted winners by R²
//! on the test split, then scores, accepts and persists the best one.

pub mod adaboost;
pub mod boosting;
pub mod forest;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod search;

pub use metrics::{get_classification_score, ClassificationMetric, ModelReport, ModelScore};
pub use models::Classifier;
pub use registry::{default_registry, Hyperparams, ModelKind, ModelSpec};

use ndarray::{s, Array1, Array2};
use tracing::{info, warn};

use crate::artifact::{ModelTrainerArtifact, TransformationArtifact};
use crate::config::{PipelineConfig, TrainerConfig, TrainerPaths};
use crate::error::{PipelineError, Result};
use crate::estimator::NetworkModel;
use crate::storage::{load_array, load_object, save_object};
use crate::tracking::{record, ExperimentTracker, RunRecord, Split};
use crate::transformation::KnnImputer;
use search::grid_search;

/// Split a transformed array into features and the trailing label column
pub fn split_features_and_labels(array: &Array2<f64>) -> Result<(Array2<f64>, Array1<usize>)> {
    if array.ncols() < 2 {
        return Err(PipelineError::SchemaMismatch(format!(
            "transformed array needs features and a label, got {} columns",
            array.ncols()
        )));
    }

    let last = array.ncols() - 1;
    let features = array.slice(s![.., ..last]).to_owned();
    let labels = array
        .column(last)
        .iter()
        .map(|&value| {
            if value == 0.0 || value == 1.0 {
                Ok(value as usize)
            } else {
                Err(PipelineError::InvalidLabel(format!(
                    "encoded label {value} is not 0 or 1"
                )))
            }
        })
        .collect::<Result<Array1<usize>>>()?;

    Ok((features, labels))
}

/// A refitted candidate with its scores
pub struct EvaluatedModel {
    pub score: ModelScore,
    pub classifier: Classifier,
}

/// Grid-search, refit and score every configured family in order
pub fn evaluate_models(
    config: &TrainerConfig,
    x_train: &Array2<f64>,
    y_train: &Array1<usize>,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
) -> Result<Vec<EvaluatedModel>> {
    let mut evaluated = Vec::with_capacity(config.candidates.len());

    for spec in &config.candidates {
        let outcome = grid_search(spec, x_train, y_train, config.cv_folds, config.seed)?;

        let train_score = metrics::r2_score(y_train, &outcome.classifier.predict(x_train));
        let test_score = metrics::r2_score(y_test, &outcome.classifier.predict(x_test));
        info!(
            "{}: train R2 {:.4}, test R2 {:.4}",
            spec.kind(),
            train_score,
            test_score
        );

        evaluated.push(EvaluatedModel {
            score: ModelScore {
                model: spec.kind(),
                params: outcome.params,
                cv_score: outcome.cv_score,
                train_score,
                test_score,
            },
            classifier: outcome.classifier,
        });
    }

    Ok(evaluated)
}

pub fn train(
    config: &PipelineConfig,
    paths: &TrainerPaths,
    transformation: &TransformationArtifact,
    tracker: &dyn ExperimentTracker,
) -> Result<ModelTrainerArtifact> {
    info!("Starting model trainer");

    let train_arr = load_array(&transformation.transformed_train_file_path)?;
    let test_arr = load_array(&transformation.transformed_test_file_path)?;
    let (x_train, y_train) = split_features_and_labels(&train_arr)?;
    let (x_test, y_test) = split_features_and_labels(&test_arr)?;

    let mut evaluated = evaluate_models(&config.trainer, &x_train, &y_train, &x_test, &y_test)?;

    let mut report = ModelReport::new();
    for model in &evaluated {
        report.push(model.score.clone());
    }
    let best_index = report
        .best_index()
        .ok_or_else(|| PipelineError::fit("model selection", "no model produced a finite score"))?;
    let best = evaluated.swap_remove(best_index);
    info!(
        "Best model: {} (test R2 {:.4})",
        best.score.model, best.score.test_score
    );

    let train_metric = get_classification_score(&y_train, &best.classifier.predict(&x_train));
    record(tracker, RunRecord::new(&best.score.params, Split::Train, train_metric));

    let test_metric = get_classification_score(&y_test, &best.classifier.predict(&x_test));
    record(tracker, RunRecord::new(&best.score.params, Split::Test, test_metric));

    info!(
        "Train f1 {:.4}, test f1 {:.4} (precision {:.4}, recall {:.4})",
        train_metric.f1_score,
        test_metric.f1_score,
        test_metric.precision_score,
        test_metric.recall_score
    );

    if test_metric.f1_score < config.trainer.expected_score {
        return Err(PipelineError::ModelRejected {
            model: best.score.model.to_string(),
            score: test_metric.f1_score,
            expected: config.trainer.expected_score,
        });
    }

    let overfit_gap = train_metric.f1_score - test_metric.f1_score;
    let overfitting = overfit_gap.abs() > config.trainer.overfit_threshold;
    if overfitting {
        warn!(
            "Train/test f1 gap {:.4} exceeds {:.4}",
            overfit_gap, config.trainer.overfit_threshold
        );
    }

    let preprocessor: KnnImputer = load_object(&transformation.transformed_object_file_path)?;
    let network_model = NetworkModel::new(preprocessor, best.classifier);
    network_model.save(&paths.trained_model_file)?;
    save_object(&paths.final_model_file, network_model.classifier())?;
    save_object(&paths.final_preprocessor_file, network_model.preprocessor())?;
    info!("Model saved to {}", paths.trained_model_file.display());

    Ok(ModelTrainerArtifact {
        trained_model_file_path: paths.trained_model_file.clone(),
        final_model_file_path: paths.final_model_file.clone(),
        best_model: best.score.model,
        best_params: best.score.params,
        train_metric,
        test_metric,
        overfit_gap,
        overfitting,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunLayout;
    use crate::storage::save_array;
    use crate::table::DataTable;
    use crate::tracking::LocalRunTracker;
    use crate::transformation::NeighborWeights;
    use models::test_data::separable;
    use ndarray::{concatenate, Axis};
    use registry::{LogisticGrid, TreeGrid};
    use tempfile::TempDir;

    fn labelled(features: &Array2<f64>, labels: &Array1<usize>) -> Array2<f64> {
        let labels = labels.mapv(|l| l as f64).insert_axis(Axis(1));
        concatenate(Axis(1), &[features.view(), labels.view()]).unwrap()
    }

    fn setup(temp_dir: &TempDir, expected_score: f64) -> (PipelineConfig, RunLayout, TransformationArtifact) {
        let mut config = PipelineConfig::default();
        config.artifact_dir = temp_dir.path().join("artifact");
        config.final_model_dir = temp_dir.path().join("final_models");
        config.trainer.expected_score = expected_score;
        config.trainer.candidates = vec![
            ModelSpec::LogisticRegression(LogisticGrid {
                c: vec![1.0],
                ..LogisticGrid::default()
            }),
            ModelSpec::DecisionTree(TreeGrid {
                max_depth: vec![Some(1), None],
                ..TreeGrid::default()
            }),
        ];
        let layout = RunLayout::new(&config, "run");

        let (x_train, y_train) = separable(200, 4, 1);
        let (x_test, y_test) = separable(60, 4, 2);
        let paths = &layout.transformation;
        save_array(&paths.transformed_train_file, &labelled(&x_train, &y_train)).unwrap();
        save_array(&paths.transformed_test_file, &labelled(&x_test, &y_test)).unwrap();

        let columns = (0..4).map(|i| format!("f{i}")).collect();
        let table = DataTable::new(columns, x_train).unwrap();
        let imputer = KnnImputer::fit(&table, 3, NeighborWeights::Uniform).unwrap();
        save_object(&paths.transformed_object_file, &imputer).unwrap();

        let artifact = TransformationArtifact {
            transformed_train_file_path: paths.transformed_train_file.clone(),
            transformed_test_file_path: paths.transformed_test_file.clone(),
            transformed_object_file_path: paths.transformed_object_file.clone(),
        };
        (config, layout, artifact)
    }

    #[test]
    fn test_split_features_and_labels() {
        let array = ndarray::array![[0.5, -1.0, 1.0], [0.0, 1.0, 0.0]];
        let (features, labels) = split_features_and_labels(&array).unwrap();
        assert_eq!(features.dim(), (2, 2));
        assert_eq!(labels, ndarray::array![1, 0]);

        let bad = ndarray::array![[0.5, -1.0]];
        assert!(matches!(
            split_features_and_labels(&bad),
            Err(PipelineError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_train_persists_bundle_and_final_models() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (config, layout, transformation) = setup(&temp_dir, 0.6);
        let tracker = LocalRunTracker::new(temp_dir.path().join("mlruns"));

        let artifact = train(&config, &layout.trainer, &transformation, &tracker).unwrap();

        assert_eq!(artifact.report.entries().len(), 2);
        assert!(artifact.test_metric.f1_score >= 0.6);
        assert!(artifact.trained_model_file_path.exists());
        assert!(layout.trainer.final_model_file.exists());
        assert!(layout.trainer.final_preprocessor_file.exists());
        assert_eq!(tracker.runs().unwrap().len(), 2);

        let best = artifact.report.best().unwrap();
        assert_eq!(best.model, artifact.best_model);
        let bundle = NetworkModel::load(&artifact.trained_model_file_path).unwrap();
        assert_eq!(bundle.kind(), artifact.best_model);
    }

    #[test]
    fn test_persisted_metrics_come_from_the_winning_model() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (mut config, layout, transformation) = setup(&temp_dir, 0.0);
        config.trainer.candidates = vec![
            ModelSpec::LogisticRegression(LogisticGrid {
                c: vec![1.0],
                ..LogisticGrid::default()
            }),
            ModelSpec::DecisionTree(TreeGrid {
                max_depth: vec![Some(1)],
                ..TreeGrid::default()
            }),
        ];

        let artifact =
            train(&config, &layout.trainer, &transformation, &crate::tracking::NoopTracker).unwrap();

        let entries = artifact.report.entries();
        let winner = entries.iter().find(|e| e.model == artifact.best_model).unwrap();
        let loser = entries.iter().find(|e| e.model != artifact.best_model).unwrap();
        assert!(winner.test_score > loser.test_score);

        let (x_train, y_train) =
            split_features_and_labels(&load_array(&transformation.transformed_train_file_path).unwrap())
                .unwrap();
        let (x_test, y_test) =
            split_features_and_labels(&load_array(&transformation.transformed_test_file_path).unwrap())
                .unwrap();

        let bundle = NetworkModel::load(&artifact.trained_model_file_path).unwrap();
        let classifier = bundle.classifier();
        assert_eq!(
            artifact.train_metric,
            get_classification_score(&y_train, &classifier.predict(&x_train))
        );
        assert_eq!(
            artifact.test_metric,
            get_classification_score(&y_test, &classifier.predict(&x_test))
        );

        let losing = Classifier::fit(&loser.params, &x_train, &y_train, config.trainer.seed).unwrap();
        assert_ne!(
            artifact.test_metric,
            get_classification_score(&y_test, &losing.predict(&x_test))
        );
    }

    #[test]
    fn test_unreachable_expected_score_rejects_model() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (config, layout, transformation) = setup(&temp_dir, 1.01);

        let result = train(&config, &layout.trainer, &transformation, &crate::tracking::NoopTracker);
        assert!(matches!(result, Err(PipelineError::ModelRejected { .. })));
        assert!(!layout.trainer.trained_model_file.exists());
    }
}
