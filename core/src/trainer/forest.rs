//! Random forest
//!
//! Fitted with linfa-ensemble: every tree sees a bootstrap sample of the rows
//! and `max_features` columns drawn with replacement. Prediction is a
//! majority vote with ties going to the lower class.

use linfa::prelude::*;
use linfa_ensemble::{EnsembleLearner, EnsembleLearnerParams};
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{check_training_data, tree_params, weighted_vote};
use super::registry::{ForestParams, ModelKind, TreeParams};
use crate::error::{PipelineError, Result};

#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree<f64, usize>>,
    /// Columns each tree was fitted on
    tree_features: Vec<Vec<usize>>,
}

/// Share of columns for which linfa draws exactly `per_tree` of `n_features`
fn feature_proportion(per_tree: usize, n_features: usize) -> f64 {
    if per_tree >= n_features {
        1.0
    } else {
        (per_tree as f64 - 0.5) / n_features as f64
    }
}

impl RandomForest {
    pub fn fit(
        params: &ForestParams,
        features: &Array2<f64>,
        targets: &Array1<usize>,
        seed: u64,
    ) -> Result<Self> {
        let kind = ModelKind::RandomForest;
        check_training_data(kind, features, targets)?;

        let n_features = features.ncols();
        let per_tree = params.max_features.resolve(n_features);
        let base = tree_params(&TreeParams {
            criterion: params.criterion,
            max_depth: params.max_depth,
            min_samples_leaf: 1,
        });

        let dataset = Dataset::new(features.clone(), targets.clone());
        let rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let EnsembleLearner {
            models,
            model_features,
        } = EnsembleLearnerParams::new_fixed_rng(base, rng)
            .ensemble_size(params.n_estimators)
            .bootstrap_proportion(1.0)
            .feature_proportion(feature_proportion(per_tree, n_features))
            .fit(&dataset)
            .map_err(|e| PipelineError::fit(kind, format!("random forest training failed: {e}")))?;

        debug!(
            "Random forest fitted: {} trees, {} of {} features each",
            models.len(),
            per_tree,
            n_features
        );

        Ok(Self {
            trees: models,
            tree_features: model_features,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        let ballots = self.trees.iter().zip(&self.tree_features).map(|(tree, columns)| {
            let predictions: Array1<usize> = tree.predict(&features.select(Axis(1), columns));
            (predictions, 1.0)
        });
        weighted_vote(features.nrows(), ballots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::metrics::accuracy;
    use crate::trainer::models::test_data::banded;
    use crate::trainer::registry::MaxFeatures;

    fn params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            max_features: MaxFeatures::All,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let (features, targets) = banded(150, 1, 11);
        let first = RandomForest::fit(&params(8), &features, &targets, 5).unwrap();
        let second = RandomForest::fit(&params(8), &features, &targets, 5).unwrap();

        assert_eq!(first.n_trees(), 8);
        assert_eq!(first.predict(&features), second.predict(&features));
        assert!(accuracy(&targets, &first.predict(&features)) > 0.9);
    }

    #[test]
    fn test_per_tree_feature_subset_size() {
        let (features, targets) = banded(60, 9, 2);
        let forest = RandomForest::fit(
            &ForestParams {
                n_estimators: 4,
                max_features: MaxFeatures::Sqrt,
                ..ForestParams::default()
            },
            &features,
            &targets,
            1,
        )
        .unwrap();

        assert_eq!(forest.tree_features.len(), 4);
        assert!(forest.tree_features.iter().all(|columns| columns.len() == 3));
    }

    #[test]
    fn test_feature_proportion_recovers_count() {
        for n_features in 1..64 {
            for per_tree in 1..=n_features {
                let drawn = (n_features as f64 * feature_proportion(per_tree, n_features)).ceil();
                assert_eq!(drawn as usize, per_tree);
            }
        }
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (features, targets) = banded(20, 3, 0);
        assert!(matches!(
            RandomForest::fit(&params(0), &features, &targets, 0),
            Err(PipelineError::FitFailure { .. })
        ));
    }
}
