//! AdaBoost (SAMME) over depth-one linfa trees
//!
//! Fitting is linfa-ensemble's resampling AdaBoost: each round draws rows by
//! the current sample weights, since linfa trees take unweighted datasets.

use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{check_binary_targets, check_training_data, tree_params, weighted_vote};
use super::registry::{AdaBoostParams, Criterion, ModelKind, TreeParams};
use crate::error::{PipelineError, Result};

#[derive(Serialize, Deserialize)]
pub struct AdaBoost {
    stumps: Vec<DecisionTree<f64, usize>>,
    /// Vote weight of each stump
    alphas: Vec<f64>,
}

impl AdaBoost {
    pub fn fit(
        params: &AdaBoostParams,
        features: &Array2<f64>,
        targets: &Array1<usize>,
        seed: u64,
    ) -> Result<Self> {
        let kind = ModelKind::AdaBoost;
        check_training_data(kind, features, targets)?;
        check_binary_targets(kind, targets)?;

        let stump = tree_params(&TreeParams {
            criterion: Criterion::Gini,
            max_depth: Some(1),
            min_samples_leaf: 1,
        });

        let dataset = Dataset::new(features.clone(), targets.clone());
        let rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let fitted = linfa_ensemble::AdaBoostParams::new_fixed_rng(stump, rng)
            .n_estimators(params.n_estimators)
            .learning_rate(params.learning_rate)
            .fit(&dataset)
            .map_err(|e| PipelineError::fit(kind, format!("adaboost training failed: {e}")))?;

        debug!(
            "AdaBoost fitted: {} of {} stumps",
            fitted.n_estimators(),
            params.n_estimators
        );

        Ok(Self {
            stumps: fitted.models,
            alphas: fitted.model_weights,
        })
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        let ballots = self.stumps.iter().zip(&self.alphas).map(|(stump, &alpha)| {
            let predictions: Array1<usize> = stump.predict(features);
            (predictions, alpha)
        });
        weighted_vote(features.nrows(), ballots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::metrics::accuracy;
    use crate::trainer::models::test_data::separable;

    #[test]
    fn test_adaboost_combines_stumps() {
        let (features, targets) = separable(300, 4, 21);
        let model = AdaBoost::fit(&AdaBoostParams::default(), &features, &targets, 8).unwrap();

        assert!(model.n_stumps() > 1);
        assert!(accuracy(&targets, &model.predict(&features)) > 0.85);
    }

    #[test]
    fn test_perfect_stump_ends_training() {
        let features = Array2::from_shape_fn((40, 1), |(row, _)| (row % 2) as f64);
        let targets = Array1::from_shape_fn(40, |row| row % 2);
        let model = AdaBoost::fit(&AdaBoostParams::default(), &features, &targets, 0).unwrap();

        assert_eq!(model.n_stumps(), 1);
        assert_eq!(model.predict(&features), targets);
    }

    #[test]
    fn test_invalid_parameters_are_fit_failures() {
        let (features, targets) = separable(10, 2, 0);
        for params in [
            AdaBoostParams {
                n_estimators: 0,
                ..AdaBoostParams::default()
            },
            AdaBoostParams {
                learning_rate: 0.0,
                ..AdaBoostParams::default()
            },
        ] {
            assert!(matches!(
                AdaBoost::fit(&params, &features, &targets, 0),
                Err(PipelineError::FitFailure { .. })
            ));
        }
    }

    #[test]
    fn test_single_class_is_rejected() {
        let features = Array2::from_shape_fn((10, 2), |(row, col)| (row + col) as f64);
        let targets = Array1::zeros(10);
        assert!(AdaBoost::fit(&AdaBoostParams::default(), &features, &targets, 0).is_err());
    }
}
