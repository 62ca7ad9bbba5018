//! Fitted classifiers
//!
//! Labels are `usize` class indices (0 negative, 1 positive). Decision trees
//! and logistic regression are fitted with linfa, the forest and AdaBoost with
//! linfa-ensemble; gradient boosting uses the histogram trees in
//! [`super::boosting`].

use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use linfa_trees::{DecisionTree, DecisionTreeParams, SplitQuality};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::adaboost::AdaBoost;
use super::boosting::GradientBoosting;
use super::forest::RandomForest;
use super::registry::{Criterion, Hyperparams, LogisticParams, ModelKind, TreeParams};
use crate::error::{PipelineError, Result};

/// Reject inputs no model can be fitted on
pub(crate) fn check_training_data(
    model: ModelKind,
    features: &Array2<f64>,
    targets: &Array1<usize>,
) -> Result<()> {
    if features.nrows() != targets.len() {
        return Err(PipelineError::fit(
            model,
            format!(
                "features and targets must have same number of samples: {} vs {}",
                features.nrows(),
                targets.len()
            ),
        ));
    }

    if features.nrows() == 0 || features.ncols() == 0 {
        return Err(PipelineError::fit(model, "features and targets cannot be empty"));
    }

    if features.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::fit(model, "features contain missing or infinite values"));
    }

    Ok(())
}

/// Reject labels outside {0, 1}
pub(crate) fn check_binary_targets(model: ModelKind, targets: &Array1<usize>) -> Result<()> {
    match targets.iter().find(|&&label| label > 1) {
        Some(label) => Err(PipelineError::fit(
            model,
            format!("binary labels expected, found class {label}"),
        )),
        None => Ok(()),
    }
}

fn split_quality(criterion: Criterion) -> SplitQuality {
    match criterion {
        Criterion::Gini => SplitQuality::Gini,
        Criterion::Entropy => SplitQuality::Entropy,
    }
}

pub(crate) fn tree_params(params: &TreeParams) -> DecisionTreeParams<f64, usize> {
    DecisionTree::params()
        .split_quality(split_quality(params.criterion))
        .max_depth(params.max_depth)
        .min_weight_leaf(params.min_samples_leaf.max(1) as f32)
}

/// Fit a linfa classification tree
pub(crate) fn fit_tree(
    model: ModelKind,
    params: &TreeParams,
    features: Array2<f64>,
    targets: Array1<usize>,
) -> Result<DecisionTree<f64, usize>> {
    let dataset = Dataset::new(features, targets);
    tree_params(params)
        .fit(&dataset)
        .map_err(|e| PipelineError::fit(model, format!("decision tree training failed: {e}")))
}

/// Weighted vote of member predictions; ties go to the lower class
pub(crate) fn weighted_vote(
    n_rows: usize,
    ballots: impl Iterator<Item = (Array1<usize>, f64)>,
) -> Array1<usize> {
    let mut votes = Array2::<f64>::zeros((n_rows, 2));
    for (predictions, weight) in ballots {
        for (row, &class) in predictions.iter().enumerate() {
            if class < 2 {
                votes[[row, class]] += weight;
            }
        }
    }
    votes
        .rows()
        .into_iter()
        .map(|row| usize::from(row[1] > row[0]))
        .collect()
}

/// Binary logistic regression reduced to its linear decision function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn fit(
        params: &LogisticParams,
        features: &Array2<f64>,
        targets: &Array1<usize>,
    ) -> Result<Self> {
        let kind = ModelKind::LogisticRegression;
        check_training_data(kind, features, targets)?;
        check_binary_targets(kind, targets)?;

        if params.c <= 0.0 {
            return Err(PipelineError::fit(kind, format!("C must be positive, got {}", params.c)));
        }

        let dataset = Dataset::new(features.clone(), targets.clone());
        let fitted = LogisticRegression::default()
            .alpha(1.0 / params.c)
            .max_iterations(params.max_iterations)
            .fit(&dataset)
            .map_err(|e| PipelineError::fit(kind, format!("logistic regression training failed: {e}")))?;

        let mut model = Self {
            coefficients: fitted.params().to_owned(),
            intercept: fitted.intercept(),
        };

        // Orient the decision function so that positive scores mean class 1.
        let reference: Array1<usize> = fitted.predict(features);
        let agreement = model
            .predict(features)
            .iter()
            .zip(reference.iter())
            .filter(|(ours, theirs)| ours == theirs)
            .count();
        if agreement * 2 < targets.len() {
            model.coefficients.mapv_inplace(|w| -w);
            model.intercept = -model.intercept;
        }

        Ok(model)
    }

    pub fn decision_function(&self, features: &Array2<f64>) -> Array1<f64> {
        features.dot(&self.coefficients) + self.intercept
    }

    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        self.decision_function(features)
            .mapv(|z| 1.0 / (1.0 + (-z).exp()))
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        self.decision_function(features)
            .mapv(|z| usize::from(z >= 0.0))
    }
}

/// Any fitted candidate
#[derive(Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    AdaBoost(AdaBoost),
    LogisticRegression(LogisticModel),
    DecisionTree(DecisionTree<f64, usize>),
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Classifier").field(&self.kind()).finish()
    }
}

impl Classifier {
    /// Fit the family named by `params`
    pub fn fit(
        params: &Hyperparams,
        features: &Array2<f64>,
        targets: &Array1<usize>,
        seed: u64,
    ) -> Result<Self> {
        debug!(
            "Fitting {} on {} samples x {} features",
            params.kind(),
            features.nrows(),
            features.ncols()
        );

        let classifier = match params {
            Hyperparams::RandomForest(p) => {
                Classifier::RandomForest(RandomForest::fit(p, features, targets, seed)?)
            }
            Hyperparams::GradientBoosting(p) => {
                Classifier::GradientBoosting(GradientBoosting::fit(p, features, targets, seed)?)
            }
            Hyperparams::AdaBoost(p) => {
                Classifier::AdaBoost(AdaBoost::fit(p, features, targets, seed)?)
            }
            Hyperparams::LogisticRegression(p) => {
                Classifier::LogisticRegression(LogisticModel::fit(p, features, targets)?)
            }
            Hyperparams::DecisionTree(p) => {
                let kind = ModelKind::DecisionTree;
                check_training_data(kind, features, targets)?;
                Classifier::DecisionTree(fit_tree(kind, p, features.clone(), targets.clone())?)
            }
        };

        Ok(classifier)
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        match self {
            Classifier::RandomForest(model) => model.predict(features),
            Classifier::GradientBoosting(model) => model.predict(features),
            Classifier::AdaBoost(model) => model.predict(features),
            Classifier::LogisticRegression(model) => model.predict(features),
            Classifier::DecisionTree(model) => model.predict(features),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::RandomForest(_) => ModelKind::RandomForest,
            Classifier::GradientBoosting(_) => ModelKind::GradientBoosting,
            Classifier::AdaBoost(_) => ModelKind::AdaBoost,
            Classifier::LogisticRegression(_) => ModelKind::LogisticRegression,
            Classifier::DecisionTree(_) => ModelKind::DecisionTree,
        }
    }
}
