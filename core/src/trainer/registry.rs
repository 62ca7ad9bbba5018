//! Model registry
//!
//! A closed set of model families. Each [`ModelSpec`] carries a typed
//! hyperparameter grid that expands into concrete [`Hyperparams`] candidates.
//! An empty axis falls back to that parameter's default value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model families the trainer can fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    AdaBoost,
    LogisticRegression,
    DecisionTree,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::AdaBoost => "AdaBoost",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::DecisionTree => "Decision Tree",
        };
        f.write_str(name)
    }
}

/// Split quality measure for classification trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    Entropy,
}

/// Number of features considered per tree or per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::All => n_features,
        };
        resolved.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub criterion: Criterion,
    pub max_features: MaxFeatures,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_features: MaxFeatures::Sqrt,
            n_estimators: 100,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub learning_rate: f64,
    /// Fraction of rows sampled for each stage
    pub subsample: f64,
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub max_depth: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            subsample: 1.0,
            n_estimators: 100,
            max_features: MaxFeatures::All,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iterations: u64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

/// One concrete hyperparameter assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Hyperparams {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    AdaBoost(AdaBoostParams),
    LogisticRegression(LogisticParams),
    DecisionTree(TreeParams),
}

impl Hyperparams {
    pub fn kind(&self) -> ModelKind {
        match self {
            Hyperparams::RandomForest(_) => ModelKind::RandomForest,
            Hyperparams::GradientBoosting(_) => ModelKind::GradientBoosting,
            Hyperparams::AdaBoost(_) => ModelKind::AdaBoost,
            Hyperparams::LogisticRegression(_) => ModelKind::LogisticRegression,
            Hyperparams::DecisionTree(_) => ModelKind::DecisionTree,
        }
    }
}

fn axis<T: Clone>(values: &[T], default: T) -> Vec<T> {
    if values.is_empty() {
        vec![default]
    } else {
        values.to_vec()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestGrid {
    pub criterion: Vec<Criterion>,
    pub max_features: Vec<MaxFeatures>,
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
}

impl ForestGrid {
    fn is_empty(&self) -> bool {
        self.criterion.is_empty()
            && self.max_features.is_empty()
            && self.n_estimators.is_empty()
            && self.max_depth.is_empty()
    }

    fn expand(&self) -> Vec<ForestParams> {
        let defaults = ForestParams::default();
        let mut out = Vec::new();
        for criterion in axis(&self.criterion, defaults.criterion) {
            for max_features in axis(&self.max_features, defaults.max_features) {
                for n_estimators in axis(&self.n_estimators, defaults.n_estimators) {
                    for max_depth in axis(&self.max_depth, defaults.max_depth) {
                        out.push(ForestParams {
                            criterion,
                            max_features,
                            n_estimators,
                            max_depth,
                        });
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingGrid {
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub n_estimators: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    pub max_depth: Vec<usize>,
}

impl BoostingGrid {
    fn is_empty(&self) -> bool {
        self.learning_rate.is_empty()
            && self.subsample.is_empty()
            && self.n_estimators.is_empty()
            && self.max_features.is_empty()
            && self.max_depth.is_empty()
    }

    fn expand(&self) -> Vec<BoostingParams> {
        let defaults = BoostingParams::default();
        let mut out = Vec::new();
        for learning_rate in axis(&self.learning_rate, defaults.learning_rate) {
            for subsample in axis(&self.subsample, defaults.subsample) {
                for n_estimators in axis(&self.n_estimators, defaults.n_estimators) {
                    for max_features in axis(&self.max_features, defaults.max_features) {
                        for max_depth in axis(&self.max_depth, defaults.max_depth) {
                            out.push(BoostingParams {
                                learning_rate,
                                subsample,
                                n_estimators,
                                max_features,
                                max_depth,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaBoostGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
}

impl AdaBoostGrid {
    fn is_empty(&self) -> bool {
        self.n_estimators.is_empty() && self.learning_rate.is_empty()
    }

    fn expand(&self) -> Vec<AdaBoostParams> {
        let defaults = AdaBoostParams::default();
        let mut out = Vec::new();
        for n_estimators in axis(&self.n_estimators, defaults.n_estimators) {
            for learning_rate in axis(&self.learning_rate, defaults.learning_rate) {
                out.push(AdaBoostParams {
                    n_estimators,
                    learning_rate,
                });
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticGrid {
    pub c: Vec<f64>,
    pub max_iterations: Vec<u64>,
}

impl LogisticGrid {
    fn is_empty(&self) -> bool {
        self.c.is_empty() && self.max_iterations.is_empty()
    }

    fn expand(&self) -> Vec<LogisticParams> {
        let defaults = LogisticParams::default();
        let mut out = Vec::new();
        for c in axis(&self.c, defaults.c) {
            for max_iterations in axis(&self.max_iterations, defaults.max_iterations) {
                out.push(LogisticParams { c, max_iterations });
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeGrid {
    pub criterion: Vec<Criterion>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_leaf: Vec<usize>,
}

impl TreeGrid {
    fn is_empty(&self) -> bool {
        self.criterion.is_empty() && self.max_depth.is_empty() && self.min_samples_leaf.is_empty()
    }

    fn expand(&self) -> Vec<TreeParams> {
        let defaults = TreeParams::default();
        let mut out = Vec::new();
        for criterion in axis(&self.criterion, defaults.criterion) {
            for max_depth in axis(&self.max_depth, defaults.max_depth) {
                for min_samples_leaf in axis(&self.min_samples_leaf, defaults.min_samples_leaf) {
                    out.push(TreeParams {
                        criterion,
                        max_depth,
                        min_samples_leaf,
                    });
                }
            }
        }
        out
    }
}

/// A model family together with its search grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest(ForestGrid),
    GradientBoosting(BoostingGrid),
    AdaBoost(AdaBoostGrid),
    LogisticRegression(LogisticGrid),
    DecisionTree(TreeGrid),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::RandomForest(_) => ModelKind::RandomForest,
            ModelSpec::GradientBoosting(_) => ModelKind::GradientBoosting,
            ModelSpec::AdaBoost(_) => ModelKind::AdaBoost,
            ModelSpec::LogisticRegression(_) => ModelKind::LogisticRegression,
            ModelSpec::DecisionTree(_) => ModelKind::DecisionTree,
        }
    }

    /// False when every grid axis is empty; the model is then fitted with
    /// defaults and no search.
    pub fn has_grid(&self) -> bool {
        match self {
            ModelSpec::RandomForest(grid) => !grid.is_empty(),
            ModelSpec::GradientBoosting(grid) => !grid.is_empty(),
            ModelSpec::AdaBoost(grid) => !grid.is_empty(),
            ModelSpec::LogisticRegression(grid) => !grid.is_empty(),
            ModelSpec::DecisionTree(grid) => !grid.is_empty(),
        }
    }

    /// Every candidate of the grid, in a fixed order
    pub fn candidates(&self) -> Vec<Hyperparams> {
        match self {
            ModelSpec::RandomForest(grid) => grid
                .expand()
                .into_iter()
                .map(Hyperparams::RandomForest)
                .collect(),
            ModelSpec::GradientBoosting(grid) => grid
                .expand()
                .into_iter()
                .map(Hyperparams::GradientBoosting)
                .collect(),
            ModelSpec::AdaBoost(grid) => grid
                .expand()
                .into_iter()
                .map(Hyperparams::AdaBoost)
                .collect(),
            ModelSpec::LogisticRegression(grid) => grid
                .expand()
                .into_iter()
                .map(Hyperparams::LogisticRegression)
                .collect(),
            ModelSpec::DecisionTree(grid) => grid
                .expand()
                .into_iter()
                .map(Hyperparams::DecisionTree)
                .collect(),
        }
    }
}

/// The five candidate families with their standard grids, in ranking
/// tie-break order.
pub fn default_registry() -> Vec<ModelSpec> {
    vec![
        ModelSpec::RandomForest(ForestGrid {
            criterion: vec![Criterion::Gini, Criterion::Entropy],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2, MaxFeatures::All],
            n_estimators: vec![8, 16, 32, 64, 128],
            max_depth: Vec::new(),
        }),
        ModelSpec::GradientBoosting(BoostingGrid {
            learning_rate: vec![0.1, 0.01, 0.05],
            subsample: vec![0.7, 0.8, 0.9],
            n_estimators: vec![50, 100],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
            max_depth: Vec::new(),
        }),
        ModelSpec::AdaBoost(AdaBoostGrid {
            n_estimators: vec![50, 100],
            learning_rate: vec![0.01, 0.05, 0.1],
        }),
        ModelSpec::LogisticRegression(LogisticGrid {
            c: vec![0.1, 1.0, 10.0],
            max_iterations: Vec::new(),
        }),
        ModelSpec::DecisionTree(TreeGrid {
            criterion: vec![Criterion::Gini, Criterion::Entropy],
            max_depth: vec![None, Some(8), Some(16)],
            min_samples_leaf: Vec::new(),
        }),
    ]
}
