//! Gradient boosting
//!
//! Binary log-loss boosting over shallow regression trees. Features are
//! bucketed once into at most [`MAX_BINS`] quantile bins; splits are searched
//! over bin boundaries and stored as real-valued thresholds. Leaf values take
//! a single Newton step, `sum(residual) / sum(p * (1 - p))`.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{check_binary_targets, check_training_data};
use super::registry::{BoostingParams, ModelKind};
use crate::error::{PipelineError, Result};

/// Upper bound on distinct bins per feature
pub const MAX_BINS: usize = 32;

const PROBABILITY_CLIP: f64 = 1e-6;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Per-feature split candidates
struct FeatureBins {
    /// Ascending thresholds; bin `b` holds values in `(t[b-1], t[b]]`
    thresholds: Vec<Vec<f64>>,
}

impl FeatureBins {
    fn fit(features: &Array2<f64>, max_bins: usize) -> Self {
        let thresholds = features
            .columns()
            .into_iter()
            .map(|column| Self::column_thresholds(column, max_bins))
            .collect();
        Self { thresholds }
    }

    fn column_thresholds(column: ArrayView1<'_, f64>, max_bins: usize) -> Vec<f64> {
        let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();

        if values.len() < 2 {
            return Vec::new();
        }

        if values.len() <= max_bins {
            return values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        }

        let mut cuts: Vec<f64> = (1..max_bins)
            .map(|k| {
                let position = k * (values.len() - 1) / max_bins;
                (values[position] + values[position + 1]) / 2.0
            })
            .collect();
        cuts.dedup();
        cuts
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.thresholds[feature][bin]
    }

    fn bin_of(&self, feature: usize, value: f64) -> usize {
        self.thresholds[feature].partition_point(|&t| value > t)
    }

    fn transform(&self, features: &Array2<f64>) -> Array2<u8> {
        Array2::from_shape_fn(features.dim(), |(row, col)| {
            self.bin_of(col, features[[row, col]]) as u8
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct TreeBuilder<'a> {
    binned: &'a Array2<u8>,
    bins: &'a FeatureBins,
    residuals: &'a Array1<f64>,
    hessians: &'a Array1<f64>,
    max_depth: usize,
    features_per_split: usize,
}

impl TreeBuilder<'_> {
    fn leaf(&self, rows: &[usize]) -> Node {
        let gradient: f64 = rows.iter().map(|&r| self.residuals[r]).sum();
        let hessian: f64 = rows.iter().map(|&r| self.hessians[r]).sum();
        let value = if hessian > 1e-12 { gradient / hessian } else { 0.0 };
        Node::Leaf { value }
    }

    fn build(&self, rows: Vec<usize>, depth: usize, rng: &mut Xoshiro256PlusPlus) -> Node {
        if depth >= self.max_depth || rows.len() < 2 {
            return self.leaf(&rows);
        }

        let n_features = self.binned.ncols();
        let candidates = if self.features_per_split < n_features {
            sample(rng, n_features, self.features_per_split).into_vec()
        } else {
            (0..n_features).collect()
        };

        let total: f64 = rows.iter().map(|&r| self.residuals[r]).sum();
        let count = rows.len() as f64;
        let parent_score = total * total / count;

        let mut best: Option<(f64, usize, usize)> = None;
        for feature in candidates {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let mut bin_sums = vec![0.0; n_bins];
            let mut bin_counts = vec![0usize; n_bins];
            for &r in &rows {
                let bin = self.binned[[r, feature]] as usize;
                bin_sums[bin] += self.residuals[r];
                bin_counts[bin] += 1;
            }

            let (mut left_sum, mut left_count) = (0.0, 0usize);
            for bin in 0..n_bins - 1 {
                left_sum += bin_sums[bin];
                left_count += bin_counts[bin];
                let right_count = rows.len() - left_count;
                if left_count == 0 || right_count == 0 {
                    continue;
                }
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64
                    - parent_score;
                if best.map_or(gain > 1e-12, |(score, _, _)| gain > score) {
                    best = Some((gain, feature, bin));
                }
            }
        }

        let Some((_, feature, bin)) = best else {
            return self.leaf(&rows);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.binned[[r, feature]] as usize <= bin);

        Node::Split {
            feature,
            threshold: self.bins.threshold(feature, bin),
            left: Box::new(self.build(left_rows, depth + 1, rng)),
            right: Box::new(self.build(right_rows, depth + 1, rng)),
        }
    }
}

/// Regression tree over real-valued features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Missing values follow the left branch, as in binning.
                    node = if row[*feature] > *threshold { right } else { left };
                }
            }
        }
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        features
            .rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect()
    }
}

/// Fitted gradient boosting classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(
        params: &BoostingParams,
        features: &Array2<f64>,
        targets: &Array1<usize>,
        seed: u64,
    ) -> Result<Self> {
        let kind = ModelKind::GradientBoosting;
        check_training_data(kind, features, targets)?;
        check_binary_targets(kind, targets)?;

        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(PipelineError::fit(
                kind,
                format!("subsample must be in (0, 1], got {}", params.subsample),
            ));
        }
        if params.learning_rate <= 0.0 {
            return Err(PipelineError::fit(kind, "learning_rate must be positive"));
        }

        let n_rows = features.nrows();
        let labels = targets.mapv(|label| label as f64);
        let prior = (labels.sum() / n_rows as f64).clamp(PROBABILITY_CLIP, 1.0 - PROBABILITY_CLIP);
        let init = (prior / (1.0 - prior)).ln();

        let bins = FeatureBins::fit(features, MAX_BINS);
        let binned = bins.transform(features);
        let n_sampled = ((params.subsample * n_rows as f64) as usize).clamp(1, n_rows);
        let features_per_split = params.max_features.resolve(features.ncols());

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut raw = Array1::from_elem(n_rows, init);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probabilities = raw.mapv(sigmoid);
            let residuals = &labels - &probabilities;
            let hessians = probabilities.mapv(|p| p * (1.0 - p));

            let rows = if n_sampled < n_rows {
                let mut rows = sample(&mut rng, n_rows, n_sampled).into_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n_rows).collect()
            };

            let builder = TreeBuilder {
                binned: &binned,
                bins: &bins,
                residuals: &residuals,
                hessians: &hessians,
                max_depth: params.max_depth.max(1),
                features_per_split,
            };
            let tree = RegressionTree {
                root: builder.build(rows, 0, &mut rng),
            };

            raw.scaled_add(params.learning_rate, &tree.predict(features));
            trees.push(tree);
        }

        debug!("Gradient boosting fitted: {} stages", trees.len());
        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Raw log-odds of the positive class
    pub fn decision_function(&self, features: &Array2<f64>) -> Array1<f64> {
        let mut raw = Array1::from_elem(features.nrows(), self.init);
        for tree in &self.trees {
            raw.scaled_add(self.learning_rate, &tree.predict(features));
        }
        raw
    }

    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        self.decision_function(features).mapv(sigmoid)
    }

    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        self.decision_function(features)
            .mapv(|z| usize::from(z > 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::metrics::accuracy;
    use crate::trainer::models::test_data::separable;
    use crate::trainer::registry::MaxFeatures;
    use ndarray::array;

    #[test]
    fn test_bins_use_midpoints_for_few_distinct_values() {
        let features = array![[-1.0, 5.0], [0.0, 5.0], [1.0, 5.0], [1.0, 5.0]];
        let bins = FeatureBins::fit(&features, MAX_BINS);

        assert_eq!(bins.thresholds[0], vec![-0.5, 0.5]);
        assert!(bins.thresholds[1].is_empty());
        assert_eq!(bins.bin_of(0, -1.0), 0);
        assert_eq!(bins.bin_of(0, 0.0), 1);
        assert_eq!(bins.bin_of(0, 1.0), 2);
    }

    #[test]
    fn test_bins_are_capped_for_continuous_features() {
        let column: Vec<f64> = (0..500).map(|v| v as f64 * 0.37).collect();
        let features = Array2::from_shape_vec((500, 1), column).unwrap();
        let bins = FeatureBins::fit(&features, MAX_BINS);
        assert!(bins.n_bins(0) <= MAX_BINS);
        assert!(bins.thresholds[0].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_boosting_learns_and_is_deterministic() {
        let (features, targets) = separable(300, 5, 9);
        let params = BoostingParams {
            n_estimators: 40,
            subsample: 0.8,
            max_features: MaxFeatures::Sqrt,
            ..BoostingParams::default()
        };

        let first = GradientBoosting::fit(&params, &features, &targets, 3).unwrap();
        let second = GradientBoosting::fit(&params, &features, &targets, 3).unwrap();
        assert_eq!(first, second);
        assert!(accuracy(&targets, &first.predict(&features)) > 0.9);
    }

    #[test]
    fn test_constant_target_predicts_that_class() {
        let (features, _) = separable(40, 3, 1);
        let targets = Array1::from_elem(40, 1usize);
        let model = GradientBoosting::fit(&BoostingParams::default(), &features, &targets, 0).unwrap();
        assert!(model.predict(&features).iter().all(|&label| label == 1));
    }

    #[test]
    fn test_invalid_subsample_rejected() {
        let (features, targets) = separable(20, 3, 0);
        let params = BoostingParams {
            subsample: 0.0,
            ..BoostingParams::default()
        };
        assert!(matches!(
            GradientBoosting::fit(&params, &features, &targets, 0),
            Err(PipelineError::FitFailure { .. })
        ));
    }
}
