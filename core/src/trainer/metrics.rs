//! Classification and ranking metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::registry::{Hyperparams, ModelKind};

/// Positive-class scores; a zero denominator scores 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision, recall and f1 with class 1 as the positive label
pub fn get_classification_score(
    y_true: &Array1<usize>,
    y_pred: &Array1<usize>,
) -> ClassificationMetric {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&truth, &pred) in y_true.iter().zip(y_pred.iter()) {
        match (truth == 1, pred == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision_score = ratio(tp, tp + fp);
    let recall_score = ratio(tp, tp + fn_);
    let f1_score = ratio(2 * tp, 2 * tp + fp + fn_);

    ClassificationMetric {
        f1_score,
        precision_score,
        recall_score,
    }
}

pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(truth, pred)| truth == pred)
        .count();
    ratio(correct, y_true.len())
}

/// Coefficient of determination of predicted labels against true labels.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let mean = y_true.iter().map(|&v| v as f64).sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t as f64 - p as f64).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Scores of one fitted candidate family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: ModelKind,
    pub params: Hyperparams,
    /// Mean cross-validated accuracy of the chosen params; None when fitted
    /// without a search
    pub cv_score: Option<f64>,
    pub train_score: f64,
    pub test_score: f64,
}

/// Per-model scores in registry order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelReport {
    entries: Vec<ModelScore>,
}

impl ModelReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: ModelScore) {
        self.entries.push(score);
    }

    pub fn entries(&self) -> &[ModelScore] {
        &self.entries
    }

    pub fn get(&self, model: ModelKind) -> Option<&ModelScore> {
        self.entries.iter().find(|entry| entry.model == model)
    }

    /// Index of the highest test score. Ties keep the earliest entry and
    /// non-finite scores never win.
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.test_score.is_finite() {
                continue;
            }
            match best {
                Some((_, score)) if entry.test_score <= score => {}
                _ => best = Some((index, entry.test_score)),
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn best(&self) -> Option<&ModelScore> {
        self.best_index().map(|index| &self.entries[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::registry::{LogisticParams, TreeParams};
    use ndarray::array;

    #[test]
    fn test_classification_score() {
        let y_true = array![1, 1, 0, 0, 1];
        let y_pred = array![1, 0, 1, 0, 1];
        let metric = get_classification_score(&y_true, &y_pred);

        assert!((metric.precision_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((metric.recall_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((metric.f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_scores_zero() {
        let y_true = array![0, 0, 0];
        let y_pred = array![0, 0, 0];
        let metric = get_classification_score(&y_true, &y_pred);
        assert_eq!(metric, ClassificationMetric::default());
    }

    #[test]
    fn test_r2_on_labels() {
        let y_true = array![0, 1, 1, 0];
        assert_eq!(r2_score(&y_true, &y_true), 1.0);
        // ss_res = 1, ss_tot = 1
        assert_eq!(r2_score(&y_true, &array![0, 1, 1, 1]), 0.0);
        assert_eq!(r2_score(&array![1, 1], &array![1, 1]), 1.0);
        assert_eq!(r2_score(&array![1, 1], &array![1, 0]), 0.0);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&array![1, 0, 1, 1], &array![1, 1, 1, 0]), 0.5);
    }

    fn score(model: ModelKind, params: Hyperparams, test_score: f64) -> ModelScore {
        ModelScore {
            model,
            params,
            cv_score: None,
            train_score: test_score,
            test_score,
        }
    }

    #[test]
    fn test_best_model_is_highest_test_score() {
        let mut report = ModelReport::new();
        report.push(score(
            ModelKind::DecisionTree,
            Hyperparams::DecisionTree(TreeParams::default()),
            0.75,
        ));
        report.push(score(
            ModelKind::LogisticRegression,
            Hyperparams::LogisticRegression(LogisticParams::default()),
            0.91,
        ));

        let best = report.best().unwrap();
        assert_eq!(best.model, ModelKind::LogisticRegression);
        assert_eq!(best.test_score, 0.91);
    }

    #[test]
    fn test_ties_keep_registry_order_and_nan_never_wins() {
        let mut report = ModelReport::new();
        report.push(score(
            ModelKind::RandomForest,
            Hyperparams::DecisionTree(TreeParams::default()),
            f64::NAN,
        ));
        report.push(score(
            ModelKind::AdaBoost,
            Hyperparams::DecisionTree(TreeParams::default()),
            0.8,
        ));
        report.push(score(
            ModelKind::DecisionTree,
            Hyperparams::DecisionTree(TreeParams::default()),
            0.8,
        ));

        assert_eq!(report.best_index(), Some(1));
        assert!(ModelReport::new().best_index().is_none());
    }
}
