//! Grid search with stratified k-fold cross-validation

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::metrics::accuracy;
use super::models::Classifier;
use super::registry::{Hyperparams, ModelSpec};
use crate::error::{PipelineError, Result};

/// Held-out row indices for each of `k` folds.
///
/// Rows are not shuffled. Each class is cut into `k` contiguous chunks whose
/// sizes differ by at most one, so every fold keeps the class proportions.
pub fn stratified_folds(targets: &Array1<usize>, k: usize) -> Vec<Vec<usize>> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in targets.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    let mut folds = vec![Vec::new(); k];
    for rows in by_class.values() {
        let n = rows.len();
        for fold in 0..k {
            let start = fold * n / k;
            let end = (fold + 1) * n / k;
            folds[fold].extend_from_slice(&rows[start..end]);
        }
    }

    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

fn complement(n_rows: usize, held_out: &[usize]) -> Vec<usize> {
    let mut mask = vec![true; n_rows];
    for &row in held_out {
        mask[row] = false;
    }
    (0..n_rows).filter(|&row| mask[row]).collect()
}

/// Mean held-out accuracy of `params` across `folds`
pub fn cross_val_score(
    params: &Hyperparams,
    features: &Array2<f64>,
    targets: &Array1<usize>,
    folds: &[Vec<usize>],
    seed: u64,
) -> Result<f64> {
    let mut total = 0.0;
    for held_out in folds {
        let train_rows = complement(features.nrows(), held_out);
        let model = Classifier::fit(
            params,
            &features.select(Axis(0), &train_rows),
            &targets.select(Axis(0), &train_rows),
            seed,
        )?;
        let predictions = model.predict(&features.select(Axis(0), held_out));
        total += accuracy(&targets.select(Axis(0), held_out), &predictions);
    }
    Ok(total / folds.len() as f64)
}

/// Best candidate of a grid, refitted on the full data
#[derive(Debug)]
pub struct SearchOutcome {
    pub params: Hyperparams,
    /// None when the model was fitted with defaults and no search
    pub cv_score: Option<f64>,
    pub classifier: Classifier,
}

/// Search the grid of `spec` and refit the best candidate on all rows.
///
/// Candidates are scored in parallel; a candidate whose fit fails scores
/// nothing. Ties keep the earlier candidate.
pub fn grid_search(
    spec: &ModelSpec,
    features: &Array2<f64>,
    targets: &Array1<usize>,
    cv_folds: usize,
    seed: u64,
) -> Result<SearchOutcome> {
    let kind = spec.kind();
    let candidates = spec.candidates();

    if !spec.has_grid() {
        let params = candidates
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::fit(kind, "no candidate parameters"))?;
        info!("Fitting {} with default parameters", kind);
        let classifier = Classifier::fit(&params, features, targets, seed)?;
        return Ok(SearchOutcome {
            params,
            cv_score: None,
            classifier,
        });
    }

    if cv_folds < 2 || cv_folds > features.nrows() {
        return Err(PipelineError::Config(format!(
            "cv_folds must be between 2 and {}, got {}",
            features.nrows(),
            cv_folds
        )));
    }

    info!(
        "Grid search for {}: {} candidates x {} folds",
        kind,
        candidates.len(),
        cv_folds
    );

    let folds = stratified_folds(targets, cv_folds);
    let scores: Vec<Result<f64>> = candidates
        .par_iter()
        .map(|params| cross_val_score(params, features, targets, &folds, seed))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (index, score) in scores.into_iter().enumerate() {
        match score {
            Ok(score) if score.is_finite() => {
                debug!("{} candidate {}: cv accuracy {:.4}", kind, index, score);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((index, score));
                }
            }
            Ok(_) => warn!("{} candidate {} produced a non-finite score", kind, index),
            Err(e) => warn!("{} candidate {} failed: {}", kind, index, e),
        }
    }

    let (index, cv_score) =
        best.ok_or_else(|| PipelineError::fit(kind, "every grid candidate failed to fit"))?;
    let params = candidates[index].clone();
    info!(
        "Best {} parameters: {:?} (cv accuracy {:.4})",
        kind, params, cv_score
    );

    let classifier = Classifier::fit(&params, features, targets, seed)?;
    Ok(SearchOutcome {
        params,
        cv_score: Some(cv_score),
        classifier,
    })
}
