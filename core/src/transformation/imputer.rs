//! K-nearest-neighbour imputation
//!
//! Each missing cell is filled from the `k` nearest training rows that have a
//! value in that column. Distances are NaN-aware euclidean: only coordinates
//! present in both rows count, scaled up by `n_features / n_present`.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::table::DataTable;

const MODEL: &str = "KNN imputer";

/// How donor values are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborWeights {
    #[default]
    Uniform,
    /// Inverse distance; exact matches take all the weight
    Distance,
}

impl NeighborWeights {
    /// Combine `(distance, value)` donors, nearest first
    fn combine(self, donors: &[(f64, f64)]) -> f64 {
        match self {
            NeighborWeights::Uniform => {
                donors.iter().map(|(_, value)| value).sum::<f64>() / donors.len() as f64
            }
            NeighborWeights::Distance => {
                let exact: Vec<f64> = donors
                    .iter()
                    .filter(|(distance, _)| *distance == 0.0)
                    .map(|(_, value)| *value)
                    .collect();
                if !exact.is_empty() {
                    return exact.iter().sum::<f64>() / exact.len() as f64;
                }
                let (weighted, total) = donors
                    .iter()
                    .fold((0.0, 0.0), |(weighted, total), (distance, value)| {
                        (weighted + value / distance, total + 1.0 / distance)
                    });
                weighted / total
            }
        }
    }
}

/// NaN-aware euclidean distance; None when the rows share no coordinates.
pub fn nan_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
    let mut present = 0usize;
    let mut squared = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        if x.is_nan() || y.is_nan() {
            continue;
        }
        present += 1;
        squared += (x - y).powi(2);
    }

    (present > 0).then(|| (a.len() as f64 / present as f64 * squared).sqrt())
}

/// Fitted imputer. Holds the training rows it draws donors from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnImputer {
    n_neighbors: usize,
    weights: NeighborWeights,
    feature_names: Vec<String>,
    fit_values: Array2<f64>,
    /// Fallback when no donor is reachable
    column_means: Vec<f64>,
}

impl KnnImputer {
    pub fn fit(features: &DataTable, n_neighbors: usize, weights: NeighborWeights) -> Result<Self> {
        if n_neighbors == 0 {
            return Err(PipelineError::Config(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if features.is_empty() {
            return Err(PipelineError::fit(MODEL, "no training rows"));
        }

        let values = features.values();
        let mut column_means = Vec::with_capacity(features.n_cols());
        for (index, column) in values.columns().into_iter().enumerate() {
            let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if observed.is_empty() {
                return Err(PipelineError::fit(
                    MODEL,
                    format!("column '{}' has no observed values", features.columns()[index]),
                ));
            }
            column_means.push(observed.iter().sum::<f64>() / observed.len() as f64);
        }

        debug!(
            "Fitted KNN imputer on {} rows x {} columns (k={})",
            features.n_rows(),
            features.n_cols(),
            n_neighbors
        );

        Ok(Self {
            n_neighbors,
            weights,
            feature_names: features.columns().to_vec(),
            fit_values: values.clone(),
            column_means,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Impute a table whose columns are exactly the fitted feature names, in
    /// any order. The result follows the fitted column order.
    pub fn transform_table(&self, table: &DataTable) -> Result<Array2<f64>> {
        let unexpected: Vec<&str> = table
            .columns()
            .iter()
            .filter(|name| !self.feature_names.contains(name))
            .map(String::as_str)
            .collect();
        let missing: Vec<&str> = self
            .feature_names
            .iter()
            .filter(|name| table.column_index(name).is_none())
            .map(String::as_str)
            .collect();

        if !unexpected.is_empty() || !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch(format!(
                "feature columns differ from the fitted preprocessor: missing [{}], unexpected [{}]",
                missing.join(", "),
                unexpected.join(", ")
            )));
        }

        let ordered = table.select_columns(&self.feature_names)?;
        self.transform(&ordered)
    }

    /// Impute an array laid out in fitted column order
    pub fn transform(&self, values: &Array2<f64>) -> Result<Array2<f64>> {
        if values.ncols() != self.feature_names.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "expected {} feature columns, got {}",
                self.feature_names.len(),
                values.ncols()
            )));
        }

        let mut imputed = values.clone();
        for (row_index, row) in values.rows().into_iter().enumerate() {
            let missing: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_nan())
                .map(|(col, _)| col)
                .collect();
            if missing.is_empty() {
                continue;
            }

            let distances: Vec<Option<f64>> = self
                .fit_values
                .rows()
                .into_iter()
                .map(|donor| nan_euclidean(row, donor))
                .collect();

            for col in missing {
                imputed[[row_index, col]] = self.impute_cell(&distances, col);
            }
        }

        Ok(imputed)
    }

    fn impute_cell(&self, distances: &[Option<f64>], col: usize) -> f64 {
        let mut donors: Vec<(f64, f64)> = distances
            .iter()
            .enumerate()
            .filter_map(|(donor, distance)| {
                let value = self.fit_values[[donor, col]];
                match distance {
                    Some(distance) if !value.is_nan() => Some((*distance, value)),
                    _ => None,
                }
            })
            .collect();

        if donors.is_empty() {
            return self.column_means[col];
        }

        // Stable: equally distant donors keep training order.
        donors.sort_by(|a, b| a.0.total_cmp(&b.0));
        donors.truncate(self.n_neighbors);
        self.weights.combine(&donors)
    }
}
