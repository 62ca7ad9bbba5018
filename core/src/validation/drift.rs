//! Distribution drift between the training and testing splits
//!
//! Each column is compared with the two-sample Kolmogorov-Smirnov test. While
//! `n1 * n2` stays within [`EXACT_CELLS`] the p-value is the exact share of
//! lattice paths whose gap reaches the observed statistic. Larger samples use
//! the asymptotic Kolmogorov distribution with the small-sample correction
//! `(sqrt(n_e) + 0.12 + 0.11 / sqrt(n_e)) * D`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::DriftCorrection;
use crate::table::DataTable;

/// Largest `n1 * n2` for which the exact p-value is computed
pub const EXACT_CELLS: usize = 4_000_000;

/// KS statistic and p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample KS test. NaNs are ignored; an empty sample yields D = 0, p = 1.
pub fn ks_2samp(first: &[f64], second: &[f64]) -> KsResult {
    let mut a: Vec<f64> = first.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = second.iter().copied().filter(|v| !v.is_nan()).collect();

    if a.is_empty() || b.is_empty() {
        return KsResult {
            statistic: 0.0,
            p_value: 1.0,
        };
    }

    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (m, n) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    // Largest |i * n - j * m|, the statistic scaled by m * n.
    let mut gap: u64 = 0;

    while i < m && j < n {
        let x = a[i].min(b[j]);
        while i < m && a[i] <= x {
            i += 1;
        }
        while j < n && b[j] <= x {
            j += 1;
        }
        gap = gap.max(lattice_gap(i, j, m, n));
    }

    let statistic = gap as f64 / (m as f64 * n as f64);
    let p_value = if gap == 0 {
        1.0
    } else if m.saturating_mul(n) <= EXACT_CELLS {
        exact_p_value(m, n, gap)
    } else {
        let (n1, n2) = (m as f64, n as f64);
        let effective = (n1 * n2 / (n1 + n2)).sqrt();
        kolmogorov_survival((effective + 0.12 + 0.11 / effective) * statistic)
    };

    KsResult {
        statistic,
        p_value: p_value.clamp(0.0, 1.0),
    }
}

fn lattice_gap(i: usize, j: usize, m: usize, n: usize) -> u64 {
    (i as u64 * n as u64).abs_diff(j as u64 * m as u64)
}

/// P(D >= gap / (m * n)) for two continuous samples of sizes m and n.
///
/// Walks every monotone path from (0, 0) to (m, n), one step per drawn
/// observation, keeping the probability mass that never touches a cell with
/// `|i * n - j * m| >= gap`.
fn exact_p_value(m: usize, n: usize, gap: u64) -> f64 {
    let total = (m + n) as f64;
    let mut previous = vec![0.0f64; n + 1];

    for i in 0..=m {
        let mut current = vec![0.0f64; n + 1];
        for j in 0..=n {
            let mass = if i == 0 && j == 0 {
                1.0
            } else {
                let from_first = if i > 0 {
                    previous[j] * (m - i + 1) as f64 / (total - (i - 1 + j) as f64)
                } else {
                    0.0
                };
                let from_second = if j > 0 {
                    current[j - 1] * (n - j + 1) as f64 / (total - (i + j - 1) as f64)
                } else {
                    0.0
                };
                from_first + from_second
            };
            current[j] = if lattice_gap(i, j, m, n) < gap { mass } else { 0.0 };
        }
        previous = current;
    }

    1.0 - previous[n]
}

/// Q(λ) = 2 Σ_{k≥1} (-1)^{k-1} exp(-2 k² λ²)
fn kolmogorov_survival(lambda: f64) -> f64 {
    const RELATIVE_TERM: f64 = 1e-3;
    const RELATIVE_SUM: f64 = 1e-8;

    if lambda <= 0.0 {
        return 1.0;
    }

    let exponent = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous_term = 0.0;

    for k in 1..=100 {
        let k = k as f64;
        let term = sign * (exponent * k * k).exp();
        sum += term;
        if term.abs() <= RELATIVE_TERM * previous_term || term.abs() <= RELATIVE_SUM * sum {
            return sum;
        }
        sign = -sign;
        previous_term = term.abs();
    }

    // The series has not converged, which only happens as λ approaches 0.
    1.0
}

/// Drift outcome for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_detected: bool,
}

impl ColumnDrift {
    pub fn new(p_value: f64, threshold: f64) -> Self {
        Self {
            p_value,
            drift_detected: p_value < threshold,
        }
    }
}

/// Column name to drift outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    pub fn columns(&self) -> &BTreeMap<String, ColumnDrift> {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.columns.get(column)
    }

    pub fn drifted_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, drift)| drift.drift_detected)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn has_drift(&self) -> bool {
        self.columns.values().any(|drift| drift.drift_detected)
    }
}

/// Test every column of `base` that also appears in `current`.
///
/// `threshold` is the level for the whole table; `correction` decides the
/// level each column is held to.
pub fn detect_dataset_drift(
    base: &DataTable,
    current: &DataTable,
    threshold: f64,
    correction: DriftCorrection,
) -> DriftReport {
    let shared: Vec<&String> = base
        .columns()
        .iter()
        .filter(|name| current.column(name).is_some())
        .collect();
    let column_threshold = correction.column_threshold(threshold, shared.len());

    let columns = shared
        .into_iter()
        .filter_map(|name| {
            let base_values = base.column(name)?.to_vec();
            let current_values = current.column(name)?.to_vec();
            let result = ks_2samp(&base_values, &current_values);
            Some((name.clone(), ColumnDrift::new(result.p_value, column_threshold)))
        })
        .collect();

    DriftReport { columns }
}
