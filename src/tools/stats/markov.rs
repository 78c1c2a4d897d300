//! Spatial Markov chains over a region × period panel.
//!
//! Values are discretised into `k` quantile classes and their spatial lags
//! into `m` classes. Transitions are counted per lag class of the origin
//! period, giving one `k × k` matrix per lag class plus the pooled matrix.

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::lib::errors::GisError;

use super::{esda::Inference, linalg, linalg::Matrix, weights::Weights};

const CESARO_STEPS: usize = 2_000;

/// Class boundaries, pooled across periods or one list per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cutoffs {
    Pooled(Vec<f64>),
    PerPeriod(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, Copy)]
pub struct MarkovOptions {
    pub k: usize,
    pub m: usize,
    pub fixed: bool,
    pub fill_empty_classes: bool,
    pub inference: Inference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialMarkov {
    pub cutoffs_y: Cutoffs,
    pub cutoffs_lag: Cutoffs,
    /// Pooled transition probabilities.
    pub p: Vec<Vec<f64>>,
    /// Transition probabilities per lag class.
    pub conditional: Vec<Vec<Vec<f64>>>,
    pub s: Vec<f64>,
    pub conditional_steady: Vec<Vec<f64>>,
    pub x2: f64,
    pub x2_dof: usize,
    pub x2_pvalue: f64,
    pub x2_rpvalue: Option<f64>,
    pub q: f64,
    pub q_p_value: f64,
    pub lr: f64,
    pub lr_p_value: f64,
}

type Counts = Vec<Vec<f64>>;

/// Divides every period by its mean; a zero mean leaves the period as is.
pub fn relative_to_period_means(panel: &mut [Vec<f64>]) {
    let Some(periods) = panel.first().map(Vec::len) else {
        return;
    };
    for t in 0..periods {
        let column: Vec<f64> = panel.iter().map(|row| row[t]).collect();
        let mean = linalg::mean(&column);
        let divisor = if mean == 0.0 { 1.0 } else { mean };
        for row in panel.iter_mut() {
            row[t] /= divisor;
        }
    }
}

/// Upper bounds of `k` quantile classes, linear interpolation, duplicates removed.
pub fn quantile_cutoffs(values: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.is_empty() || k == 0 {
        return Vec::new();
    }
    let last = (sorted.len() - 1) as f64;
    let mut cutoffs: Vec<f64> = (1..=k)
        .map(|i| {
            let position = i as f64 / k as f64 * last;
            let lo = position.floor() as usize;
            let hi = position.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64)
        })
        .collect();
    cutoffs.dedup();
    cutoffs
}

/// Index of the first cutoff at or above `value`.
pub fn classify(value: f64, cutoffs: &[f64]) -> usize {
    cutoffs
        .iter()
        .position(|cutoff| value <= *cutoff)
        .unwrap_or(cutoffs.len().saturating_sub(1))
}

fn column(panel: &[Vec<f64>], t: usize) -> Vec<f64> {
    panel.iter().map(|row| row[t]).collect()
}

/// Classes per region and period, with the cutoffs used.
fn discretise(panel: &[Vec<f64>], classes: usize, fixed: bool) -> (Vec<Vec<usize>>, Cutoffs) {
    let periods = panel.first().map_or(0, Vec::len);
    if fixed {
        let pooled: Vec<f64> = panel.iter().flatten().copied().collect();
        let cutoffs = quantile_cutoffs(&pooled, classes);
        let labels = panel
            .iter()
            .map(|row| row.iter().map(|v| classify(*v, &cutoffs)).collect())
            .collect();
        (labels, Cutoffs::Pooled(cutoffs))
    } else {
        let per_period: Vec<Vec<f64>> = (0..periods)
            .map(|t| quantile_cutoffs(&column(panel, t), classes))
            .collect();
        let labels = panel
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(t, v)| classify(*v, &per_period[t]))
                    .collect()
            })
            .collect();
        (labels, Cutoffs::PerPeriod(per_period))
    }
}

fn lag_panel(panel: &[Vec<f64>], w: &Weights) -> Vec<Vec<f64>> {
    let periods = panel.first().map_or(0, Vec::len);
    let lags: Vec<Vec<f64>> = (0..periods).map(|t| w.lag(&column(panel, t))).collect();
    (0..panel.len())
        .map(|r| (0..periods).map(|t| lags[t][r]).collect())
        .collect()
}

struct Discretised {
    y: Vec<Vec<usize>>,
    lag: Vec<Vec<usize>>,
    cutoffs_y: Cutoffs,
    cutoffs_lag: Cutoffs,
}

fn discretise_panel(panel: &[Vec<f64>], w: &Weights, options: &MarkovOptions) -> Discretised {
    let (y, cutoffs_y) = discretise(panel, options.k, options.fixed);
    let (lag, cutoffs_lag) = discretise(&lag_panel(panel, w), options.m, options.fixed);
    Discretised {
        y,
        lag,
        cutoffs_y,
        cutoffs_lag,
    }
}

/// Transition counts per lag class of the origin period.
fn transition_counts(classes: &Discretised, k: usize, m: usize) -> Vec<Counts> {
    let mut counts = vec![vec![vec![0.0; k]; k]; m];
    for (row, lag_row) in classes.y.iter().zip(&classes.lag) {
        for t in 1..row.len() {
            counts[lag_row[t - 1]][row[t - 1]][row[t]] += 1.0;
        }
    }
    counts
}

fn pooled(counts: &[Counts], k: usize) -> Counts {
    let mut total = vec![vec![0.0; k]; k];
    for matrix in counts {
        for (i, row) in matrix.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                total[i][j] += value;
            }
        }
    }
    total
}

fn probabilities(counts: &Counts, fill_empty_classes: bool) -> Vec<Vec<f64>> {
    counts
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                row.iter().map(|v| v / total).collect()
            } else {
                let mut out = vec![0.0; row.len()];
                if fill_empty_classes {
                    out[i] = 1.0;
                }
                out
            }
        })
        .collect()
}

/// Stationary distribution `π = πP`. Chains without a unique solution get the
/// Cesàro average started from the uniform distribution.
pub fn steady_state(p: &[Vec<f64>]) -> Vec<f64> {
    let k = p.len();
    if k == 0 {
        return Vec::new();
    }
    let mut system = Matrix::zeros(k, k);
    for i in 0..k {
        for j in 0..k {
            system[(i, j)] = p[j][i] - if i == j { 1.0 } else { 0.0 };
        }
    }
    for j in 0..k {
        system[(k - 1, j)] = 1.0;
    }
    let mut rhs = vec![0.0; k];
    rhs[k - 1] = 1.0;
    if let Ok(solution) = system.inverse().and_then(|inverse| inverse.mul_vec(&rhs)) {
        if solution.iter().all(|v| v.is_finite() && *v >= -1e-12) {
            return solution.into_iter().map(|v| v.max(0.0)).collect();
        }
    }
    let mut current = vec![1.0 / k as f64; k];
    let mut average = vec![0.0; k];
    for _ in 0..CESARO_STEPS {
        for (acc, v) in average.iter_mut().zip(&current) {
            *acc += v / CESARO_STEPS as f64;
        }
        current = (0..k)
            .map(|j| (0..k).map(|i| current[i] * p[i][j]).sum())
            .collect();
    }
    average
}

/// Chi-squared statistic of `observed` against the row probabilities of `reference`.
fn chi2_against(observed: &Counts, reference: &Counts) -> f64 {
    let mut total = 0.0;
    for (row, reference_row) in observed.iter().zip(reference) {
        let row_total: f64 = row.iter().sum();
        let reference_total: f64 = reference_row.iter().sum();
        let divisor = if reference_total == 0.0 { 1.0 } else { reference_total };
        for (value, reference_value) in row.iter().zip(reference_row) {
            let expected = row_total * reference_value / divisor;
            let difference = value - expected;
            let denominator = if expected == 0.0 { 1.0 } else { expected };
            total += difference * difference / denominator;
        }
    }
    total
}

fn total_x2(counts: &[Counts], k: usize) -> f64 {
    let all = pooled(counts, k);
    counts.iter().map(|matrix| chi2_against(matrix, &all)).sum()
}

/// Homogeneity of the conditional chains: Q, LR and the degrees of freedom
/// `Σᵢ (aᵢ - 1)(bᵢ - 1)`, with `aᵢ` regimes visiting row `i` and `bᵢ`
/// non-zero pooled probabilities in that row.
fn homogeneity(counts: &[Counts], k: usize) -> (f64, f64, usize) {
    let all = pooled(counts, k);
    let p = probabilities(&all, false);
    let mut q = 0.0;
    let mut lr = 0.0;
    let mut dof = 0;
    for i in 0..k {
        let visited = counts
            .iter()
            .filter(|matrix| matrix[i].iter().sum::<f64>() > 0.0)
            .count();
        let nonzero = p[i].iter().filter(|v| **v > 0.0).count();
        dof += visited.saturating_sub(1) * nonzero.saturating_sub(1);
        for matrix in counts {
            let row_total: f64 = matrix[i].iter().sum();
            if row_total == 0.0 {
                continue;
            }
            for j in 0..k {
                let p_regime = matrix[i][j] / row_total;
                if p[i][j] > 0.0 {
                    q += row_total * (p_regime - p[i][j]).powi(2) / p[i][j];
                }
                if matrix[i][j] > 0.0 && p[i][j] > 0.0 {
                    lr += matrix[i][j] * (p_regime / p[i][j]).ln();
                }
            }
        }
    }
    (q, 2.0 * lr, dof)
}

/// Spatial Markov analysis of `panel` (regions × periods, oldest first).
pub fn spatial_markov(
    panel: &[Vec<f64>],
    w: &Weights,
    options: MarkovOptions,
) -> Result<SpatialMarkov, GisError> {
    if options.k < 2 || options.m < 2 {
        return Err(GisError::invalid_input("k and m must both be at least 2"));
    }
    let periods = panel.first().map_or(0, Vec::len);
    if periods < 2 {
        return Err(GisError::invalid_input(
            "value_columns must include at least 2 time steps (wide format).",
        ));
    }
    if panel.len() != w.n() {
        return Err(GisError::statistics(format!(
            "{} regions for weights over {} observations",
            panel.len(),
            w.n()
        )));
    }
    if panel.iter().flatten().any(|v| !v.is_finite()) {
        return Err(GisError::statistics(
            "value columns contain missing values; set drop_na=true",
        ));
    }
    let (k, m) = (options.k, options.m);
    let classes = discretise_panel(panel, w, &options);
    let counts = transition_counts(&classes, k, m);
    let all = pooled(&counts, k);
    let p = probabilities(&all, options.fill_empty_classes);
    let conditional: Vec<Vec<Vec<f64>>> = counts
        .iter()
        .map(|matrix| probabilities(matrix, options.fill_empty_classes))
        .collect();

    let x2 = total_x2(&counts, k);
    let x2_dof = k * (k - 1) * (m - 1);
    let x2_rpvalue = (options.inference.permutations > 0).then(|| {
        let mut rng = options.inference.rng();
        let mut shuffled = panel.to_vec();
        let mut larger = 0usize;
        for _ in 0..options.inference.permutations {
            shuffled.shuffle(&mut rng);
            let simulated = discretise_panel(&shuffled, w, &options);
            if total_x2(&transition_counts(&simulated, k, m), k) >= x2 {
                larger += 1;
            }
        }
        (larger as f64 + 1.0) / (options.inference.permutations as f64 + 1.0)
    });
    let (q, lr, homogeneity_dof) = homogeneity(&counts, k);

    Ok(SpatialMarkov {
        s: steady_state(&p),
        conditional_steady: conditional.iter().map(|matrix| steady_state(matrix)).collect(),
        cutoffs_y: classes.cutoffs_y,
        cutoffs_lag: classes.cutoffs_lag,
        p,
        conditional,
        x2,
        x2_dof,
        x2_pvalue: linalg::chi2_sf(x2, x2_dof as f64),
        x2_rpvalue,
        q,
        q_p_value: linalg::chi2_sf(q, homogeneity_dof as f64),
        lr,
        lr_p_value: linalg::chi2_sf(lr, homogeneity_dof as f64),
    })
}
