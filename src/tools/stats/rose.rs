//! Directional (rose) analysis of LISA movement between two periods.

use std::f64::consts::TAU;

use rand::seq::SliceRandom;

use crate::lib::errors::GisError;

use super::{esda::Inference, weights::Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    TwoSided,
    Positive,
    Negative,
}

impl Alternative {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "two.sided" | "two-sided" | "two_sided" => Ok(Self::TwoSided),
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(GisError::invalid_input(format!(
                "Unsupported alternative: {other}. Use 'two.sided', 'positive' or 'negative'."
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TwoSided => "two.sided",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoseInference {
    pub permutations: u32,
    pub alternative: Alternative,
    pub p_values: Vec<f64>,
    pub expected_counts: Vec<f64>,
    pub larger_or_equal: Vec<usize>,
    pub smaller_or_equal: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rose {
    /// Sector boundaries, `k + 1` values from 0 to 2π.
    pub cuts: Vec<f64>,
    pub counts: Vec<usize>,
    /// Movement angle per region in `[0, 2π)`.
    pub theta: Vec<f64>,
    pub r: Vec<f64>,
    pub inference: Option<RoseInference>,
}

fn sector_cuts(k: usize) -> Vec<f64> {
    (0..=k).map(|i| TAU * i as f64 / k as f64).collect()
}

/// Histogram over `cuts`; bins are half-open except the last.
fn histogram(values: &[f64], cuts: &[f64]) -> Vec<usize> {
    let k = cuts.len() - 1;
    let mut counts = vec![0; k];
    for value in values {
        if *value < cuts[0] || *value > cuts[k] {
            continue;
        }
        let bin = cuts[1..]
            .iter()
            .position(|edge| value < edge)
            .unwrap_or(k - 1);
        counts[bin] += 1;
    }
    counts
}

/// Angles and lengths of the movement vectors `(Δy, ΔWy)`.
fn movement(start: &[f64], end: &[f64], w: &Weights) -> (Vec<f64>, Vec<f64>) {
    let lag_start = w.lag(start);
    let lag_end = w.lag(end);
    let mut theta = Vec::with_capacity(start.len());
    let mut r = Vec::with_capacity(start.len());
    for i in 0..start.len() {
        let dx = end[i] - start[i];
        let dy = lag_end[i] - lag_start[i];
        let angle = dy.atan2(dx);
        theta.push(if angle < 0.0 { angle + TAU } else { angle });
        r.push(dx.hypot(dy));
    }
    (theta, r)
}

/// Rose diagram of `k` sectors for regions observed at `start` and `end`.
pub fn rose(
    start: &[f64],
    end: &[f64],
    w: &Weights,
    k: usize,
    inference: Inference,
    alternative: Alternative,
) -> Result<Rose, GisError> {
    if k == 0 {
        return Err(GisError::invalid_input("k must be at least 1"));
    }
    if start.len() != end.len() || start.len() != w.n() {
        return Err(GisError::statistics(format!(
            "{} and {} values for weights over {} observations",
            start.len(),
            end.len(),
            w.n()
        )));
    }
    if start.iter().chain(end).any(|v| !v.is_finite()) {
        return Err(GisError::statistics(
            "value columns contain missing values; set drop_na=true",
        ));
    }
    let cuts = sector_cuts(k);
    let (theta, r) = movement(start, end, w);
    let counts = histogram(&theta, &cuts);

    let inference = (inference.permutations > 0).then(|| {
        let permutations = inference.permutations;
        let mut rng = inference.rng();
        let mut order: Vec<usize> = (0..start.len()).collect();
        let mut larger = vec![0usize; k];
        let mut smaller = vec![0usize; k];
        let mut totals = vec![0.0; k];
        for _ in 0..permutations {
            order.shuffle(&mut rng);
            let s: Vec<f64> = order.iter().map(|&i| start[i]).collect();
            let e: Vec<f64> = order.iter().map(|&i| end[i]).collect();
            let (simulated_theta, _) = movement(&s, &e, w);
            let simulated = histogram(&simulated_theta, &cuts);
            for sector in 0..k {
                totals[sector] += simulated[sector] as f64;
                if simulated[sector] >= counts[sector] {
                    larger[sector] += 1;
                }
                if simulated[sector] <= counts[sector] {
                    smaller[sector] += 1;
                }
            }
        }
        let denominator = permutations as f64 + 1.0;
        let p_values = (0..k)
            .map(|sector| match alternative {
                Alternative::Positive => (larger[sector] as f64 + 1.0) / denominator,
                Alternative::Negative => (smaller[sector] as f64 + 1.0) / denominator,
                Alternative::TwoSided => {
                    let tail = larger[sector].min(smaller[sector]) as f64;
                    (2.0 * (tail + 1.0) / denominator).min(1.0)
                }
            })
            .collect();
        RoseInference {
            permutations,
            alternative,
            p_values,
            expected_counts: totals.iter().map(|t| t / permutations as f64).collect(),
            larger_or_equal: larger,
            smaller_or_equal: smaller,
        }
    });

    Ok(Rose {
        cuts,
        counts,
        theta,
        r,
        inference,
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use serde_json::Value;

    use super::*;
    use crate::tools::stats::weights::{contiguity, tests::grid_polygons, Contiguity, Transform};

    fn rook_grid() -> Weights {
        let cells = grid_polygons();
        let refs: Vec<_> = cells.iter().collect();
        let ids = (0..9).map(Value::from).collect();
        let mut w = contiguity(&refs, Contiguity::Rook, ids).expect("weights");
        w.set_transform(Transform::Row);
        w
    }

    #[test]
    fn uniform_growth_points_north_east() {
        let w = rook_grid();
        let start: Vec<f64> = (0..9).map(f64::from).collect();
        let end: Vec<f64> = start.iter().map(|v| v + 1.0).collect();
        let inference = Inference {
            permutations: 0,
            seed: None,
        };
        let result = rose(&start, &end, &w, 4, inference, Alternative::TwoSided).expect("rose");
        assert_eq!(result.cuts.len(), 5);
        // Δy = ΔWy = 1 puts every vector at π/4.
        assert!(result.theta.iter().all(|t| (t - PI / 4.0).abs() < 1e-9));
        assert_eq!(result.counts, vec![9, 0, 0, 0]);
        assert!(result.r.iter().all(|r| (r - 2f64.sqrt()).abs() < 1e-9));
        assert!(result.inference.is_none());
    }

    #[test]
    fn histogram_closes_the_last_bin() {
        let cuts = sector_cuts(4);
        assert_eq!(histogram(&[0.0, TAU, 1.0, 3.5], &cuts), vec![2, 0, 1, 1]);
    }

    #[test]
    fn permutation_counts_are_bounded() {
        let w = rook_grid();
        let start: Vec<f64> = (0..9).map(f64::from).collect();
        let end = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0];
        let inference = Inference {
            permutations: 49,
            seed: Some(11),
        };
        let result = rose(&start, &end, &w, 4, inference, Alternative::Positive).expect("rose");
        let stats = result.inference.expect("inference");
        assert_eq!(stats.p_values.len(), 4);
        assert!(stats.p_values.iter().all(|p| *p > 0.0 && *p <= 1.0));
        assert!(stats.larger_or_equal.iter().all(|c| *c <= 49));
        let expected: f64 = stats.expected_counts.iter().sum();
        assert!((expected - 9.0).abs() < 1e-9);
        assert!(Alternative::parse("sideways").is_err());
    }
}
