//! Exploratory spatial data analysis: global and local autocorrelation.
//!
//! Inference is by random permutation. Global statistics shuffle the whole
//! variable; local statistics use conditional randomization, redrawing each
//! observation's neighbours from the other observations while it stays fixed.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{lib::errors::GisError, server::config::StatisticsSection};

use super::{linalg, weights::Weights};

/// Permutation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub permutations: u32,
    pub seed: Option<u64>,
}

impl Inference {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl From<&StatisticsSection> for Inference {
    fn from(section: &StatisticsSection) -> Self {
        Self {
            permutations: section.permutations,
            seed: section.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStatistic {
    pub value: f64,
    /// Pseudo p-value, folded towards the nearer tail.
    pub p_sim: Option<f64>,
    pub z_sim: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalStatistic {
    pub values: Vec<f64>,
    pub p_sim: Vec<Option<f64>>,
    pub z_sim: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCounts {
    pub bb: f64,
    pub bw: f64,
    pub ww: f64,
    /// Total number of joins.
    pub j: f64,
    pub expected: Option<f64>,
    pub variance: Option<f64>,
    pub z_score: Option<f64>,
    pub p_value: Option<f64>,
}

fn check_inputs(y: &[f64], w: &Weights) -> Result<(), GisError> {
    if y.len() != w.n() {
        return Err(GisError::statistics(format!(
            "{} values for {} observations",
            y.len(),
            w.n()
        )));
    }
    if y.len() < 3 {
        return Err(GisError::statistics("at least three observations are required"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(GisError::statistics(
            "the variable contains missing or non-numeric values",
        ));
    }
    if w.s0() == 0.0 {
        return Err(GisError::statistics(
            "the weights have no links; increase distance_threshold",
        ));
    }
    Ok(())
}

fn deviations(y: &[f64]) -> Result<(Vec<f64>, f64), GisError> {
    let mean = linalg::mean(y);
    let z: Vec<f64> = y.iter().map(|v| v - mean).collect();
    let ss = linalg::dot(&z, &z);
    if ss == 0.0 {
        return Err(GisError::statistics("the variable is constant"));
    }
    Ok((z, ss))
}

/// `Σᵢ Σⱼ wᵢⱼ aᵢ bⱼ`.
fn cross_product(w: &Weights, a: &[f64], b: &[f64]) -> f64 {
    linalg::dot(a, &w.lag(b))
}

pub(crate) fn folded_p(observed: f64, simulated: &[f64]) -> f64 {
    let permutations = simulated.len();
    let mut larger = simulated.iter().filter(|&&s| s >= observed).count();
    if permutations - larger < larger {
        larger = permutations - larger;
    }
    (larger as f64 + 1.0) / (permutations as f64 + 1.0)
}

pub(crate) fn z_from(observed: f64, simulated: &[f64]) -> Option<f64> {
    let sd = linalg::std_dev(simulated);
    let z = (observed - linalg::mean(simulated)) / sd;
    z.is_finite().then_some(z)
}

fn global_inference(
    y: &[f64],
    value: f64,
    inference: Inference,
    statistic: impl Fn(&[f64]) -> f64,
) -> GlobalStatistic {
    if inference.permutations == 0 {
        return GlobalStatistic {
            value,
            p_sim: None,
            z_sim: None,
        };
    }
    let mut rng = inference.rng();
    let mut shuffled = y.to_vec();
    let simulated: Vec<f64> = (0..inference.permutations)
        .map(|_| {
            shuffled.shuffle(&mut rng);
            statistic(&shuffled)
        })
        .collect();
    GlobalStatistic {
        value,
        p_sim: Some(folded_p(value, &simulated)),
        z_sim: z_from(value, &simulated),
    }
}

/// Moran's I and its expectation under no autocorrelation.
pub fn moran(
    y: &[f64],
    w: &Weights,
    inference: Inference,
) -> Result<(GlobalStatistic, f64), GisError> {
    check_inputs(y, w)?;
    let (z, ss) = deviations(y)?;
    let n = y.len() as f64;
    let s0 = w.s0();
    let statistic = |values: &[f64]| n / s0 * cross_product(w, values, values) / ss;
    let value = statistic(&z);
    let expected = -1.0 / (n - 1.0);
    Ok((global_inference(&z, value, inference, statistic), expected))
}

/// Geary's C.
pub fn geary(y: &[f64], w: &Weights, inference: Inference) -> Result<GlobalStatistic, GisError> {
    check_inputs(y, w)?;
    let (_, ss) = deviations(y)?;
    let n = y.len() as f64;
    let s0 = w.s0();
    let statistic = |values: &[f64]| {
        let mut total = 0.0;
        for (i, (links, weights)) in w.neighbors.iter().zip(&w.weights).enumerate() {
            for (&j, wij) in links.iter().zip(weights) {
                total += wij * (values[i] - values[j]).powi(2);
            }
        }
        (n - 1.0) * total / (2.0 * s0 * ss)
    };
    let value = statistic(y);
    Ok(global_inference(y, value, inference, statistic))
}

/// Gamma index with the cross-product similarity `Σ wᵢⱼ yᵢ yⱼ`.
pub fn gamma(y: &[f64], w: &Weights, inference: Inference) -> Result<GlobalStatistic, GisError> {
    check_inputs(y, w)?;
    let statistic = |values: &[f64]| cross_product(w, values, values);
    let value = statistic(y);
    Ok(global_inference(y, value, inference, statistic))
}

/// Getis-Ord general G.
pub fn getis_ord(
    y: &[f64],
    w: &Weights,
    inference: Inference,
) -> Result<GlobalStatistic, GisError> {
    check_inputs(y, w)?;
    let total: f64 = y.iter().sum();
    let squares = linalg::dot(y, y);
    let denominator = total * total - squares;
    if denominator == 0.0 {
        return Err(GisError::statistics(
            "general G is undefined for this variable",
        ));
    }
    let statistic = |values: &[f64]| cross_product(w, values, values) / denominator;
    let value = statistic(y);
    Ok(global_inference(y, value, inference, statistic))
}

/// Simulated local values for every observation by conditional randomization.
fn local_inference(
    observed: &[f64],
    w: &Weights,
    inference: Inference,
    simulate: impl Fn(usize, &[usize]) -> f64,
) -> LocalStatistic {
    let n = observed.len();
    if inference.permutations == 0 {
        return LocalStatistic {
            values: observed.to_vec(),
            p_sim: vec![None; n],
            z_sim: vec![None; n],
        };
    }
    let mut rng = inference.rng();
    let mut p_sim = Vec::with_capacity(n);
    let mut z_sim = Vec::with_capacity(n);
    for i in 0..n {
        let k = w.cardinality(i);
        if k == 0 {
            p_sim.push(None);
            z_sim.push(None);
            continue;
        }
        let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        let simulated: Vec<f64> = (0..inference.permutations)
            .map(|_| {
                let (drawn, _) = others.partial_shuffle(&mut rng, k);
                simulate(i, drawn)
            })
            .collect();
        p_sim.push(Some(folded_p(observed[i], &simulated)));
        z_sim.push(z_from(observed[i], &simulated));
    }
    LocalStatistic {
        values: observed.to_vec(),
        p_sim,
        z_sim,
    }
}

fn drawn_lag(w: &Weights, i: usize, drawn: &[usize], values: &[f64]) -> f64 {
    drawn
        .iter()
        .zip(&w.weights[i])
        .map(|(&j, wij)| wij * values[j])
        .sum()
}

/// Local Moran's I with scatterplot quadrants (1 HH, 2 LH, 3 LL, 4 HL).
pub fn moran_local(
    y: &[f64],
    w: &Weights,
    inference: Inference,
) -> Result<(LocalStatistic, Vec<u8>), GisError> {
    check_inputs(y, w)?;
    let sd = linalg::std_dev(y);
    if sd == 0.0 {
        return Err(GisError::statistics("the variable is constant"));
    }
    let mean = linalg::mean(y);
    let z: Vec<f64> = y.iter().map(|v| (v - mean) / sd).collect();
    let n_1 = y.len() as f64 - 1.0;
    let den = linalg::dot(&z, &z);
    let lag = w.lag(&z);
    let observed: Vec<f64> = z
        .iter()
        .zip(&lag)
        .map(|(zi, li)| n_1 * zi * li / den)
        .collect();
    let quadrants = z
        .iter()
        .zip(&lag)
        .map(|(&zi, &li)| match (zi > 0.0, li > 0.0) {
            (true, true) => 1,
            (false, true) => 2,
            (false, false) => 3,
            (true, false) => 4,
        })
        .collect();
    let local = local_inference(&observed, w, inference, |i, drawn| {
        n_1 * z[i] * drawn_lag(w, i, drawn, &z) / den
    });
    Ok((local, quadrants))
}

/// Local Getis-Ord G, excluding each observation from its own sum.
pub fn getis_ord_local(
    y: &[f64],
    w: &Weights,
    inference: Inference,
) -> Result<LocalStatistic, GisError> {
    check_inputs(y, w)?;
    let total: f64 = y.iter().sum();
    let others: Vec<f64> = y.iter().map(|v| total - v).collect();
    if others.iter().any(|v| *v == 0.0) {
        return Err(GisError::statistics(
            "local G is undefined when one observation holds the whole total",
        ));
    }
    let lag = w.lag(y);
    let observed: Vec<f64> = lag.iter().zip(&others).map(|(l, d)| l / d).collect();
    Ok(local_inference(&observed, w, inference, |i, drawn| {
        drawn_lag(w, i, drawn, y) / others[i]
    }))
}

fn require_binary(y: &[f64]) -> Result<(), GisError> {
    if y.iter().all(|v| *v == 0.0 || *v == 1.0) {
        Ok(())
    } else {
        Err(GisError::statistics(
            "join counts need a binary variable coded 0/1",
        ))
    }
}

fn binary_view(w: &Weights) -> Weights {
    let mut binary = w.clone();
    binary.set_transform(super::weights::Transform::Binary);
    binary
}

/// Global join counts on the binary view of `w`.
pub fn join_counts(y: &[f64], w: &Weights, inference: Inference) -> Result<JoinCounts, GisError> {
    check_inputs(y, w)?;
    require_binary(y)?;
    let b = binary_view(w);
    let bb_of = |values: &[f64]| 0.5 * cross_product(&b, values, values);
    let white: Vec<f64> = y.iter().map(|v| 1.0 - v).collect();
    let bb = bb_of(y);
    let ww = bb_of(&white);
    let j = b.s0() / 2.0;
    let bw = j - bb - ww;
    let (expected, variance, z_score, p_value) = if inference.permutations == 0 {
        (None, None, None, None)
    } else {
        let mut rng = inference.rng();
        let mut shuffled = y.to_vec();
        let simulated: Vec<f64> = (0..inference.permutations)
            .map(|_| {
                shuffled.shuffle(&mut rng);
                bb_of(&shuffled)
            })
            .collect();
        let mean = linalg::mean(&simulated);
        let variance = linalg::std_dev(&simulated).powi(2);
        (
            Some(mean),
            Some(variance),
            z_from(bb, &simulated),
            Some(folded_p(bb, &simulated)),
        )
    };
    Ok(JoinCounts {
        bb,
        bw,
        ww,
        j,
        expected,
        variance,
        z_score,
        p_value,
    })
}

/// Local join counts: `yᵢ Σⱼ bᵢⱼ yⱼ` on the binary view of `w`.
pub fn join_counts_local(y: &[f64], w: &Weights) -> Result<Vec<f64>, GisError> {
    check_inputs(y, w)?;
    require_binary(y)?;
    let lag = binary_view(w).lag(y);
    Ok(y.iter().zip(lag).map(|(v, l)| v * l).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::tools::stats::weights::{self, Contiguity, Transform};

    fn rook_grid() -> Weights {
        let cells = weights::tests::grid_polygons();
        let refs: Vec<_> = cells.iter().collect();
        let ids = (0..9).map(Value::from).collect();
        let mut w = weights::contiguity(&refs, Contiguity::Rook, ids).expect("rook");
        w.set_transform(Transform::Row);
        w
    }

    fn seeded(permutations: u32) -> Inference {
        Inference {
            permutations,
            seed: Some(7),
        }
    }

    // Rows of the grid run bottom to top; values increase upwards.
    const GRADIENT: [f64; 9] = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0];
    const CHECKERBOARD: [f64; 9] = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

    #[test]
    fn smooth_surfaces_have_positive_moran() {
        let (stat, expected) = moran(&GRADIENT, &rook_grid(), seeded(199)).expect("moran");
        assert!(stat.value > 0.3, "I = {}", stat.value);
        assert_eq!(expected, -0.125);
        assert!(stat.p_sim.expect("p") < 0.05);
    }

    #[test]
    fn checkerboards_are_negatively_autocorrelated() {
        let w = rook_grid();
        let (stat, _) = moran(&CHECKERBOARD, &w, seeded(0)).expect("moran");
        assert!((stat.value + 1.0).abs() < 1e-12);
        assert!(stat.p_sim.is_none());
        let c = geary(&CHECKERBOARD, &w, seeded(0)).expect("geary");
        assert!(c.value > 1.0);
    }

    #[test]
    fn seeded_inference_is_reproducible() {
        let w = rook_grid();
        let a = geary(&GRADIENT, &w, seeded(99)).expect("geary");
        let b = geary(&GRADIENT, &w, seeded(99)).expect("geary");
        assert_eq!(a, b);
    }

    #[test]
    fn general_g_and_gamma_use_cross_products() {
        let w = rook_grid();
        let g = getis_ord(&GRADIENT, &w, seeded(0)).expect("g");
        let total: f64 = GRADIENT.iter().sum();
        let squares: f64 = GRADIENT.iter().map(|v| v * v).sum();
        let cross: f64 = linalg::dot(&GRADIENT, &w.lag(&GRADIENT));
        assert!((g.value - cross / (total * total - squares)).abs() < 1e-12);
        let gamma = gamma(&GRADIENT, &w, seeded(0)).expect("gamma");
        assert!((gamma.value - cross).abs() < 1e-12);
    }

    #[test]
    fn local_moran_marks_quadrants() {
        let (local, quadrants) = moran_local(&GRADIENT, &rook_grid(), seeded(99)).expect("lisa");
        assert_eq!(quadrants[0], 3);
        assert_eq!(quadrants[8], 1);
        assert!(local.values[0] > 0.0);
        assert_eq!(local.p_sim.len(), 9);
        assert!(local.p_sim.iter().all(|p| p.is_some()));
    }

    #[test]
    fn local_g_divides_by_the_other_values() {
        let w = rook_grid();
        let local = getis_ord_local(&GRADIENT, &w, seeded(0)).expect("g local");
        let total: f64 = GRADIENT.iter().sum();
        assert!((local.values[0] - 1.5 / (total - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn join_counts_partition_every_join() {
        let w = rook_grid();
        let counts = join_counts(&CHECKERBOARD, &w, seeded(99)).expect("joins");
        assert_eq!(counts.j, 12.0);
        assert_eq!(counts.bb, 0.0);
        assert_eq!(counts.ww, 0.0);
        assert_eq!(counts.bw, 12.0);
        assert!(counts.expected.is_some());

        let local = join_counts_local(&CHECKERBOARD, &w).expect("local");
        assert!(local.iter().all(|v| *v == 0.0));
        assert!(join_counts(&GRADIENT, &w, seeded(0)).is_err());
    }
}
