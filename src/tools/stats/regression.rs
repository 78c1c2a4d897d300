//! Regression with spatial diagnostics: OLS and the spatial two-stage least
//! squares lag model.

use crate::lib::errors::GisError;

use super::{
    linalg::{self, Matrix},
    weights::Weights,
};

const CONSTANT: &str = "const";
const FIXED_POINT_TOLERANCE: f64 = 1e-10;
const FIXED_POINT_ITERATIONS: usize = 10_000;

/// A named regressor column.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OlsFit {
    /// `const` followed by the regressor names.
    pub names: Vec<String>,
    pub betas: Vec<f64>,
    pub std_error: Vec<f64>,
    pub t_stats: Vec<f64>,
    /// `e'e / (n - k)`.
    pub sigma2: f64,
    pub r2: f64,
    pub adj_r2: f64,
    pub residuals: Vec<f64>,
    x: Matrix,
    xtx_inv: Matrix,
}

impl OlsFit {
    pub fn n(&self) -> usize {
        self.x.rows
    }

    pub fn k(&self) -> usize {
        self.x.cols
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialDiagnostics {
    pub moran_residual: f64,
    pub moran_expected: f64,
    pub moran_z: f64,
    pub moran_pvalue: f64,
    /// Statistic and chi-squared p-value.
    pub lm_error: [f64; 2],
    pub lm_lag: [f64; 2],
}

fn require_finite(values: &[f64], message: &str) -> Result<(), GisError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GisError::statistics(message))
    }
}

fn with_constant(
    n: usize,
    columns: impl IntoIterator<Item = Vec<f64>>,
) -> Result<Matrix, GisError> {
    let mut all = vec![vec![1.0; n]];
    all.extend(columns);
    Matrix::from_columns(&all)
}

/// Ordinary least squares with an intercept.
pub fn ols(y: &[f64], regressors: &[Variable]) -> Result<OlsFit, GisError> {
    require_finite(y, "Dependent variable contains NaN or infinite values")?;
    for variable in regressors {
        if variable.values.len() != y.len() {
            return Err(GisError::statistics(format!(
                "'{}' has {} values for {} observations",
                variable.name,
                variable.values.len(),
                y.len()
            )));
        }
        require_finite(
            &variable.values,
            "Independent variables contain NaN or infinite values",
        )?;
    }
    let n = y.len();
    let k = regressors.len() + 1;
    if n <= k {
        return Err(GisError::statistics(format!(
            "{n} observations are not enough to estimate {k} coefficients"
        )));
    }
    let x = with_constant(n, regressors.iter().map(|v| v.values.clone()))?;
    let xtx_inv = x.cross(&x)?.inverse()?;
    let betas = xtx_inv.mul_vec(&x.cross_vec(y)?)?;
    let fitted = x.mul_vec(&betas)?;
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();
    let sse = linalg::dot(&residuals, &residuals);
    let sigma2 = sse / (n - k) as f64;
    let std_error: Vec<f64> = xtx_inv
        .diagonal()
        .iter()
        .map(|d| (d * sigma2).sqrt())
        .collect();
    let t_stats = betas.iter().zip(&std_error).map(|(b, se)| b / se).collect();
    let y_mean = linalg::mean(y);
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r2 = 1.0 - sse / sst;
    let adj_r2 = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n - k) as f64;

    let mut names = vec![CONSTANT.to_string()];
    names.extend(regressors.iter().map(|v| v.name.clone()));
    Ok(OlsFit {
        names,
        betas,
        std_error,
        t_stats,
        sigma2,
        r2,
        adj_r2,
        residuals,
        x,
        xtx_inv,
    })
}

/// Columns of `W·X`.
fn lag_columns(w: &Weights, x: &Matrix) -> Result<Matrix, GisError> {
    let columns: Vec<Vec<f64>> = x.columns().iter().map(|column| w.lag(column)).collect();
    Matrix::from_columns(&columns)
}

fn lag_transposed_columns(w: &Weights, x: &Matrix) -> Result<Matrix, GisError> {
    let columns: Vec<Vec<f64>> = x
        .columns()
        .iter()
        .map(|column| w.lag_transposed(column))
        .collect();
    Matrix::from_columns(&columns)
}

fn trace(m: &Matrix) -> f64 {
    m.diagonal().iter().sum()
}

/// Moran's I of the residuals with its exact normal moments, and the
/// Lagrange multiplier tests for error and lag dependence.
pub fn spatial_diagnostics(
    fit: &OlsFit,
    y: &[f64],
    w: &Weights,
) -> Result<SpatialDiagnostics, GisError> {
    let n = fit.n();
    if w.n() != n {
        return Err(GisError::statistics(format!(
            "the weights cover {} observations but the model has {n}",
            w.n()
        )));
    }
    let s0 = w.s0();
    if s0 == 0.0 {
        return Err(GisError::statistics("the weights have no links"));
    }
    let e = &fit.residuals;
    let ee = linalg::dot(e, e);
    let we = w.lag(e);
    let ewe = linalg::dot(e, &we);
    let scale = n as f64 / s0;
    let moran = scale * ewe / ee;

    // Traces of MW with M = I - X(X'X)⁻¹X', reduced to k×k products.
    let wx = lag_columns(w, &fit.x)?;
    let wtx = lag_transposed_columns(w, &fit.x)?;
    let a = fit.xtx_inv.matmul(&fit.x.cross(&wx)?)?;
    let tr_w: f64 = (0..n).map(|i| w.weight(i, i)).sum();
    let tr_ww: f64 = (0..n)
        .flat_map(|i| {
            w.neighbors[i]
                .iter()
                .zip(&w.weights[i])
                .map(move |(&j, value)| (i, j, *value))
        })
        .map(|(i, j, value)| value * w.weight(j, i))
        .sum();
    let tr_wwt: f64 = w.weights.iter().flatten().map(|v| v * v).sum();
    let tr_mw = tr_w - trace(&a);
    let tr_mwmw =
        tr_ww - 2.0 * trace(&fit.xtx_inv.matmul(&wtx.cross(&wx)?)?) + trace(&a.matmul(&a)?);
    let tr_mwmwt = tr_wwt - trace(&fit.xtx_inv.matmul(&wtx.cross(&wtx)?)?);
    let dof = (n - fit.k()) as f64;
    let expected = scale * tr_mw / dof;
    let second = scale * scale * (tr_mwmwt + tr_mwmw + tr_mw * tr_mw) / (dof * (dof + 2.0));
    let variance = second - expected * expected;
    let moran_z = (moran - expected) / variance.sqrt();

    let t = w.trace_wtw_ww();
    let sig2n = ee / n as f64;
    let lm_error = (ewe / sig2n).powi(2) / t;

    let wy = w.lag(y);
    let fitted = fit.x.mul_vec(&fit.betas)?;
    let wxb = w.lag(&fitted);
    let projected = fit.xtx_inv.mul_vec(&fit.x.cross_vec(&wxb)?)?;
    let wxb_m_wxb = linalg::dot(&wxb, &wxb) - linalg::dot(&fit.x.cross_vec(&wxb)?, &projected);
    let lm_lag = (linalg::dot(e, &wy) / sig2n).powi(2) / (wxb_m_wxb / sig2n + t);

    Ok(SpatialDiagnostics {
        moran_residual: moran,
        moran_expected: expected,
        moran_z,
        moran_pvalue: linalg::normal_two_sided(moran_z),
        lm_error: [lm_error, linalg::chi2_sf(lm_error, 1.0)],
        lm_lag: [lm_lag, linalg::chi2_sf(lm_lag, 1.0)],
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Robust {
    #[default]
    None,
    White,
}

impl Robust {
    pub fn parse(raw: Option<&str>) -> Result<Self, GisError> {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("none") => Ok(Self::None),
            Some("white") => Ok(Self::White),
            Some(other) => Err(GisError::invalid_input(format!(
                "Unsupported robust option: {other}. Use 'none' or 'white'."
            ))),
        }
    }
}

/// Inputs of the spatial lag model.
#[derive(Debug, Clone)]
pub struct LagSpec {
    pub y: Variable,
    pub x: Vec<Variable>,
    pub yend: Vec<Variable>,
    pub q: Vec<Variable>,
    pub w_lags: usize,
    pub lag_q: bool,
    pub robust: Robust,
    pub spat_diag: bool,
    /// Divide the residual variance by `n - k` instead of `n`.
    pub sig2n_k: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LagFit {
    /// `const`, exogenous, endogenous, then `W_y`.
    pub names: Vec<String>,
    pub betas: Vec<f64>,
    pub std_err: Vec<f64>,
    /// z statistic and two-sided p-value per coefficient.
    pub z_stats: Vec<(f64, f64)>,
    pub pseudo_r2: f64,
    /// Pseudo R² of the reduced form, when it exists.
    pub pseudo_r2_reduced: Option<f64>,
    pub sig2: f64,
    pub ssr: f64,
    pub ak_test: Option<[f64; 2]>,
    pub predy: Vec<f64>,
}

impl LagFit {
    pub fn n(&self) -> usize {
        self.predy.len()
    }

    pub fn rho(&self) -> f64 {
        self.betas.last().copied().unwrap_or(f64::NAN)
    }
}

fn check_variables(n: usize, variables: &[Variable]) -> Result<(), GisError> {
    for variable in variables {
        if variable.values.len() != n {
            return Err(GisError::statistics(format!(
                "'{}' has {} values for {n} observations",
                variable.name,
                variable.values.len()
            )));
        }
        require_finite(
            &variable.values,
            &format!("'{}' contains NaN or infinite values", variable.name),
        )?;
    }
    Ok(())
}

/// Spatial lags `W·v, W²·v, …` up to `order`.
fn spatial_lags(w: &Weights, variables: &[Variable], order: usize) -> Vec<Vec<f64>> {
    let mut out = Vec::new();
    for variable in variables {
        let mut current = variable.values.clone();
        for _ in 0..order {
            current = w.lag(&current);
            out.push(current.clone());
        }
    }
    out
}

/// Spatial two-stage least squares with `W·y` instrumented by lags of the
/// exogenous variables.
pub fn gm_lag(spec: &LagSpec, w: &Weights) -> Result<LagFit, GisError> {
    let n = spec.y.values.len();
    require_finite(&spec.y.values, "Dependent variable contains NaN or infinite values")?;
    check_variables(n, &spec.x)?;
    check_variables(n, &spec.yend)?;
    check_variables(n, &spec.q)?;
    if !spec.yend.is_empty() && spec.q.is_empty() {
        return Err(GisError::invalid_input(
            "q_cols are required when yend_cols are given",
        ));
    }
    if spec.w_lags == 0 {
        return Err(GisError::invalid_input("w_lags must be at least 1"));
    }
    if w.n() != n {
        return Err(GisError::statistics(format!(
            "the weights cover {} observations but the model has {n}",
            w.n()
        )));
    }

    let y = &spec.y.values;
    let wy = w.lag(y);
    let exogenous: Vec<Vec<f64>> = spec.x.iter().map(|v| v.values.clone()).collect();
    let mut z_columns = exogenous.clone();
    z_columns.extend(spec.yend.iter().map(|v| v.values.clone()));
    z_columns.push(wy.clone());
    let z = with_constant(n, z_columns)?;

    let mut h_columns = exogenous;
    h_columns.extend(spec.q.iter().map(|v| v.values.clone()));
    h_columns.extend(spatial_lags(w, &spec.x, spec.w_lags));
    if spec.lag_q {
        h_columns.extend(spatial_lags(w, &spec.q, spec.w_lags));
    }
    let h = with_constant(n, h_columns)?;
    let k = z.cols;
    if h.cols < k {
        return Err(GisError::statistics("the model is underidentified"));
    }
    if n <= k {
        return Err(GisError::statistics(format!(
            "{n} observations are not enough to estimate {k} coefficients"
        )));
    }

    let hth_inv = h.cross(&h)?.inverse()?;
    let zth = z.cross(&h)?;
    let factor = zth.matmul(&hth_inv)?;
    let varb = factor.matmul(&zth.transpose())?.inverse()?;
    let betas = varb.mul_vec(&factor.mul_vec(&h.cross_vec(y)?)?)?;
    let predy = z.mul_vec(&betas)?;
    let u: Vec<f64> = y.iter().zip(&predy).map(|(a, b)| a - b).collect();
    let ssr = linalg::dot(&u, &u);
    let sig2n = ssr / n as f64;
    let sig2 = if spec.sig2n_k { ssr / (n - k) as f64 } else { sig2n };

    let vm = match spec.robust {
        Robust::None => varb.scale(sig2),
        Robust::White => {
            let mut meat = Matrix::zeros(h.cols, h.cols);
            for r in 0..n {
                let u2 = u[r] * u[r];
                for a in 0..h.cols {
                    for b in 0..h.cols {
                        meat[(a, b)] += u2 * h[(r, a)] * h[(r, b)];
                    }
                }
            }
            let sandwich = factor.matmul(&meat)?.matmul(&factor.transpose())?;
            varb.matmul(&sandwich)?.matmul(&varb)?
        }
    };
    let std_err: Vec<f64> = vm.diagonal().iter().map(|v| v.sqrt()).collect();
    let z_stats = betas
        .iter()
        .zip(&std_err)
        .map(|(b, se)| {
            let z = b / se;
            (z, linalg::normal_two_sided(z))
        })
        .collect();

    let pseudo_r2 = linalg::squared_correlation(y, &predy);
    let rho = betas[k - 1];
    let pseudo_r2_reduced = reduced_form(w, &predy, &wy, rho)
        .map(|predy_e| linalg::squared_correlation(y, &predy_e));

    let ak_test = if spec.spat_diag {
        Some(anselin_kelejian(w, &z, &varb, &u, sig2n)?)
    } else {
        None
    };

    let mut names = vec![CONSTANT.to_string()];
    names.extend(spec.x.iter().map(|v| v.name.clone()));
    names.extend(spec.yend.iter().map(|v| v.name.clone()));
    names.push("W_y".to_string());
    Ok(LagFit {
        names,
        betas,
        std_err,
        z_stats,
        pseudo_r2,
        pseudo_r2_reduced,
        sig2,
        ssr,
        ak_test,
        predy,
    })
}

/// Anselin-Kelejian residual autocorrelation test for 2SLS: statistic and
/// chi-squared(1) p-value. `varb` is the unscaled coefficient covariance.
fn anselin_kelejian(
    w: &Weights,
    z: &Matrix,
    varb: &Matrix,
    u: &[f64],
    sig2n: f64,
) -> Result<[f64; 2], GisError> {
    let n = u.len() as f64;
    let s0 = w.s0();
    let mi = n * linalg::dot(u, &w.lag(u)) / (s0 * linalg::dot(u, u));
    // u'WZ, taken as Z'(W'u)
    let etwz = z.cross_vec(&w.lag_transposed(u))?;
    let a = linalg::dot(&etwz, &varb.mul_vec(&etwz)?);
    let phi2 = (w.trace_wtw_ww() + 4.0 / sig2n * a) / ((s0 / n).powi(2) * n);
    let ak = n * mi * mi / phi2;
    Ok([ak, linalg::chi2_sf(ak, 1.0)])
}

/// `(I - ρW)⁻¹ (ŷ - ρWy)` by fixed-point iteration; `None` when `|ρ| ≥ 1`
/// or the iteration does not settle.
fn reduced_form(w: &Weights, predy: &[f64], wy: &[f64], rho: f64) -> Option<Vec<f64>> {
    if !(rho.abs() < 1.0) {
        return None;
    }
    let base: Vec<f64> = predy.iter().zip(wy).map(|(p, l)| p - rho * l).collect();
    let mut current = base.clone();
    for _ in 0..FIXED_POINT_ITERATIONS {
        let next: Vec<f64> = base
            .iter()
            .zip(w.lag(&current))
            .map(|(b, l)| b + rho * l)
            .collect();
        let change = next
            .iter()
            .zip(&current)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        current = next;
        if change < FIXED_POINT_TOLERANCE {
            return Some(current);
        }
    }
    None
}

#[cfg(test)]
mod tests {
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
    fn ols_recovers_an_exact_line() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let noise = [0.1, -0.1, 0.05, -0.05, 0.02, -0.02];
        let y: Vec<f64> = x.iter().zip(noise).map(|(v, e)| 2.0 + 3.0 * v + e).collect();
        let fit = ols(&y, &[Variable::new("x", x)]).expect("fit");
        assert_eq!(fit.names, vec!["const", "x"]);
        assert!((fit.betas[1] - 3.0).abs() < 0.05);
        assert!((fit.betas[0] - 2.0).abs() < 0.2);
        assert!(fit.r2 > 0.99);
        assert!(fit.adj_r2 <= fit.r2);
        assert_eq!(fit.std_error.len(), 2);
    }

    #[test]
    fn ols_rejects_non_finite_and_collinear_inputs() {
        let y = vec![1.0, f64::NAN, 3.0, 4.0];
        let err = ols(&y, &[Variable::new("x", vec![1.0, 2.0, 3.0, 4.0])]).unwrap_err();
        assert!(err.to_string().contains("Dependent variable"));

        let y = vec![1.0, 2.0, 3.0, 5.0];
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let doubled = x.iter().map(|v| v * 2.0).collect();
        assert!(ols(&y, &[Variable::new("a", x), Variable::new("b", doubled)]).is_err());
    }

    #[test]
    fn diagnostics_flag_spatially_clustered_residuals() {
        let w = rook_grid();
        let x = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0, 2.0, 7.0, 1.0];
        // Residual pattern rises with the grid row.
        let bump = [-2.0, -2.0, -2.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0];
        let y: Vec<f64> = x.iter().zip(bump).map(|(v, b)| 1.0 + 0.5 * v + b).collect();
        let fit = ols(&y, &[Variable::new("x", x)]).expect("fit");
        let diag = spatial_diagnostics(&fit, &y, &w).expect("diagnostics");
        assert!(diag.moran_residual > 0.0);
        assert!(diag.moran_expected < 0.0);
        assert!(diag.moran_z > 0.0);
        assert!(diag.lm_error[0] > 0.0);
        assert!((0.0..=1.0).contains(&diag.lm_error[1]));
        assert!((0.0..=1.0).contains(&diag.lm_lag[1]));
    }

    #[test]
    fn gm_lag_reports_rho_last_and_a_reduced_form() {
        let w = rook_grid();
        let x = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0, 2.0, 7.0, 1.5];
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 2.0 + 1.5 * v + 0.3 * (i / 3) as f64)
            .collect();
        let spec = LagSpec {
            y: Variable::new("y", y),
            x: vec![Variable::new("x", x)],
            yend: Vec::new(),
            q: Vec::new(),
            w_lags: 2,
            lag_q: true,
            robust: Robust::White,
            spat_diag: true,
            sig2n_k: false,
        };
        let fit = gm_lag(&spec, &w).expect("fit");
        assert_eq!(fit.names, vec!["const", "x", "W_y"]);
        assert_eq!(fit.betas.len(), 3);
        assert_eq!(fit.z_stats.len(), 3);
        assert!(fit.pseudo_r2 > 0.8);
        assert!(fit.ak_test.is_some());
        assert_eq!(fit.n(), 9);
    }

    fn dense(w: &Weights) -> Vec<Vec<f64>> {
        (0..w.n()).map(|i| (0..w.n()).map(|j| w.weight(i, j)).collect()).collect()
    }

    fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
        m.iter().map(|row| linalg::dot(row, v)).collect()
    }

    /// `I - X(X'X)⁻¹X'` for a constant plus one regressor.
    fn residual_maker(x: &[f64]) -> Vec<Vec<f64>> {
        let n = x.len() as f64;
        let sx: f64 = x.iter().sum();
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        let det = n * sxx - sx * sx;
        let inv = [[sxx / det, -sx / det], [-sx / det, n / det]];
        (0..x.len())
            .map(|i| {
                (0..x.len())
                    .map(|j| {
                        let (ri, rj) = ([1.0, x[i]], [1.0, x[j]]);
                        let mut h = 0.0;
                        for a in 0..2 {
                            for b in 0..2 {
                                h += ri[a] * inv[a][b] * rj[b];
                            }
                        }
                        f64::from(u8::from(i == j)) - h
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn diagnostics_match_dense_matrix_formulas() {
        let w = rook_grid();
        let x = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0, 2.0, 7.0, 1.0];
        let y = vec![2.1, 2.5, 1.0, 4.2, 3.3, 5.8, 4.9, 7.5, 3.6];
        let fit = ols(&y, &[Variable::new("x", x.clone())]).expect("fit");
        let diag = spatial_diagnostics(&fit, &y, &w).expect("diagnostics");

        let n = 9.0;
        let wd = dense(&w);
        let m = residual_maker(&x);
        let e = mat_vec(&m, &y);
        for (a, b) in e.iter().zip(&fit.residuals) {
            assert!((a - b).abs() < 1e-9);
        }
        let ee = linalg::dot(&e, &e);
        let we = mat_vec(&wd, &e);
        let s0 = w.s0();
        let moran = n / s0 * linalg::dot(&e, &we) / ee;
        assert!((diag.moran_residual - moran).abs() < 1e-9);

        let tr_mw: f64 = (0..9).map(|i| (0..9).map(|j| m[i][j] * wd[j][i]).sum::<f64>()).sum();
        assert!((diag.moran_expected - n / s0 * tr_mw / 7.0).abs() < 1e-9);

        let mut t = 0.0;
        for i in 0..9 {
            for j in 0..9 {
                t += wd[j][i] * wd[j][i] + wd[i][j] * wd[j][i];
            }
        }
        let sig2n = ee / n;
        let lm_error = (linalg::dot(&e, &we) / sig2n).powi(2) / t;
        assert!((diag.lm_error[0] - lm_error).abs() < 1e-9 * lm_error.max(1.0));

        let fitted: Vec<f64> = y.iter().zip(&e).map(|(a, b)| a - b).collect();
        let wxb = mat_vec(&wd, &fitted);
        let quad = linalg::dot(&wxb, &mat_vec(&m, &wxb));
        let ewy = linalg::dot(&e, &mat_vec(&wd, &y));
        let lm_lag = (ewy / sig2n).powi(2) / (quad / sig2n + t);
        assert!((diag.lm_lag[0] - lm_lag).abs() < 1e-9 * lm_lag.max(1.0));
    }

    #[test]
    fn anselin_kelejian_uses_the_transposed_lag() {
        // Row-standardised path 0-1-2, so W is not symmetric.
        let w = Weights::new(
            (0..3).map(Value::from).collect(),
            vec![vec![1], vec![0, 2], vec![1]],
            vec![vec![1.0], vec![0.5, 0.5], vec![1.0]],
        )
        .expect("weights");
        let u = [1.0, 2.0, -3.0];
        let z = Matrix::from_columns(&[vec![1.0, 0.0, 0.0]]).expect("z");
        let varb = Matrix::identity(1);
        let sig2n = 14.0 / 3.0;
        let [ak, p] = anselin_kelejian(&w, &z, &varb, &u, sig2n).expect("ak");
        // u'WZ = 1, tr(W'W + WW) = 4.5, I = -3/7.
        assert!((ak - 378.0 / 1225.0).abs() < 1e-12, "ak = {ak}");
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn gm_lag_needs_instruments_for_endogenous_variables() {
        let w = rook_grid();
        let values: Vec<f64> = (0..9).map(f64::from).collect();
        let spec = LagSpec {
            y: Variable::new("y", values.clone()),
            x: vec![Variable::new("x", values.iter().map(|v| v * v).collect())],
            yend: vec![Variable::new("e", values)],
            q: Vec::new(),
            w_lags: 1,
            lag_q: true,
            robust: Robust::None,
            spat_diag: false,
            sig2n_k: false,
        };
        assert!(gm_lag(&spec, &w).is_err());
        assert_eq!(Robust::parse(Some("WHITE")).expect("robust"), Robust::White);
        assert!(Robust::parse(Some("hac")).is_err());
    }

    #[test]
    fn reduced_form_solves_the_lag_system() {
        let w = rook_grid();
        let predy: Vec<f64> = (0..9).map(f64::from).collect();
        let wy = w.lag(&predy);
        let solved = reduced_form(&w, &predy, &wy, 0.4).expect("converges");
        // x = base + ρWx must hold at the solution.
        let lag = w.lag(&solved);
        for i in 0..9 {
            let base = predy[i] - 0.4 * wy[i];
            assert!((solved[i] - base - 0.4 * lag[i]).abs() < 1e-8);
        }
        assert!(reduced_form(&w, &predy, &wy, 1.0).is_none());
    }
}
