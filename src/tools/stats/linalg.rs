//! Small dense matrices for the regression models.

use std::ops::{Index, IndexMut};

use crate::lib::errors::GisError;

const PIVOT_EPSILON: f64 = 1e-12;

/// Row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut out = Self::zeros(size, size);
        for i in 0..size {
            out[(i, i)] = 1.0;
        }
        out
    }

    /// Matrix whose columns are `columns`, which must share a length.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, GisError> {
        let rows = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|column| column.len() != rows) {
            return Err(GisError::statistics("columns differ in length"));
        }
        let mut out = Self::zeros(rows, columns.len());
        for (j, column) in columns.iter().enumerate() {
            for (i, value) in column.iter().enumerate() {
                out[(i, j)] = *value;
            }
        }
        Ok(out)
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self[(i, j)]).collect()
    }

    pub fn columns(&self) -> Vec<Vec<f64>> {
        (0..self.cols).map(|j| self.column(j)).collect()
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self[(i, i)]).collect()
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[(j, i)] = self[(i, j)];
            }
        }
        out
    }

    pub fn matmul(&self, other: &Matrix) -> Result<Matrix, GisError> {
        if self.cols != other.rows {
            return Err(GisError::statistics(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[(i, j)] += a * other[(k, j)];
                }
            }
        }
        Ok(out)
    }

    pub fn mul_vec(&self, vector: &[f64]) -> Result<Vec<f64>, GisError> {
        if self.cols != vector.len() {
            return Err(GisError::statistics(format!(
                "cannot multiply {}x{} by a vector of {}",
                self.rows,
                self.cols,
                vector.len()
            )));
        }
        Ok((0..self.rows)
            .map(|i| (0..self.cols).map(|j| self[(i, j)] * vector[j]).sum())
            .collect())
    }

    /// `selfᵀ · other` without materialising the transpose.
    pub fn cross(&self, other: &Matrix) -> Result<Matrix, GisError> {
        if self.rows != other.rows {
            return Err(GisError::statistics("row counts differ"));
        }
        let mut out = Self::zeros(self.cols, other.cols);
        for r in 0..self.rows {
            for i in 0..self.cols {
                let a = self[(r, i)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[(i, j)] += a * other[(r, j)];
                }
            }
        }
        Ok(out)
    }

    /// `selfᵀ · vector`.
    pub fn cross_vec(&self, vector: &[f64]) -> Result<Vec<f64>, GisError> {
        if self.rows != vector.len() {
            return Err(GisError::statistics("row counts differ"));
        }
        Ok((0..self.cols)
            .map(|j| (0..self.rows).map(|i| self[(i, j)] * vector[i]).sum())
            .collect())
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Gauss-Jordan inverse with partial pivoting.
    pub fn inverse(&self) -> Result<Matrix, GisError> {
        if self.rows != self.cols {
            return Err(GisError::statistics("only square matrices can be inverted"));
        }
        let n = self.rows;
        let mut work = self.clone();
        let mut out = Self::identity(n);
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&a, &b| work[(a, col)].abs().total_cmp(&work[(b, col)].abs()))
                .unwrap_or(col);
            if work[(pivot, col)].abs() < PIVOT_EPSILON {
                return Err(GisError::statistics(
                    "singular matrix; check for collinear or constant variables",
                ));
            }
            work.swap_rows(col, pivot);
            out.swap_rows(col, pivot);
            let scale = work[(col, col)];
            for j in 0..n {
                work[(col, j)] /= scale;
                out[(col, j)] /= scale;
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = work[(row, col)];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    work[(row, j)] -= factor * work[(col, j)];
                    out[(row, j)] -= factor * out[(col, j)];
                }
            }
        }
        Ok(out)
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Squared Pearson correlation.
pub fn squared_correlation(a: &[f64], b: &[f64]) -> f64 {
    let (ma, mb) = (mean(a), mean(b));
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(b) {
        sab += (x - ma) * (y - mb);
        saa += (x - ma).powi(2);
        sbb += (y - mb).powi(2);
    }
    sab * sab / (saa * sbb)
}

/// Upper tail of the standard normal.
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Two-sided normal p-value.
pub fn normal_two_sided(z: f64) -> f64 {
    2.0 * normal_sf(z.abs())
}

/// Complementary error function, accurate to about 1e-14.
fn erfc(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }
    if x < 2.0 {
        return 1.0 - erf_series(x);
    }
    // Continued fraction, evaluated with the modified Lentz method.
    let tiny = 1e-300;
    let mut f = x;
    let mut c = x;
    let mut d = 0.0;
    for n in 1..500 {
        let a = n as f64 / 2.0;
        d = x + a * d;
        d = if d.abs() < tiny { tiny } else { d };
        c = x + a / c;
        c = if c.abs() < tiny { tiny } else { c };
        d = 1.0 / d;
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).abs() < 1e-16 {
            break;
        }
    }
    (-x * x).exp() / (f * std::f64::consts::PI.sqrt())
}

fn erf_series(x: f64) -> f64 {
    let mut term = x;
    let mut sum = x;
    let x2 = x * x;
    for n in 1..200 {
        term *= -x2 / n as f64;
        let add = term / (2 * n + 1) as f64;
        sum += add;
        if add.abs() < 1e-17 {
            break;
        }
    }
    2.0 / std::f64::consts::PI.sqrt() * sum
}

fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized upper incomplete gamma Q(a, x).
fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    let log_prefix = a * x.ln() - x - ln_gamma(a);
    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut denom = a;
        for _ in 0..1000 {
            denom += 1.0;
            term *= x / denom;
            sum += term;
            if term.abs() < sum.abs() * 1e-16 {
                break;
            }
        }
        1.0 - sum * log_prefix.exp()
    } else {
        let tiny = 1e-300;
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / tiny;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..1000 {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            d = if d.abs() < tiny { tiny } else { d };
            c = b + an / c;
            c = if c.abs() < tiny { tiny } else { c };
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < 1e-16 {
                break;
            }
        }
        log_prefix.exp() * h
    }
}

/// Upper tail of the chi-squared distribution.
pub fn chi2_sf(statistic: f64, dof: f64) -> f64 {
    if !(statistic.is_finite() && dof > 0.0) {
        return f64::NAN;
    }
    gamma_q(dof / 2.0, statistic / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        let m = Matrix::from_columns(&[
            vec![4.0, 2.0, 0.0],
            vec![7.0, 6.0, 1.0],
            vec![2.0, 0.0, 3.0],
        ])
        .expect("matrix");
        let product = m.matmul(&m.inverse().expect("invertible")).expect("product");
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(close(product[(i, j)], expected, 1e-12));
            }
        }
    }

    #[test]
    fn singular_matrices_are_reported() {
        let m = Matrix::from_columns(&[vec![1.0, 2.0], vec![2.0, 4.0]]).expect("matrix");
        assert!(matches!(m.inverse(), Err(GisError::Statistics { .. })));
    }

    #[test]
    fn cross_products_match_explicit_transpose() {
        let x = Matrix::from_columns(&[vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]]).expect("x");
        let explicit = x.transpose().matmul(&x).expect("xtx");
        assert_eq!(x.cross(&x).expect("cross"), explicit);
        assert_eq!(x.cross_vec(&[1.0, 0.0, 2.0]).expect("xty"), vec![3.0, 7.0]);
    }

    #[test]
    fn normal_tail_matches_tables() {
        assert!(close(normal_sf(0.0), 0.5, 1e-15));
        assert!(close(normal_sf(1.959_963_984_540_054), 0.025, 1e-12));
        assert!(close(normal_two_sided(-2.575_829_303_548_901), 0.01, 1e-12));
        assert!(close(normal_sf(-1.0), 0.841_344_746_068_542_9, 1e-12));
    }

    #[test]
    fn chi_squared_tail_matches_tables() {
        assert!(close(chi2_sf(3.841_458_820_694_124, 1.0), 0.05, 1e-10));
        assert!(close(chi2_sf(5.991_464_547_107_979, 2.0), 0.05, 1e-10));
        assert!(close(chi2_sf(0.0, 4.0), 1.0, 1e-15));
        assert!(chi2_sf(1.0, 0.0).is_nan());
    }
}
