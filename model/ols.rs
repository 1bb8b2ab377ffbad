//! # Ordinary least squares with an intercept
//!
//! The interaction-expanded design is routinely rank deficient: the year basis
//! sums to one (collinear with the intercept), products of splines with
//! disjoint support are identically zero, and the column count can exceed the
//! number of rows. The solver therefore centers the data, solves the centered
//! system through a thin SVD pseudo-inverse, and recovers the intercept from the
//! means. For a full-rank design this is the unique OLS solution; otherwise it
//! is the minimum-norm member of the solution set.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{JobSvd, SVDDC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the fitter reacts to a design without a unique least-squares solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Return the minimum-norm solution.
    #[default]
    MinimumNorm,
    /// Fail with [`FitError::RankDeficient`].
    Reject,
}

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Design matrix has {rows} rows but the target has {targets} values.")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("Cannot fit a model to an empty design matrix.")]
    NoRows,

    #[error("Non-finite values were found in the {0}.")]
    NonFiniteInput(&'static str),

    #[error(
        "Design matrix has rank {rank} but {columns} columns; the least-squares solution is not unique."
    )]
    RankDeficient { rank: usize, columns: usize },

    #[error("Singular value decomposition failed: {0}")]
    Decomposition(#[from] ndarray_linalg::error::LinalgError),

    #[error("Singular value decomposition did not return the requested singular vectors.")]
    MissingSingularVectors,
}

/// The result of a least-squares fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
    rank: usize,
    singular_values: Array1<f64>,
}

impl LinearFit {
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Numerical rank of the centered design.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Singular values of the centered design, in descending order.
    pub fn singular_values(&self) -> ArrayView1<'_, f64> {
        self.singular_values.view()
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    /// Coefficient of determination of the fit on `(x, y)`.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> f64 {
        r_squared(y, self.predict(x).view())
    }
}

/// Fits `y ≈ intercept + x·β` by least squares.
pub fn fit_ols(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    policy: RankPolicy,
) -> Result<LinearFit, FitError> {
    let (n_rows, n_cols) = x.dim();
    if n_rows != y.len() {
        return Err(FitError::ShapeMismatch {
            rows: n_rows,
            targets: y.len(),
        });
    }
    if n_rows == 0 {
        return Err(FitError::NoRows);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteInput("design matrix"));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteInput("target"));
    }

    let y_mean = y.mean().unwrap_or(0.0);
    if n_cols == 0 {
        return Ok(LinearFit {
            coefficients: Array1::zeros(0),
            intercept: y_mean,
            rank: 0,
            singular_values: Array1::zeros(0),
        });
    }

    let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_cols));
    let x_centered = &x - &x_mean;
    let y_centered = &y - y_mean;

    // Thin factors only: U is n x min(n, p), never n x n.
    let (u_opt, singular_values, vt_opt) = x_centered.svddc(JobSvd::Some)?;
    let u = u_opt.ok_or(FitError::MissingSingularVectors)?;
    let vt = vt_opt.ok_or(FitError::MissingSingularVectors)?;

    // Same cutoff as a default numerical rank: max(n, p) * eps * sigma_max.
    let sigma_max = singular_values.iter().fold(0.0_f64, |a, &b| a.max(b));
    let tolerance = n_rows.max(n_cols) as f64 * f64::EPSILON * sigma_max;

    let mut coefficients = Array1::<f64>::zeros(n_cols);
    let mut rank = 0;
    for (k, &sigma) in singular_values.iter().enumerate() {
        if sigma <= tolerance {
            continue;
        }
        rank += 1;
        let weight = u.column(k).dot(&y_centered) / sigma;
        coefficients.scaled_add(weight, &vt.row(k));
    }

    log::debug!(
        "Least-squares solve: {} x {} design, numerical rank {}, tolerance {:.3e}",
        n_rows,
        n_cols,
        rank,
        tolerance
    );

    if rank < n_cols && policy == RankPolicy::Reject {
        return Err(FitError::RankDeficient {
            rank,
            columns: n_cols,
        });
    }

    let intercept = y_mean - x_mean.dot(&coefficients);

    Ok(LinearFit {
        coefficients,
        intercept,
        rank,
        singular_values,
    })
}

/// `1 - SS_res / SS_tot`. A constant target scores 1.0 when predicted exactly
/// and 0.0 otherwise.
pub fn r_squared(y: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let y_mean = y.mean().unwrap_or(0.0);
    let ss_res: f64 = y
        .iter()
        .zip(predicted.iter())
        .map(|(&a, &b)| (a - b).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|&a| (a - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    fn recovers_exact_linear_relationship() {
        // y = 2 + 3 x1 - x2
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0], [3.0, 5.0], [4.0, 1.0]];
        let y = x.column(0).mapv(|v| 3.0 * v) - &x.column(1) + 2.0;

        let fit = fit_ols(x.view(), y.view(), RankPolicy::Reject).unwrap();
        assert_abs_diff_eq!(fit.intercept(), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.coefficients()[0], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.coefficients()[1], -1.0, epsilon = 1e-9);
        assert_eq!(fit.rank(), 2);
        assert_abs_diff_eq!(fit.score(x.view(), y.view()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn matches_normal_equations_for_noisy_full_rank_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 2.9, 4.2, 4.8];
        let fit = fit_ols(x.view(), y.view(), RankPolicy::MinimumNorm).unwrap();

        // Closed form simple regression: slope = cov(x, y) / var(x).
        let slope = (-1.5 * -1.475 + -0.5 * -0.575 + 0.5 * 0.725 + 1.5 * 1.325) / 5.0;
        assert_abs_diff_eq!(fit.coefficients()[0], slope, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept(), 3.475 - slope * 2.5, epsilon = 1e-12);
    }

    #[test]
    fn duplicated_column_splits_weight_evenly() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![2.0, 4.0, 6.0];

        let fit = fit_ols(x.view(), y.view(), RankPolicy::MinimumNorm).unwrap();
        assert_eq!(fit.rank(), 1);
        assert_abs_diff_eq!(fit.coefficients()[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.coefficients()[1], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept(), 0.0, epsilon = 1e-9);

        match fit_ols(x.view(), y.view(), RankPolicy::Reject).unwrap_err() {
            FitError::RankDeficient { rank, columns } => {
                assert_eq!(rank, 1);
                assert_eq!(columns, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn more_columns_than_rows_interpolates() {
        let x = array![[1.0, 0.0, 2.0, 5.0], [0.0, 1.0, 3.0, -1.0], [1.0, 1.0, 0.0, 2.0]];
        let y = array![10.0, 20.0, 15.0];
        let fit = fit_ols(x.view(), y.view(), RankPolicy::MinimumNorm).unwrap();
        let predicted = fit.predict(x.view());
        for (a, b) in predicted.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-8);
        }
    }

    #[test]
    fn tall_designs_use_thin_factors() {
        // 20k rows: a full n x n left factor would need gigabytes.
        let n = 20_000;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 3)) % 97) as f64 + j as f64);
        let y = x.column(0).mapv(|v| 0.5 * v) + &x.column(2).mapv(|v| -2.0 * v) + 7.0;

        let fit = fit_ols(x.view(), y.view(), RankPolicy::Reject).unwrap();
        assert_eq!(fit.rank(), 3);
        assert_eq!(fit.singular_values().len(), 3);
        assert_abs_diff_eq!(fit.coefficients()[0], 0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.coefficients()[1], 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.coefficients()[2], -2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.intercept(), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_bad_inputs() {
        let x = Array2::<f64>::zeros((3, 2));
        assert!(matches!(
            fit_ols(x.view(), array![1.0, 2.0].view(), RankPolicy::MinimumNorm),
            Err(FitError::ShapeMismatch { rows: 3, targets: 2 })
        ));
        assert!(matches!(
            fit_ols(
                x.view(),
                array![1.0, f64::NAN, 2.0].view(),
                RankPolicy::MinimumNorm
            ),
            Err(FitError::NonFiniteInput("target"))
        ));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            fit_ols(empty.view(), array![].view(), RankPolicy::MinimumNorm),
            Err(FitError::NoRows)
        ));
    }

    #[test]
    fn r_squared_edge_cases() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r_squared(y.view(), y.view()), 1.0);
        assert_eq!(r_squared(y.view(), array![3.0, 3.0, 4.0].view()), 0.0);

        let y = array![1.0, 2.0, 3.0];
        let mean_prediction = array![2.0, 2.0, 2.0];
        assert_abs_diff_eq!(r_squared(y.view(), mean_prediction.view()), 0.0);
    }
}
