use ndarray::{Array, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Defines the strategy for placing the knots of the year-trend spline.
/// This is part of the public configuration and is echoed in training reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnotStrategy {
    /// Place knots uniformly between the minimum and maximum of the training data.
    #[default]
    Uniform,
    /// Place knots at evenly spaced quantiles of the training data.
    /// The first and last knots are still the minimum and maximum.
    Quantile,
}

/// A comprehensive error type for all operations within the basis module.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("Spline degree must be at least 1, but was {0}.")]
    InvalidDegree(usize),

    #[error("At least 2 knots (the two boundaries) are required, but {0} were requested.")]
    TooFewKnots(usize),

    #[error("Cannot place spline knots without training data.")]
    EmptyTrainingData,

    #[error("Non-finite value ({0}) passed to the spline basis.")]
    NonFiniteValue(f64),

    #[error(
        "Training data spans a single value ({0}); a year trend needs at least two distinct years."
    )]
    DegenerateRange(f64),
}

/// A fitted B-spline basis over a single variable.
///
/// The knot vector is derived once from the training data and then frozen, so
/// that every later `transform` call reproduces the exact basis used for fitting.
/// Evaluation outside the training range is clamped to the nearest boundary,
/// which keeps the basis constant beyond the observed years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBasis {
    degree: usize,
    knot_vector: Array1<f64>,
    range: (f64, f64),
}

impl YearBasis {
    /// Derives the knot vector from `training` and returns the frozen basis.
    ///
    /// # Arguments
    ///
    /// * `training`: the (already centered) training values.
    /// * `degree`: polynomial degree of each piece, e.g. 3 for cubic.
    /// * `num_knots`: number of base knots, *including* the two boundary knots.
    /// * `strategy`: where the base knots are placed.
    ///
    /// The base knots are padded with `degree` equally spaced knots beyond each
    /// boundary, so the basis has `num_knots + degree - 1` functions which sum to
    /// one everywhere inside the training range.
    pub fn fit(
        training: ArrayView1<f64>,
        degree: usize,
        num_knots: usize,
        strategy: KnotStrategy,
    ) -> Result<Self, BasisError> {
        if degree < 1 {
            return Err(BasisError::InvalidDegree(degree));
        }
        if num_knots < 2 {
            return Err(BasisError::TooFewKnots(num_knots));
        }
        if training.is_empty() {
            return Err(BasisError::EmptyTrainingData);
        }
        if let Some(&bad) = training.iter().find(|v| !v.is_finite()) {
            return Err(BasisError::NonFiniteValue(bad));
        }

        let min_val = training.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max_val = training.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        if max_val - min_val <= f64::EPSILON * max_val.abs().max(1.0) {
            return Err(BasisError::DegenerateRange(min_val));
        }

        let base_knots = match strategy {
            KnotStrategy::Uniform => Array::linspace(min_val, max_val, num_knots),
            KnotStrategy::Quantile => internal::quantiles(training, num_knots),
        };
        let knot_vector = internal::extend_knot_vector(base_knots.view(), degree);

        Ok(Self {
            degree,
            knot_vector,
            range: (min_val, max_val),
        })
    }

    /// Evaluates every basis function at every value.
    ///
    /// Returns a matrix of shape `[values.len(), num_basis_functions()]`.
    pub fn transform(&self, values: ArrayView1<f64>) -> Result<Array2<f64>, BasisError> {
        let mut basis_matrix = Array2::zeros((values.len(), self.num_basis_functions()));
        for (i, &x) in values.iter().enumerate() {
            if !x.is_finite() {
                return Err(BasisError::NonFiniteValue(x));
            }
            let clamped = x.clamp(self.range.0, self.range.1);
            let row =
                internal::evaluate_splines_at_point(clamped, self.degree, self.knot_vector.view());
            basis_matrix.row_mut(i).assign(&row);
        }
        Ok(basis_matrix)
    }

    /// Number of basis functions, i.e. columns produced by `transform`.
    pub fn num_basis_functions(&self) -> usize {
        self.knot_vector.len() - self.degree - 1
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The full (padded) knot vector.
    pub fn knot_vector(&self) -> ArrayView1<'_, f64> {
        self.knot_vector.view()
    }

    /// The `(min, max)` of the training values; evaluation is clamped to it.
    pub fn range(&self) -> (f64, f64) {
        self.range
    }
}

/// Internal module for implementation details not exposed in the public API.
mod internal {
    use super::*;

    /// Pads the base knots with `degree` knots on each side, continuing the
    /// spacing of the first and last base intervals.
    pub(super) fn extend_knot_vector(base_knots: ArrayView1<f64>, degree: usize) -> Array1<f64> {
        let n = base_knots.len();
        let first = base_knots[0];
        let last = base_knots[n - 1];
        let dist_min = base_knots[1] - first;
        let dist_max = last - base_knots[n - 2];

        let mut knots = Vec::with_capacity(n + 2 * degree);
        knots.extend((0..degree).map(|i| first - (degree - i) as f64 * dist_min));
        knots.extend(base_knots.iter().copied());
        knots.extend((1..=degree).map(|i| last + i as f64 * dist_max));
        Array1::from_vec(knots)
    }

    /// Calculates `num_knots` quantiles at evenly spaced probabilities from 0 to 1,
    /// using linear interpolation (Type 7 in R).
    pub(super) fn quantiles(data: ArrayView1<f64>, num_knots: usize) -> Array1<f64> {
        let mut sorted_data = data.to_vec();
        sorted_data.sort_unstable_by(|a, b| a.total_cmp(b));

        let n = sorted_data.len();
        let quantiles_vec = (0..num_knots)
            .map(|k| {
                let p = k as f64 / (num_knots as f64 - 1.0);
                let float_idx = (n as f64 - 1.0) * p;
                let lower_idx = float_idx.floor() as usize;
                let upper_idx = (float_idx.ceil() as usize).min(n - 1);

                if lower_idx == upper_idx {
                    sorted_data[lower_idx]
                } else {
                    let fraction = float_idx - lower_idx as f64;
                    sorted_data[lower_idx] * (1.0 - fraction) + sorted_data[upper_idx] * fraction
                }
            })
            .collect();

        Array1::from_vec(quantiles_vec)
    }

    /// Finds the knot span `mu` with `knots[mu] <= x` and a non-empty interval
    /// `[knots[mu], knots[mu + 1])`, restricted to the spans that carry a full
    /// set of `degree + 1` basis functions.
    fn find_span(x: f64, degree: usize, knots: ArrayView1<f64>) -> usize {
        let num_basis = knots.len() - degree - 1;
        (degree..num_basis)
            .rev()
            .find(|&i| knots[i] <= x && knots[i] < knots[i + 1])
            .unwrap_or(degree)
    }

    /// Evaluates all B-spline basis functions at a single point `x` using the
    /// triangular Cox-de Boor scheme. Zero-length intervals contribute nothing.
    pub(super) fn evaluate_splines_at_point(
        x: f64,
        degree: usize,
        knots: ArrayView1<f64>,
    ) -> Array1<f64> {
        let num_basis = knots.len() - degree - 1;
        let mu = find_span(x, degree, knots);

        let mut b = vec![0.0; degree + 1];
        let mut left = vec![0.0; degree + 1];
        let mut right = vec![0.0; degree + 1];
        b[0] = 1.0;

        for d in 1..=degree {
            left[d] = x - knots[mu + 1 - d];
            right[d] = knots[mu + d] - x;
            let mut saved = 0.0;
            for r in 0..d {
                let denom = right[r + 1] + left[d - r];
                let temp = if denom.abs() > 1e-12 { b[r] / denom } else { 0.0 };
                b[r] = saved + right[r + 1] * temp;
                saved = left[d - r] * temp;
            }
            b[d] = saved;
        }

        // Place the non-zero values in the correct positions
        let mut basis_values = Array1::zeros(num_basis);
        let start_index = mu - degree;
        for (i, &value) in b.iter().enumerate() {
            let global_idx = start_index + i;
            if global_idx < num_basis {
                basis_values[global_idx] = value;
            }
        }

        basis_values
    }
}
