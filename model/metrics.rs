use ndarray::ArrayView1;
use serde::Serialize;
use std::cmp::Ordering;

/// In-sample fit quality. These are measured on the rows the model was fitted
/// to and say nothing about accuracy on unseen data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl Metrics {
    /// Computes MAE and RMSE from `(y, predicted)`. `r2` comes from the model's
    /// own scoring function so that both agree exactly.
    pub fn in_sample(y: ArrayView1<f64>, predicted: ArrayView1<f64>, r2: f64) -> Self {
        let n = y.len().max(1) as f64;
        let residuals = &y - &predicted;
        let mae = residuals.mapv(f64::abs).sum() / n;
        let rmse = (residuals.mapv(|r| r * r).sum() / n).sqrt();
        Self { r2, mae, rmse }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub weight: f64,
}

/// Fitted weights paired with feature names, ordered by descending `|weight|`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoefficientTable {
    rows: Vec<Coefficient>,
}

impl CoefficientTable {
    /// Pairs names with weights and sorts. The sort is stable, so equal
    /// magnitudes keep design-matrix order.
    pub fn ranked(names: &[String], weights: ArrayView1<f64>) -> Self {
        let mut rows: Vec<Coefficient> = names
            .iter()
            .zip(weights.iter())
            .map(|(name, &weight)| Coefficient {
                name: name.clone(),
                weight,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(Ordering::Equal)
        });
        Self { rows }
    }

    /// The `n` largest coefficients by magnitude.
    pub fn top(&self, n: usize) -> &[Coefficient] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coefficient> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[Coefficient] {
        &self.rows
    }
}

impl<'a> IntoIterator for &'a CoefficientTable {
    type Item = &'a Coefficient;
    type IntoIter = std::slice::Iter<'a, Coefficient>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
