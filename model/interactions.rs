use itertools::Itertools;
use ndarray::{Array2, ArrayView2, Axis};
use thiserror::Error;

/// Separator placed between the names of the factors of a product column.
pub const INTERACTION_SEPARATOR: &str = " x ";

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Interaction degree must be at least 1, but was {0}.")]
    InvalidDegree(usize),
    #[error("The expander was built for {expected} input columns but received {found}.")]
    WidthMismatch { expected: usize, found: usize },
}

/// Expands a matrix with all products of distinct columns up to `degree` factors.
///
/// Output order: the input columns first, then every 2-combination in
/// lexicographic order `(0,1), (0,2), .., (1,2), ..`, then every 3-combination,
/// and so on. No constant column and no squared columns are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionExpander {
    n_inputs: usize,
    degree: usize,
    combinations: Vec<Vec<usize>>,
}

impl InteractionExpander {
    pub fn new(n_inputs: usize, degree: usize) -> Result<Self, InteractionError> {
        if degree < 1 {
            return Err(InteractionError::InvalidDegree(degree));
        }
        let combinations = (1..=degree)
            .flat_map(|size| (0..n_inputs).combinations(size))
            .collect();
        Ok(Self {
            n_inputs,
            degree,
            combinations,
        })
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.combinations.len()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The input column indices multiplied together for each output column.
    pub fn combinations(&self) -> &[Vec<usize>] {
        &self.combinations
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, InteractionError> {
        if x.ncols() != self.n_inputs {
            return Err(InteractionError::WidthMismatch {
                expected: self.n_inputs,
                found: x.ncols(),
            });
        }

        let mut expanded = Array2::zeros((x.nrows(), self.n_outputs()));
        for (mut out, combination) in expanded
            .axis_iter_mut(Axis(1))
            .zip(self.combinations.iter())
        {
            out.assign(&x.column(combination[0]));
            for &idx in &combination[1..] {
                out *= &x.column(idx);
            }
        }
        Ok(expanded)
    }

    /// Combines input names with [`INTERACTION_SEPARATOR`], mirroring `transform`.
    pub fn feature_names(&self, input_names: &[String]) -> Result<Vec<String>, InteractionError> {
        if input_names.len() != self.n_inputs {
            return Err(InteractionError::WidthMismatch {
                expected: self.n_inputs,
                found: input_names.len(),
            });
        }
        Ok(self
            .combinations
            .iter()
            .map(|combination| {
                combination
                    .iter()
                    .map(|&idx| input_names[idx].as_str())
                    .join(INTERACTION_SEPARATOR)
            })
            .collect())
    }
}
