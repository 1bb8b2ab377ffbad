//! # Categorical indicator encoding
//!
//! Turns the nominal predictors (`sector`, `gender`, `country`) into binary
//! indicator columns. Levels are learned at fit time and sorted, so the column
//! order never depends on row order. A reference level can be dropped per
//! variable to keep the indicators from summing to the intercept. Levels that
//! were not seen during fitting encode to an all-zero row instead of failing.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Which indicator column, if any, is dropped per variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingDrop {
    /// Drop the first (lexicographically smallest) level of every variable.
    #[default]
    First,
    /// Drop the first level only for variables with exactly two levels.
    IfBinary,
    /// Keep one indicator per level.
    None,
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("The encoder was fitted on {expected} categorical variables but received {found}.")]
    VariableCountMismatch { expected: usize, found: usize },
    #[error("Expected categorical variable '{expected}' at position {position}, found '{found}'.")]
    VariableNameMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Categorical column '{column}' has {found} rows, expected {expected}.")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Categorical column '{0}' has no observed levels.")]
    NoLevels(String),
}

/// One nominal predictor column, already coerced to text.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalColumn {
    pub name: String,
    pub values: Vec<String>,
}

impl CategoricalColumn {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// The fitted levels of a single variable.
#[derive(Debug, Clone, PartialEq)]
struct EncodedVariable {
    name: String,
    levels: Vec<String>,
    dropped: Option<String>,
    /// Maps each emitted level to its offset inside this variable's block.
    offsets: HashMap<String, usize>,
}

impl EncodedVariable {
    fn fit(column: &CategoricalColumn, drop: EncodingDrop) -> Result<Self, EncodingError> {
        let levels: Vec<String> = column
            .values
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if levels.is_empty() {
            return Err(EncodingError::NoLevels(column.name.clone()));
        }

        let drop_first = match drop {
            EncodingDrop::First => true,
            EncodingDrop::IfBinary => levels.len() == 2,
            EncodingDrop::None => false,
        };
        let dropped = drop_first.then(|| levels[0].clone());

        let offsets = levels
            .iter()
            .skip(usize::from(drop_first))
            .enumerate()
            .map(|(offset, level)| (level.clone(), offset))
            .collect();

        Ok(Self {
            name: column.name.clone(),
            levels,
            dropped,
            offsets,
        })
    }

    fn width(&self) -> usize {
        self.offsets.len()
    }

    fn emitted_levels(&self) -> impl Iterator<Item = &String> {
        self.levels
            .iter()
            .filter(move |level| self.dropped.as_ref() != Some(*level))
    }
}

/// A fitted one-hot encoder over an ordered set of categorical variables.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotEncoder {
    drop: EncodingDrop,
    variables: Vec<EncodedVariable>,
}

impl OneHotEncoder {
    /// Learns the sorted levels of every column.
    pub fn fit(columns: &[CategoricalColumn], drop: EncodingDrop) -> Result<Self, EncodingError> {
        let variables = columns
            .iter()
            .map(|column| EncodedVariable::fit(column, drop))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { drop, variables })
    }

    /// Emits the indicator matrix. Columns must be given in the fitted order.
    pub fn transform(&self, columns: &[CategoricalColumn]) -> Result<Array2<f64>, EncodingError> {
        if columns.len() != self.variables.len() {
            return Err(EncodingError::VariableCountMismatch {
                expected: self.variables.len(),
                found: columns.len(),
            });
        }
        let n_rows = columns.first().map_or(0, |c| c.values.len());
        let mut encoded = Array2::zeros((n_rows, self.width()));

        let mut block_start = 0;
        for (position, (variable, column)) in self.variables.iter().zip(columns).enumerate() {
            if variable.name != column.name {
                return Err(EncodingError::VariableNameMismatch {
                    position,
                    expected: variable.name.clone(),
                    found: column.name.clone(),
                });
            }
            if column.values.len() != n_rows {
                return Err(EncodingError::LengthMismatch {
                    column: column.name.clone(),
                    expected: n_rows,
                    found: column.values.len(),
                });
            }

            for (row, value) in column.values.iter().enumerate() {
                // Reference and unseen levels both leave the block at zero.
                if let Some(&offset) = variable.offsets.get(value) {
                    encoded[[row, block_start + offset]] = 1.0;
                }
            }
            block_start += variable.width();
        }

        Ok(encoded)
    }

    /// Total number of indicator columns.
    pub fn width(&self) -> usize {
        self.variables.iter().map(EncodedVariable::width).sum()
    }

    /// `"{variable}_{level}"` for every emitted column, in column order.
    pub fn feature_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .flat_map(|variable| {
                variable
                    .emitted_levels()
                    .map(move |level| format!("{}_{}", variable.name, level))
            })
            .collect()
    }

    /// All observed levels of `variable`, sorted, including the dropped one.
    pub fn levels(&self, variable: &str) -> Option<&[String]> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .map(|v| v.levels.as_slice())
    }

    /// The reference level dropped for `variable`, if any.
    pub fn reference_level(&self, variable: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .and_then(|v| v.dropped.as_deref())
    }

    pub fn drop_policy(&self) -> EncodingDrop {
        self.drop
    }
}
