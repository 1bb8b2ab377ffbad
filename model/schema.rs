use polars::prelude::DataFrame;
use std::collections::HashSet;
use thiserror::Error;

pub const YEAR_COLUMN: &str = "year";
pub const SECTOR_COLUMN: &str = "sector";
pub const GENDER_COLUMN: &str = "gender";
pub const AGE_COLUMN: &str = "age";
pub const COUNTRY_COLUMN: &str = "country";
pub const TARGET_COLUMN: &str = "population";
pub const PREDICTION_COLUMN: &str = "predicted_population";

/// Nominal predictors, in the order their indicator blocks appear in the design.
pub const CATEGORICAL_COLUMNS: [&str; 3] = [SECTOR_COLUMN, GENDER_COLUMN, COUNTRY_COLUMN];

/// Columns passed through to the design unchanged.
pub const PASSTHROUGH_COLUMNS: [&str; 1] = [AGE_COLUMN];

/// Every column a training table must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    YEAR_COLUMN,
    SECTOR_COLUMN,
    GENDER_COLUMN,
    AGE_COLUMN,
    COUNTRY_COLUMN,
    TARGET_COLUMN,
];

/// Every column needed to rebuild the design matrix for prediction.
pub const PREDICTOR_COLUMNS: [&str; 5] = [
    YEAR_COLUMN,
    SECTOR_COLUMN,
    GENDER_COLUMN,
    AGE_COLUMN,
    COUNTRY_COLUMN,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required column(s): {}. Please check spelling and case.", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// Checks that a training table carries all of [`REQUIRED_COLUMNS`].
pub fn validate_schema(table: &DataFrame) -> Result<(), SchemaError> {
    validate_columns(table, &REQUIRED_COLUMNS)
}

/// Checks that every name in `required` is a column of `table`.
/// Reports all missing columns at once, in the order of `required`.
pub fn validate_columns(table: &DataFrame, required: &[&str]) -> Result<(), SchemaError> {
    let present: HashSet<&str> = table
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { missing })
    }
}
