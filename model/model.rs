use crate::basis::KnotStrategy;
use crate::construction::{BaseColumns, DesignError, FeaturePipeline, extract_target};
use crate::encoding::EncodingDrop;
use crate::ols::{LinearFit, RankPolicy, r_squared};
use crate::schema::{PREDICTOR_COLUMNS, REQUIRED_COLUMNS, SchemaError, validate_columns};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---

/// Where `year_centered = year - origin` takes its origin from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearOrigin {
    /// The earliest year of the training table, recomputed on every training call.
    /// Models trained on different slices of history therefore have different origins.
    #[default]
    TrainingMinimum,
    /// A caller-supplied reference year shared across training calls.
    Fixed(f64),
}

/// Hyperparameters of the model family. Data-dependent quantities (levels,
/// knots, the resolved origin) live in the [`FittedModel`], not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Polynomial degree of the year-trend spline.
    pub year_basis_degree: usize,
    /// Knots of the year-trend spline, including the two boundary knots.
    pub year_basis_knots: usize,
    pub year_basis_knot_strategy: KnotStrategy,
    /// Largest number of distinct base columns multiplied into one feature.
    pub interaction_degree: usize,
    pub encoding_drop: EncodingDrop,
    pub year_origin: YearOrigin,
    pub rank_policy: RankPolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            year_basis_degree: 3,
            year_basis_knots: 5,
            year_basis_knot_strategy: KnotStrategy::Uniform,
            interaction_degree: 2,
            encoding_drop: EncodingDrop::First,
            year_origin: YearOrigin::TrainingMinimum,
            rank_policy: RankPolicy::MinimumNorm,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("year_basis_degree must be at least 1, but was {0}.")]
    InvalidBasisDegree(usize),
    #[error("year_basis_knots must be at least 2 (the boundaries), but was {0}.")]
    TooFewKnots(usize),
    #[error("interaction_degree must be at least 1, but was {0}.")]
    InvalidInteractionDegree(usize),
    #[error("A fixed year origin must be finite, but was {0}.")]
    NonFiniteOrigin(f64),
}

impl ModelConfig {
    /// Loads a configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.year_basis_degree < 1 {
            return Err(ConfigError::InvalidBasisDegree(self.year_basis_degree));
        }
        if self.year_basis_knots < 2 {
            return Err(ConfigError::TooFewKnots(self.year_basis_knots));
        }
        if self.interaction_degree < 1 {
            return Err(ConfigError::InvalidInteractionDegree(
                self.interaction_degree,
            ));
        }
        if let YearOrigin::Fixed(origin) = self.year_origin {
            if !origin.is_finite() {
                return Err(ConfigError::NonFiniteOrigin(origin));
            }
        }
        Ok(())
    }
}

/// Custom error type for re-prediction with a fitted model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Design(#[from] DesignError),
}

/// A trained model: the frozen feature pipeline plus the fitted weights.
///
/// It is a plain value. Predicting with it never refits anything, so the same
/// model always maps the same table to the same predictions.
#[derive(Debug, Clone)]
pub struct FittedModel {
    config: ModelConfig,
    pipeline: FeaturePipeline,
    feature_names: Vec<String>,
    fit: LinearFit,
}

impl FittedModel {
    pub(crate) fn new(
        config: ModelConfig,
        pipeline: FeaturePipeline,
        feature_names: Vec<String>,
        fit: LinearFit,
    ) -> Self {
        Self {
            config,
            pipeline,
            feature_names,
            fit,
        }
    }

    /// Rebuilds the interaction-expanded design for a table with the predictor columns.
    pub fn design_matrix(&self, table: &DataFrame) -> Result<Array2<f64>, ModelError> {
        validate_columns(table, &PREDICTOR_COLUMNS)?;
        let base = BaseColumns::from_table(table).map_err(DesignError::from)?;
        Ok(self.pipeline.design_matrix(&base)?)
    }

    /// Predicts `population` for every row of `table`.
    pub fn predict(&self, table: &DataFrame) -> Result<Array1<f64>, ModelError> {
        let x = self.design_matrix(table)?;
        Ok(self.fit.predict(x.view()))
    }

    /// R² of the model's predictions against the table's own `population` column.
    pub fn score(&self, table: &DataFrame) -> Result<f64, ModelError> {
        validate_columns(table, &REQUIRED_COLUMNS)?;
        let y = extract_target(table).map_err(DesignError::from)?;
        let predicted = self.predict(table)?;
        Ok(r_squared(y.view(), predicted.view()))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    /// One name per coefficient, in design-matrix column order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.fit.coefficients()
    }

    pub fn intercept(&self) -> f64 {
        self.fit.intercept()
    }

    pub fn linear_fit(&self) -> &LinearFit {
        &self.fit
    }

    /// The year subtracted before evaluating the year-trend basis.
    pub fn year_origin(&self) -> f64 {
        self.pipeline.year_origin()
    }

    pub fn knot_vector(&self) -> ArrayView1<'_, f64> {
        self.pipeline.basis().knot_vector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_documented_model_family() {
        let config = ModelConfig::default();
        assert_eq!(config.year_basis_degree, 3);
        assert_eq!(config.year_basis_knots, 5);
        assert_eq!(config.interaction_degree, 2);
        assert_eq!(config.encoding_drop, EncodingDrop::First);
        assert_eq!(config.year_origin, YearOrigin::TrainingMinimum);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "year_basis_knots = 4\nencoding_drop = \"if_binary\"\nyear_origin = {{ fixed = 2010.0 }}"
        )
        .unwrap();

        let config = ModelConfig::load(file.path()).unwrap();
        assert_eq!(config.year_basis_knots, 4);
        assert_eq!(config.year_basis_degree, 3);
        assert_eq!(config.encoding_drop, EncodingDrop::IfBinary);
        assert_eq!(config.year_origin, YearOrigin::Fixed(2010.0));
        assert_eq!(config.rank_policy, RankPolicy::MinimumNorm);
    }

    #[test]
    fn rejects_unknown_keys_and_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "spline_knots = 4").unwrap();
        assert!(matches!(
            ModelConfig::load(file.path()),
            Err(ConfigError::TomlParseError(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "interaction_degree = 0").unwrap();
        assert!(matches!(
            ModelConfig::load(file.path()),
            Err(ConfigError::InvalidInteractionDegree(0))
        ));

        let config = ModelConfig {
            year_origin: YearOrigin::Fixed(f64::NAN),
            ..ModelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFiniteOrigin(_))
        ));
    }
}
