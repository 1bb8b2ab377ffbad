//! # Model training
//!
//! `train_model` is the single entry point of the crate. It runs one straight
//! sequence with no retries:
//!
//! 1. validate the schema and the configuration,
//! 2. build the base features and expand their interactions,
//! 3. fit ordinary least squares,
//! 4. name the expanded features (never fatal),
//! 5. score the fit in-sample and attach predictions to a copy of the input.
//!
//! The input table is only read. Everything returned is newly allocated.

use crate::construction::{BaseColumns, DesignError, FeaturePipeline, extract_target};
use crate::metrics::{CoefficientTable, Metrics};
use crate::model::{ConfigError, FittedModel, ModelConfig};
use crate::naming::{NamingWarning, name_pipeline_features};
use crate::ols::{FitError, fit_ols};
use crate::schema::{PREDICTION_COLUMN, SchemaError, validate_schema};
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid model configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build the design matrix: {0}")]
    Design(#[from] DesignError),

    #[error("Least-squares fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("Failed to attach predictions to the output table: {0}")]
    Polars(#[from] PolarsError),
}

/// Everything a successful training call produces.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model: FittedModel,
    /// A copy of the input table with a `predicted_population` column.
    pub augmented: DataFrame,
    pub coefficients: CoefficientTable,
    pub metrics: Metrics,
    /// Naming stages that degraded. Empty when every feature got its real name.
    pub warnings: Vec<NamingWarning>,
}

impl TrainOutput {
    pub fn into_parts(self) -> (FittedModel, DataFrame, CoefficientTable, Metrics) {
        (self.model, self.augmented, self.coefficients, self.metrics)
    }
}

/// Fits the population model to `table`.
pub fn train_model(table: &DataFrame, config: &ModelConfig) -> Result<TrainOutput, TrainError> {
    validate_schema(table)?;
    config.validate()?;
    log::info!(
        "Training on {} rows with {} columns.",
        table.height(),
        table.width()
    );

    let base = BaseColumns::from_table(table).map_err(DesignError::from)?;
    let y = extract_target(table).map_err(DesignError::from)?;
    log::debug!("Extracted predictors and target for {} rows.", base.len());

    let pipeline = FeaturePipeline::fit(&base, config)?;
    let x = pipeline.design_matrix(&base)?;
    log::debug!("Design matrix shape: {} x {}", x.nrows(), x.ncols());

    let fit = fit_ols(x.view(), y.view(), config.rank_policy)?;
    if fit.rank() < x.ncols() {
        log::info!(
            "Design has numerical rank {} of {} columns; using the minimum-norm solution.",
            fit.rank(),
            x.ncols()
        );
    }

    let named = name_pipeline_features(&pipeline, fit.coefficients().len());
    if named.is_degraded() {
        log::warn!(
            "{} naming stage(s) degraded; see the returned warnings.",
            named.warnings.len()
        );
    }
    let coefficients = CoefficientTable::ranked(&named.names, fit.coefficients());

    let predicted = fit.predict(x.view());
    let r2 = fit.score(x.view(), y.view());
    let metrics = Metrics::in_sample(y.view(), predicted.view(), r2);
    log::info!(
        "In-sample fit: R² = {:.4}, MAE = {:.4}, RMSE = {:.4}",
        metrics.r2,
        metrics.mae,
        metrics.rmse
    );

    let mut augmented = table.clone();
    augmented.with_column(Series::new(PREDICTION_COLUMN.into(), predicted.to_vec()))?;

    let model = FittedModel::new(config.clone(), pipeline, named.names, fit);

    Ok(TrainOutput {
        model,
        augmented,
        coefficients,
        metrics,
        warnings: named.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisError;
    use crate::ols::RankPolicy;

    fn small_table(years: Vec<i64>) -> DataFrame {
        let n = years.len();
        let sectors = ["agriculture", "services"];
        let genders = ["female", "male"];
        DataFrame::new(vec![
            Series::new("year".into(), years).into(),
            Series::new(
                "sector".into(),
                (0..n).map(|i| sectors[i % 2]).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "gender".into(),
                (0..n).map(|i| genders[(i / 2) % 2]).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("age".into(), (0..n).map(|i| 20.0 + i as f64).collect::<Vec<_>>()).into(),
            Series::new("country".into(), vec!["Mali"; n]).into(),
            Series::new(
                "population".into(),
                (0..n).map(|i| 1000.0 + 37.0 * i as f64).collect::<Vec<_>>(),
            )
            .into(),
        ])
        .expect("construct training table")
    }

    #[test]
    fn missing_columns_abort_before_fitting() {
        let table = small_table(vec![2015, 2016, 2017, 2018])
            .drop("country")
            .unwrap();
        match train_model(&table, &ModelConfig::default()).unwrap_err() {
            TrainError::Schema(err) => assert_eq!(err.missing, vec!["country"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let table = small_table(vec![2015, 2016, 2017, 2018]);
        let config = ModelConfig {
            year_basis_knots: 1,
            ..ModelConfig::default()
        };
        assert!(matches!(
            train_model(&table, &config),
            Err(TrainError::Config(ConfigError::TooFewKnots(1)))
        ));
    }

    #[test]
    fn single_year_has_no_trend_to_fit() {
        let table = small_table(vec![2020; 6]);
        assert!(matches!(
            train_model(&table, &ModelConfig::default()),
            Err(TrainError::Design(DesignError::Basis(
                BasisError::DegenerateRange(_)
            )))
        ));
    }

    #[test]
    fn reject_policy_surfaces_rank_deficiency() {
        let table = small_table(vec![2015, 2016, 2017, 2018, 2019, 2020]);
        let config = ModelConfig {
            rank_policy: RankPolicy::Reject,
            ..ModelConfig::default()
        };
        assert!(matches!(
            train_model(&table, &config),
            Err(TrainError::Fit(FitError::RankDeficient { .. }))
        ));
    }

    #[test]
    fn single_level_country_contributes_no_indicator() {
        let table = small_table(vec![2015, 2016, 2017, 2018, 2019, 2020]);
        let output = train_model(&table, &ModelConfig::default()).unwrap();

        // sector_services, gender_male, 7 splines, age -> 10 base columns.
        assert_eq!(output.coefficients.len(), 10 + 45);
        assert!(output.warnings.is_empty());
        assert!(
            output
                .model
                .feature_names()
                .iter()
                .all(|name| !name.starts_with("country_"))
        );
        assert_eq!(output.augmented.width(), table.width() + 1);
    }
}
