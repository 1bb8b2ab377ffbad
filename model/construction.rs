use crate::basis::{BasisError, YearBasis};
use crate::encoding::{CategoricalColumn, EncodingError, OneHotEncoder};
use crate::interactions::{InteractionError, InteractionExpander};
use crate::model::{ModelConfig, YearOrigin};
use crate::schema::{AGE_COLUMN, CATEGORICAL_COLUMNS, PASSTHROUGH_COLUMNS, TARGET_COLUMN, YEAR_COLUMN};
use ndarray::{Array1, Array2, Axis, concatenate};
use polars::prelude::*;
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

/// Errors raised while pulling typed predictor columns out of a table.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("The input table has no rows.")]
    Empty,
    #[error("The required column '{0}' was not found in the input table.")]
    NotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    WrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. The model requires complete data."
    )]
    MissingValues(String),
    #[error("Non-finite values (NaN or Infinity) were found in the required column '{0}'.")]
    NonFiniteValues(String),
}

/// Errors raised while turning predictor columns into the design matrix.
#[derive(Error, Debug)]
pub enum DesignError {
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error("Categorical encoding failed: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Year-trend basis generation failed: {0}")]
    Basis(#[from] BasisError),
    #[error("Interaction expansion failed: {0}")]
    Interaction(#[from] InteractionError),
    #[error("Failed to stack design matrix columns: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Predictor columns coerced to the types the design needs.
///
/// Categorical columns are rendered as text so that a column stored as numbers
/// in one file and as strings in another still yields the same levels.
#[derive(Debug, Clone)]
pub struct BaseColumns {
    pub year: Array1<f64>,
    pub categorical: Vec<CategoricalColumn>,
    pub age: Array1<f64>,
}

impl BaseColumns {
    /// Reads `year`, the categorical predictors and `age` from `table`.
    pub fn from_table(table: &DataFrame) -> Result<Self, ColumnError> {
        if table.height() == 0 {
            return Err(ColumnError::Empty);
        }
        let year = extract_f64_column(table, YEAR_COLUMN)?;
        let categorical = CATEGORICAL_COLUMNS
            .iter()
            .map(|name| extract_text_column(table, name))
            .collect::<Result<Vec<_>, _>>()?;
        let age = extract_f64_column(table, AGE_COLUMN)?;
        Ok(Self {
            year,
            categorical,
            age,
        })
    }

    pub fn len(&self) -> usize {
        self.year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_empty()
    }
}

/// Reads the `population` target.
pub fn extract_target(table: &DataFrame) -> Result<Array1<f64>, ColumnError> {
    if table.height() == 0 {
        return Err(ColumnError::Empty);
    }
    extract_f64_column(table, TARGET_COLUMN)
}

fn extract_f64_column(df: &DataFrame, column_name: &str) -> Result<Array1<f64>, ColumnError> {
    let series = df
        .column(column_name)
        .map_err(|_| ColumnError::NotFound(column_name.to_string()))?;
    if series.null_count() > 0 {
        return Err(ColumnError::MissingValues(column_name.to_string()));
    }

    let dtype = series.dtype().clone();
    let wrong_type = || ColumnError::WrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: dtype.to_string(),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    // A non-strict cast turns unparsable text into nulls.
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let values = Array1::from_iter(casted.f64()?.into_no_null_iter());
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ColumnError::NonFiniteValues(column_name.to_string()));
    }
    Ok(values)
}

fn extract_text_column(df: &DataFrame, column_name: &str) -> Result<CategoricalColumn, ColumnError> {
    let series = df
        .column(column_name)
        .map_err(|_| ColumnError::NotFound(column_name.to_string()))?;
    if series.null_count() > 0 {
        return Err(ColumnError::MissingValues(column_name.to_string()));
    }

    let casted = series
        .cast(&DataType::String)
        .map_err(|_| ColumnError::WrongType {
            column_name: column_name.to_string(),
            expected_type: "text",
            found_type: series.dtype().to_string(),
        })?;

    let mut values = Vec::with_capacity(casted.len());
    for value in casted.str()?.into_iter() {
        match value {
            Some(text) => values.push(text.to_string()),
            None => return Err(ColumnError::MissingValues(column_name.to_string())),
        }
    }
    Ok(CategoricalColumn::new(column_name, values))
}

/// Column ranges of the three feature families inside the base design,
/// which is always laid out as categorical → year basis → passthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignLayout {
    pub categorical: Range<usize>,
    pub year_basis: Range<usize>,
    pub passthrough: Range<usize>,
}

impl DesignLayout {
    pub fn new(categorical_width: usize, year_basis_width: usize, passthrough_width: usize) -> Self {
        let categorical = 0..categorical_width;
        let year_basis = categorical.end..categorical.end + year_basis_width;
        let passthrough = year_basis.end..year_basis.end + passthrough_width;
        Self {
            categorical,
            year_basis,
            passthrough,
        }
    }

    /// Number of base columns, before interaction expansion.
    pub fn width(&self) -> usize {
        self.passthrough.end
    }
}

/// The fitted transformation from predictor columns to the expanded design.
///
/// Every data-dependent choice (year origin, category levels, knot placement)
/// is frozen here at fit time and reused verbatim for later tables.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    year_origin: f64,
    encoder: OneHotEncoder,
    basis: YearBasis,
    layout: DesignLayout,
    expander: InteractionExpander,
}

impl FeaturePipeline {
    pub fn fit(base: &BaseColumns, config: &ModelConfig) -> Result<Self, DesignError> {
        if base.is_empty() {
            return Err(ColumnError::Empty.into());
        }
        let year_origin = match config.year_origin {
            YearOrigin::TrainingMinimum => base.year.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
            YearOrigin::Fixed(origin) => origin,
        };
        let year_centered = &base.year - year_origin;

        let encoder = OneHotEncoder::fit(&base.categorical, config.encoding_drop)?;
        let basis = YearBasis::fit(
            year_centered.view(),
            config.year_basis_degree,
            config.year_basis_knots,
            config.year_basis_knot_strategy,
        )?;
        let layout = DesignLayout::new(
            encoder.width(),
            basis.num_basis_functions(),
            PASSTHROUGH_COLUMNS.len(),
        );
        let expander = InteractionExpander::new(layout.width(), config.interaction_degree)?;

        log::debug!(
            "Feature layout: {} indicator, {} year-basis, {} passthrough columns; {} after interactions",
            layout.categorical.len(),
            layout.year_basis.len(),
            layout.passthrough.len(),
            expander.n_outputs()
        );

        Ok(Self {
            year_origin,
            encoder,
            basis,
            layout,
            expander,
        })
    }

    /// The concatenated feature families, before interaction expansion.
    pub fn base_matrix(&self, base: &BaseColumns) -> Result<Array2<f64>, DesignError> {
        let encoded = self.encoder.transform(&base.categorical)?;
        let year_centered = &base.year - self.year_origin;
        let spline = self.basis.transform(year_centered.view())?;
        let age = base.age.view().insert_axis(Axis(1));
        Ok(concatenate(
            Axis(1),
            &[encoded.view(), spline.view(), age],
        )?)
    }

    /// The full interaction-expanded design matrix.
    pub fn design_matrix(&self, base: &BaseColumns) -> Result<Array2<f64>, DesignError> {
        let base_matrix = self.base_matrix(base)?;
        Ok(self.expander.transform(base_matrix.view())?)
    }

    pub fn year_origin(&self) -> f64 {
        self.year_origin
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn basis(&self) -> &YearBasis {
        &self.basis
    }

    pub fn layout(&self) -> &DesignLayout {
        &self.layout
    }

    pub fn expander(&self) -> &InteractionExpander {
        &self.expander
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_table() -> DataFrame {
        DataFrame::new(vec![
            Series::new("year".into(), vec![2015i64, 2016, 2018, 2020]).into(),
            Series::new(
                "sector".into(),
                vec!["services", "agriculture", "services", "industry"],
            )
            .into(),
            Series::new("gender".into(), vec!["male", "female", "female", "male"]).into(),
            Series::new("country".into(), vec!["Mali", "Senegal", "Mali", "Mali"]).into(),
            Series::new("age".into(), vec![18i64, 25, 31, 22]).into(),
            Series::new("population".into(), vec![1200.0, 3400.0, 2100.0, 900.0]).into(),
        ])
        .expect("construct sample dataframe")
    }

    #[test]
    fn base_columns_coerce_types() {
        let base = BaseColumns::from_table(&sample_table()).unwrap();
        assert_eq!(base.len(), 4);
        assert_eq!(base.year[3], 2020.0);
        assert_eq!(base.age[1], 25.0);
        assert_eq!(base.categorical.len(), 3);
        assert_eq!(base.categorical[0].name, "sector");
        assert_eq!(base.categorical[2].values[1], "Senegal");
    }

    #[test]
    fn numeric_categories_become_text() {
        let mut df = sample_table();
        df.with_column(Series::new("gender".into(), vec![1i64, 2, 2, 1]))
            .unwrap();
        let base = BaseColumns::from_table(&df).unwrap();
        assert_eq!(base.categorical[1].values, vec!["1", "2", "2", "1"]);
    }

    #[test]
    fn rejects_unparsable_numbers_and_nulls() {
        let mut df = sample_table();
        df.with_column(Series::new("age".into(), vec!["18", "twenty", "31", "22"]))
            .unwrap();
        match BaseColumns::from_table(&df).unwrap_err() {
            ColumnError::WrongType { column_name, .. } => assert_eq!(column_name, "age"),
            other => panic!("unexpected error: {other:?}"),
        }

        let mut df = sample_table();
        df.with_column(Series::new(
            "sector".into(),
            vec![Some("services"), None, Some("services"), Some("industry")],
        ))
        .unwrap();
        assert!(matches!(
            BaseColumns::from_table(&df),
            Err(ColumnError::MissingValues(name)) if name == "sector"
        ));

        let mut df = sample_table();
        df.with_column(Series::new(
            "population".into(),
            vec![1.0, f64::INFINITY, 2.0, 3.0],
        ))
        .unwrap();
        assert!(matches!(
            extract_target(&df),
            Err(ColumnError::NonFiniteValues(name)) if name == "population"
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        let df = sample_table().head(Some(0));
        assert!(matches!(BaseColumns::from_table(&df), Err(ColumnError::Empty)));
    }

    #[test]
    fn layout_ranges_are_contiguous() {
        let layout = DesignLayout::new(3, 7, 1);
        assert_eq!(layout.categorical, 0..3);
        assert_eq!(layout.year_basis, 3..10);
        assert_eq!(layout.passthrough, 10..11);
        assert_eq!(layout.width(), 11);
    }

    #[test]
    fn pipeline_builds_families_in_fixed_order() {
        let base = BaseColumns::from_table(&sample_table()).unwrap();
        let pipeline = FeaturePipeline::fit(&base, &ModelConfig::default()).unwrap();

        assert_eq!(pipeline.year_origin(), 2015.0);
        assert_eq!(pipeline.basis().range(), (0.0, 5.0));
        // sector: agriculture | industry, services; gender: female | male; country: Mali | Senegal
        assert_eq!(pipeline.layout(), &DesignLayout::new(4, 7, 1));

        let base_matrix = pipeline.base_matrix(&base).unwrap();
        assert_eq!(base_matrix.shape(), &[4, 12]);
        // Row 0: services, male, Mali, age 18.
        assert_eq!(base_matrix.row(0).slice(ndarray::s![0..4]).to_vec(), vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(base_matrix[[0, 11]], 18.0);
        let spline_sum: f64 = base_matrix.row(0).slice(ndarray::s![4..11]).sum();
        assert_abs_diff_eq!(spline_sum, 1.0, epsilon = 1e-9);

        let design = pipeline.design_matrix(&base).unwrap();
        assert_eq!(design.ncols(), 12 + 66);
    }

    #[test]
    fn fixed_origin_is_used_instead_of_batch_minimum() {
        let base = BaseColumns::from_table(&sample_table()).unwrap();
        let config = ModelConfig {
            year_origin: YearOrigin::Fixed(2000.0),
            ..ModelConfig::default()
        };
        let pipeline = FeaturePipeline::fit(&base, &config).unwrap();
        assert_eq!(pipeline.year_origin(), 2000.0);
        assert_eq!(pipeline.basis().range(), (15.0, 20.0));
    }
}
