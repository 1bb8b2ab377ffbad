//! # Feature naming
//!
//! Rebuilds a readable name for every column of the expanded design. Names
//! are assembled family by family (indicators, year basis, passthrough) and
//! then combined by the interaction expander. Each stage is checked on its
//! own. A failing stage contributes no names and leaves a [`NamingWarning`];
//! if the combined list still cannot be matched to the coefficients, the
//! result degrades to `feature_0 .. feature_{n-1}`. Naming never fails a fit.

use crate::basis::YearBasis;
use crate::construction::{DesignLayout, FeaturePipeline};
use crate::encoding::OneHotEncoder;
use crate::interactions::{InteractionError, InteractionExpander};
use crate::schema::PASSTHROUGH_COLUMNS;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The step of name reconstruction a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStage {
    Categorical,
    YearBasis,
    Passthrough,
    Interactions,
}

impl fmt::Display for NamingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NamingStage::Categorical => "categorical indicators",
            NamingStage::YearBasis => "year basis",
            NamingStage::Passthrough => "passthrough columns",
            NamingStage::Interactions => "interactions",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("Produced {found} names for a family of {expected} columns.")]
    WidthMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error("Produced {found} names for {expected} fitted coefficients.")]
    CoefficientCountMismatch { expected: usize, found: usize },
}

/// A naming stage that degraded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingWarning {
    pub stage: NamingStage,
    pub reason: String,
}

impl fmt::Display for NamingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Naming of {} degraded: {}", self.stage, self.reason)
    }
}

/// One name per coefficient, plus whatever went wrong producing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureNames {
    pub names: Vec<String>,
    pub warnings: Vec<NamingWarning>,
}

impl FeatureNames {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Names the expanded design produced by `pipeline`.
pub fn name_pipeline_features(pipeline: &FeaturePipeline, n_coefficients: usize) -> FeatureNames {
    name_features(
        pipeline.encoder(),
        pipeline.basis(),
        pipeline.layout(),
        pipeline.expander(),
        n_coefficients,
    )
}

/// Names `n_coefficients` expanded columns from the fitted feature components.
pub fn name_features(
    encoder: &OneHotEncoder,
    basis: &YearBasis,
    layout: &DesignLayout,
    expander: &InteractionExpander,
    n_coefficients: usize,
) -> FeatureNames {
    let stages = [
        (NamingStage::Categorical, categorical_names(encoder, layout)),
        (NamingStage::YearBasis, year_basis_names(basis, layout)),
        (NamingStage::Passthrough, passthrough_names(layout)),
    ];

    let mut warnings = Vec::new();
    let mut base_names = Vec::with_capacity(layout.width());
    for (stage, result) in stages {
        match result {
            Ok(names) => base_names.extend(names),
            Err(err) => warnings.push(degrade(stage, &err)),
        }
    }

    let combined = expander
        .feature_names(&base_names)
        .map_err(NamingError::from)
        .and_then(|names| {
            if names.len() == n_coefficients {
                Ok(names)
            } else {
                Err(NamingError::CoefficientCountMismatch {
                    expected: n_coefficients,
                    found: names.len(),
                })
            }
        });

    let names = match combined {
        Ok(names) => names,
        Err(err) => {
            warnings.push(degrade(NamingStage::Interactions, &err));
            fallback_names(n_coefficients)
        }
    };

    FeatureNames { names, warnings }
}

/// `feature_0 .. feature_{n-1}`.
pub fn fallback_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("feature_{i}")).collect()
}

fn degrade(stage: NamingStage, err: &NamingError) -> NamingWarning {
    let warning = NamingWarning {
        stage,
        reason: err.to_string(),
    };
    log::warn!("{warning}");
    warning
}

fn categorical_names(
    encoder: &OneHotEncoder,
    layout: &DesignLayout,
) -> Result<Vec<String>, NamingError> {
    check_width(encoder.feature_names(), layout.categorical.len())
}

fn year_basis_names(basis: &YearBasis, layout: &DesignLayout) -> Result<Vec<String>, NamingError> {
    let names = (0..basis.num_basis_functions())
        .map(|i| format!("spline_{i}"))
        .collect();
    check_width(names, layout.year_basis.len())
}

fn passthrough_names(layout: &DesignLayout) -> Result<Vec<String>, NamingError> {
    let names = PASSTHROUGH_COLUMNS.iter().map(|s| s.to_string()).collect();
    check_width(names, layout.passthrough.len())
}

fn check_width(names: Vec<String>, expected: usize) -> Result<Vec<String>, NamingError> {
    if names.len() == expected {
        Ok(names)
    } else {
        Err(NamingError::WidthMismatch {
            expected,
            found: names.len(),
        })
    }
}
