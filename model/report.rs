use crate::estimate::TrainOutput;
use crate::metrics::{CoefficientTable, Metrics};
use crate::model::ModelConfig;
use crate::naming::NamingWarning;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize training report: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write training report: {0}")]
    Io(#[from] std::io::Error),
}

/// A human-readable summary of one training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub base_features: usize,
    pub expanded_features: usize,
    pub rank: usize,
    pub intercept: f64,
    pub year_origin: f64,
    pub knot_vector: Vec<f64>,
    pub config: ModelConfig,
    pub metrics: Metrics,
    pub warnings: Vec<NamingWarning>,
    pub coefficients: CoefficientTable,
}

impl TrainingReport {
    pub fn from_output(output: &TrainOutput) -> Self {
        let model = &output.model;
        Self {
            rows: output.augmented.height(),
            base_features: model.pipeline().layout().width(),
            expanded_features: model.coefficients().len(),
            rank: model.linear_fit().rank(),
            intercept: model.intercept(),
            year_origin: model.year_origin(),
            knot_vector: model.knot_vector().to_vec(),
            config: model.config().clone(),
            metrics: output.metrics,
            warnings: output.warnings.clone(),
            coefficients: output.coefficients.clone(),
        }
    }

    /// Writes the report as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), toml_string)?;
        log::info!("Training report saved to '{}'.", path.as_ref().display());
        Ok(())
    }
}
