#![deny(dead_code)]
#![deny(unused_imports)]

pub mod basis;
pub mod construction;
pub mod data;
pub mod encoding;
pub mod estimate;
pub mod interactions;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod ols;
pub mod report;
pub mod schema;

pub use estimate::{TrainError, TrainOutput, train_model};
pub use model::{FittedModel, ModelConfig};
