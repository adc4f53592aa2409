//! Statistical predictor: feature encoding, candidate estimators, selection and
//! the persisted bundle used at inference time.
//!
//! Numerics run on aprender's `f32` matrices; encoded rows are converted at the
//! boundary.

pub mod artifact;
mod boosting;
pub mod dataset;
pub mod encoding;
pub mod estimators;
mod linear;
mod neighbors;
pub mod selection;

pub use artifact::{ArtifactError, ModelBundle, PredictError, FORMAT_VERSION};
pub use boosting::GradientBoosting;
pub use dataset::{DatasetError, TrainingRow};
pub use encoding::{CategoricalEncoder, EncodingError, FeatureEncoder};
pub use estimators::{EstimatorFamily, EstimatorSettings, Regressor};
pub use linear::LinearModel;
pub use neighbors::NearestNeighbors;
pub use selection::{train, CandidateReport, TrainingError, TrainingOptions, TrainingReport};
