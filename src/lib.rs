//! Farm biosecurity assessment: questionnaire validation, rubric scoring, risk
//! classification, remediation guidance and an optional trained predictor.

pub mod assessment;
pub mod config;
pub mod error;
pub mod model;
pub mod telemetry;

pub use assessment::{
    classify, validate, AssessmentError, AssessmentInput, AssessmentReport, AssessmentService,
    RiskTier, ScoringPolicy,
};
pub use error::AppError;
pub use model::{train, ModelBundle, TrainingError, TrainingOptions};
