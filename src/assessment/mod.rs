//! Questionnaire schema, validation and the deterministic scoring pipeline.

pub mod recommendations;
pub mod risk;
pub mod schema;
pub mod scoring;
pub mod service;
pub mod validation;

pub use recommendations::{Deficiency, RecommendationBands, RecommendationEngine};
pub use risk::{classify, RiskThresholds, RiskTier};
pub use schema::{
    field_index, field_spec, sample_input, AssessmentInput, FieldKind, FieldSpec, FieldValue,
    FIELDS,
};
pub use scoring::{
    Category, CategoryRubric, Rubric, RubricError, Rule, ScoreBreakdown, ScoreComponent, MAX_SCORE,
};
pub use service::{
    AssessmentError, AssessmentReport, AssessmentService, ModelHandle, ScoreSource, ScoringPolicy,
};
pub use validation::{validate, validate_map, FieldIssue, IssueKind, ValidationError, INPUT_FIELD};
