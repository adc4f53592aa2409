//! Candidate comparison: seeded hold-out split, k-fold cross-validation and refit.

use super::artifact::{ArtifactError, ModelBundle};
use super::dataset::TrainingRow;
use super::encoding::{EncodingError, FeatureEncoder};
use super::estimators::{to_matrix, to_vector, EstimatorFamily, EstimatorSettings, Regressor};
use crate::assessment::AssessmentInput;
use aprender::error::AprenderError;
use aprender::metrics::{mae, mse, r_squared};
use aprender::model_selection::{cross_validate, train_test_split, KFold};
use aprender::preprocessing::StandardScaler;
use aprender::primitives::{Matrix, Vector};
use aprender::traits::{Estimator, Transformer};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Knobs for dataset generation and model selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Rows to synthesize when training from generated data.
    pub samples: usize,
    pub seed: u64,
    pub folds: usize,
    pub validation_fraction: f64,
    pub estimators: EstimatorSettings,
    /// Candidates in tie-break order.
    pub families: Vec<EstimatorFamily>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            samples: 2000,
            seed: 42,
            folds: 5,
            validation_fraction: 0.2,
            estimators: EstimatorSettings::default(),
            families: EstimatorFamily::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub family: EstimatorFamily,
    pub cv_r2: f64,
    pub cv_r2_std: f64,
    pub validation_r2: f64,
    pub validation_mse: f64,
    pub validation_mae: f64,
}

/// Outcome of one training run, persisted alongside the winning estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub selected: EstimatorFamily,
    pub candidates: Vec<CandidateReport>,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub folds: usize,
    pub seed: u64,
}

impl TrainingReport {
    pub fn selected_candidate(&self) -> Option<&CandidateReport> {
        self.candidates
            .iter()
            .find(|candidate| candidate.family == self.selected)
    }
}


#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("training dataset is empty")]
    EmptyDataset,
    #[error("training split has {found} rows but at least {needed} are required")]
    TooFewSamples { needed: usize, found: usize },
    #[error("labels are constant (variance {variance}); nothing to learn")]
    DegenerateLabels { variance: f64 },
    #[error("invalid training options: {0}")]
    InvalidOptions(String),
    #[error("every candidate estimator failed to train")]
    NoViableCandidate,
    #[error("a training run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("numeric backend failed: {0}")]
    Backend(#[from] AprenderError),
    #[error("trained model failed bundle checks: {0}")]
    Bundle(ArtifactError),
    #[error("failed to persist trained model: {0}")]
    Persist(#[from] ArtifactError),
}

impl TrainingError {
    /// Failures caused by the caller's options or data rather than the trainer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrainingError::EmptyDataset
                | TrainingError::TooFewSamples { .. }
                | TrainingError::DegenerateLabels { .. }
                | TrainingError::InvalidOptions(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
enum CandidateFailure {
    #[error(transparent)]
    Fit(#[from] AprenderError),
    #[error("{0}")]
    CrossValidation(String),
    #[error("produced non-finite predictions")]
    NonFinite,
}

/// Fit every candidate family and keep the one with the best mean CV R².
///
/// Categorical vocabularies are learned from all rows so validation never
/// meets an unseen answer.
pub fn train(rows: &[TrainingRow], options: &TrainingOptions) -> Result<ModelBundle, TrainingError> {
    check_options(options)?;
    if rows.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }

    let labels: Vec<f64> = rows.iter().map(|row| row.biosecurity_score).collect();
    let variance = population_variance(&labels);
    if variance < 1e-9 {
        return Err(TrainingError::DegenerateLabels { variance });
    }

    let held_out = (rows.len() as f64 * options.validation_fraction).round() as usize;
    let train_rows = rows.len().saturating_sub(held_out);
    let needed = 2 * options.folds;
    if held_out == 0 || train_rows < needed {
        return Err(TrainingError::TooFewSamples {
            needed,
            found: train_rows,
        });
    }

    let inputs: Vec<AssessmentInput> = rows.iter().map(|row| row.input.clone()).collect();
    let encoder = FeatureEncoder::fit(&inputs);
    let x = to_matrix(&encoder.encode_all(&inputs)?)?;
    let y = to_vector(&labels);

    let (x_train, x_validation, y_train, y_validation) = train_test_split(
        &x,
        &y,
        options.validation_fraction as f32,
        Some(options.seed),
    )
    .map_err(AprenderError::from)?;

    let mut scaler = StandardScaler::new();
    let scaled_train = scaler.fit_transform(&x_train)?;
    let scaled_validation = scaler.transform(&x_validation)?;
    let kfold = KFold::new(options.folds).with_random_state(options.seed);

    let mut candidates = Vec::new();
    let mut best: Option<(f64, usize, Regressor)> = None;

    for &family in &options.families {
        let (fit_x, eval_x) = if family.requires_scaling() {
            (&scaled_train, &scaled_validation)
        } else {
            (&x_train, &x_validation)
        };

        let split = Split {
            x_train: fit_x,
            y_train: &y_train,
            x_validation: eval_x,
            y_validation: &y_validation,
            kfold: &kfold,
        };
        match evaluate(family, options, &split) {
            Ok((report, estimator)) => {
                info!(
                    family = family.key(),
                    cv_r2 = report.cv_r2,
                    cv_r2_std = report.cv_r2_std,
                    validation_r2 = report.validation_r2,
                    validation_mse = report.validation_mse,
                    validation_mae = report.validation_mae,
                    "candidate evaluated"
                );

                let improves = best
                    .as_ref()
                    .map_or(true, |(leader, _, _)| report.cv_r2 > *leader);
                if improves {
                    best = Some((report.cv_r2, candidates.len(), estimator));
                }
                candidates.push(report);
            }
            Err(err) => warn!(family = family.key(), error = %err, "candidate skipped"),
        }
    }

    let (_, winner, estimator) = best.ok_or(TrainingError::NoViableCandidate)?;
    let selected = candidates[winner].family;
    info!(
        selected = selected.key(),
        cv_r2 = candidates[winner].cv_r2,
        "model selected"
    );

    let report = TrainingReport {
        selected,
        candidates,
        train_rows: x_train.shape().0,
        validation_rows: x_validation.shape().0,
        folds: options.folds,
        seed: options.seed,
    };
    let scaler = selected.requires_scaling().then_some(scaler);

    ModelBundle::new(estimator, encoder, scaler, report, Utc::now()).map_err(TrainingError::Bundle)
}

fn check_options(options: &TrainingOptions) -> Result<(), TrainingError> {
    if options.folds < 2 {
        return Err(TrainingError::InvalidOptions(format!(
            "cross-validation needs at least 2 folds, got {}",
            options.folds
        )));
    }
    if !(options.validation_fraction > 0.0 && options.validation_fraction < 1.0) {
        return Err(TrainingError::InvalidOptions(format!(
            "validation fraction must be between 0 and 1, got {}",
            options.validation_fraction
        )));
    }
    if options.families.is_empty() {
        return Err(TrainingError::InvalidOptions(
            "no candidate families selected".to_string(),
        ));
    }
    Ok(())
}

fn population_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n
}

/// Matrices one candidate is cross-validated, refit and scored on.
struct Split<'a> {
    x_train: &'a Matrix<f32>,
    y_train: &'a Vector<f32>,
    x_validation: &'a Matrix<f32>,
    y_validation: &'a Vector<f32>,
    kfold: &'a KFold,
}

fn evaluate(
    family: EstimatorFamily,
    options: &TrainingOptions,
    split: &Split<'_>,
) -> Result<(CandidateReport, Regressor), CandidateFailure> {
    let mut estimator = family.candidate(&options.estimators, options.seed);
    let cv = cross_validate(&estimator, split.x_train, split.y_train, split.kfold)
        .map_err(CandidateFailure::CrossValidation)?;
    if !cv.scores.iter().all(|score| score.is_finite()) {
        return Err(CandidateFailure::NonFinite);
    }

    estimator.fit(split.x_train, split.y_train)?;
    let predicted = estimator.predict(split.x_validation);
    if !predicted.as_slice().iter().all(|value| value.is_finite()) {
        return Err(CandidateFailure::NonFinite);
    }

    Ok((
        CandidateReport {
            family,
            cv_r2: f64::from(cv.mean()),
            cv_r2_std: f64::from(cv.std()),
            validation_r2: f64::from(r_squared(&predicted, split.y_validation)),
            validation_mse: f64::from(mse(&predicted, split.y_validation)),
            validation_mae: f64::from(mae(&predicted, split.y_validation)),
        },
        estimator,
    ))
}
