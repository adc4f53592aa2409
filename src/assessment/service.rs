use super::recommendations::RecommendationEngine;
use super::risk::{RiskThresholds, RiskTier};
use super::schema::AssessmentInput;
use super::scoring::{Category, Rubric, MAX_SCORE};
use super::validation::{validate, ValidationError};
use crate::model::{
    dataset, train, EncodingError, EstimatorFamily, ModelBundle, PredictError, TrainingError,
    TrainingOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use tracing::{info, warn};

/// How the service chooses between the trained model and the rubric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Use the model when one is loaded and it succeeds, otherwise the rubric.
    #[default]
    ModelWithRuleFallback,
    ModelRequired,
    RulesOnly,
}

impl ScoringPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "model_with_fallback" | "model_with_rule_fallback" | "fallback" => {
                Some(Self::ModelWithRuleFallback)
            }
            "model_required" | "model" => Some(Self::ModelRequired),
            "rules_only" | "rules" => Some(Self::RulesOnly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelWithRuleFallback => "model_with_fallback",
            Self::ModelRequired => "model_required",
            Self::RulesOnly => "rules_only",
        }
    }
}

/// Shared slot for the serving bundle. Readers clone the `Arc`; swaps replace it whole.
#[derive(Debug, Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<ModelBundle>>>,
}

impl ModelHandle {
    pub fn new(bundle: Option<ModelBundle>) -> Self {
        Self {
            current: RwLock::new(bundle.map(Arc::new)),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<ModelBundle>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the bundle that was serving before the swap.
    pub fn install(&self, bundle: Arc<ModelBundle>) -> Option<Arc<ModelBundle>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(bundle)
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSource {
    Rules,
    Model { family: EstimatorFamily },
}

/// Client-facing result of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentReport {
    pub biosecurity_score: f64,
    pub max_score: u8,
    pub risk_level: &'static str,
    pub risk_color: &'static str,
    pub risk_tier: RiskTier,
    pub category_scores: BTreeMap<Category, u8>,
    pub recommendations: Vec<String>,
    pub score_source: ScoreSource,
    /// Rubric total, reported even when the model produced the headline score.
    pub rule_score: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },
}

/// Validate, score, classify and recommend; owns the serving model slot.
#[derive(Debug)]
pub struct AssessmentService {
    rubric: Rubric,
    thresholds: RiskThresholds,
    recommendations: RecommendationEngine,
    policy: ScoringPolicy,
    model: ModelHandle,
    training: Mutex<()>,
}

impl AssessmentService {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self::with_handle(policy, ModelHandle::default())
    }

    pub fn with_model(policy: ScoringPolicy, bundle: ModelBundle) -> Self {
        Self::with_handle(policy, ModelHandle::new(Some(bundle)))
    }

    pub fn with_handle(policy: ScoringPolicy, model: ModelHandle) -> Self {
        Self {
            rubric: Rubric::standard(),
            thresholds: RiskThresholds::default(),
            recommendations: RecommendationEngine::standard(),
            policy,
            model,
            training: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    pub fn score(&self, raw: &Value) -> Result<AssessmentReport, AssessmentError> {
        let input = validate(raw)?;
        self.score_input(&input)
    }

    pub fn score_input(&self, input: &AssessmentInput) -> Result<AssessmentReport, AssessmentError> {
        let breakdown = self.rubric.score(input);
        let rule_score = breakdown.total;

        let (score, score_source) = match self.policy {
            ScoringPolicy::RulesOnly => (f64::from(rule_score), ScoreSource::Rules),
            ScoringPolicy::ModelRequired => {
                let bundle = self.model.snapshot().ok_or_else(|| {
                    AssessmentError::ModelUnavailable {
                        reason: "no model bundle is loaded".to_string(),
                    }
                })?;
                let score = bundle.predict(input).map_err(|err| match err {
                    PredictError::Encoding(err) => AssessmentError::Encoding(err),
                    other => AssessmentError::ModelUnavailable {
                        reason: other.to_string(),
                    },
                })?;
                let family = bundle.family();
                (score, ScoreSource::Model { family })
            }
            ScoringPolicy::ModelWithRuleFallback => match self.model.snapshot() {
                None => (f64::from(rule_score), ScoreSource::Rules),
                Some(bundle) => match bundle.predict(input) {
                    Ok(score) => (
                        score,
                        ScoreSource::Model {
                            family: bundle.family(),
                        },
                    ),
                    // Unseen answers are input errors; only model faults fall back.
                    Err(PredictError::Encoding(err)) => return Err(AssessmentError::Encoding(err)),
                    Err(err) => {
                        warn!(error = %err, "model prediction failed; falling back to rubric");
                        (f64::from(rule_score), ScoreSource::Rules)
                    }
                },
            },
        };

        let biosecurity_score = round_tenth(score.clamp(0.0, f64::from(MAX_SCORE)));
        let tier = self.thresholds.classify(biosecurity_score);
        let recommendations = self
            .recommendations
            .recommend(input, &breakdown, biosecurity_score);

        Ok(AssessmentReport {
            biosecurity_score,
            max_score: MAX_SCORE,
            risk_level: tier.label(),
            risk_color: tier.color(),
            risk_tier: tier,
            category_scores: breakdown.categories,
            recommendations,
            score_source,
            rule_score,
        })
    }

    /// Generate a labeled dataset, train, optionally persist, then swap the bundle in.
    ///
    /// Only one run proceeds at a time; a concurrent call fails fast.
    pub fn retrain(
        &self,
        options: &TrainingOptions,
        persist_to: Option<&Path>,
    ) -> Result<Arc<ModelBundle>, TrainingError> {
        let _running = match self.training.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(TrainingError::AlreadyRunning),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        info!(
            samples = options.samples,
            seed = options.seed,
            folds = options.folds,
            "training run started"
        );
        let rows = dataset::generate(options.samples, options.seed);
        let bundle = train(&rows, options)?;
        if let Some(path) = persist_to {
            bundle.save(path)?;
            info!(path = %path.display(), "model bundle saved");
        }

        let bundle = Arc::new(bundle);
        let previous = self.model.install(Arc::clone(&bundle));
        info!(
            family = bundle.family().key(),
            replaced = previous.is_some(),
            "model bundle swapped in"
        );
        Ok(bundle)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::recommendations::MODERATE_IMPROVEMENTS;
    use crate::assessment::schema::sample_input;
    use crate::model::EstimatorSettings;
    use serde_json::json;

    fn quick_options() -> TrainingOptions {
        TrainingOptions {
            samples: 150,
            folds: 3,
            families: vec![
                EstimatorFamily::RidgeRegression,
                EstimatorFamily::NearestNeighbors,
            ],
            estimators: EstimatorSettings::default(),
            ..TrainingOptions::default()
        }
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(
            ScoringPolicy::parse("model_with_fallback"),
            Some(ScoringPolicy::ModelWithRuleFallback)
        );
        assert_eq!(
            ScoringPolicy::parse("Model-Required"),
            Some(ScoringPolicy::ModelRequired)
        );
        assert_eq!(ScoringPolicy::parse("rules"), Some(ScoringPolicy::RulesOnly));
        assert_eq!(ScoringPolicy::parse("guess"), None);
        for policy in [
            ScoringPolicy::ModelWithRuleFallback,
            ScoringPolicy::ModelRequired,
            ScoringPolicy::RulesOnly,
        ] {
            assert_eq!(ScoringPolicy::parse(policy.as_str()), Some(policy));
        }
    }

    #[test]
    fn rules_only_scores_the_sample() {
        let service = AssessmentService::new(ScoringPolicy::RulesOnly);
        let report = service
            .score(&Value::Object(sample_input()))
            .expect("sample is valid");

        assert_eq!(report.biosecurity_score, 72.0);
        assert_eq!(report.rule_score, 72);
        assert_eq!(report.risk_level, "Moderate Risk");
        assert_eq!(report.risk_color, "yellow");
        assert_eq!(report.score_source, ScoreSource::Rules);
        assert_eq!(report.recommendations[0], MODERATE_IMPROVEMENTS);
        assert_eq!(report.category_scores[&Category::Infrastructure], 17);
    }

    #[test]
    fn fallback_without_model_uses_rules() {
        let service = AssessmentService::new(ScoringPolicy::ModelWithRuleFallback);
        let report = service
            .score(&Value::Object(sample_input()))
            .expect("sample is valid");
        assert_eq!(report.score_source, ScoreSource::Rules);
        assert_eq!(report.biosecurity_score, 72.0);
    }

    #[test]
    fn model_required_without_model_is_unavailable() {
        let service = AssessmentService::new(ScoringPolicy::ModelRequired);
        let err = service
            .score(&Value::Object(sample_input()))
            .expect_err("no model loaded");
        assert!(matches!(err, AssessmentError::ModelUnavailable { .. }));
    }

    #[test]
    fn invalid_input_is_a_validation_error() {
        let service = AssessmentService::new(ScoringPolicy::RulesOnly);
        let err = service
            .score(&json!({ "farm_size_acres": 10 }))
            .expect_err("fields missing");
        match err {
            AssessmentError::Validation(validation) => assert_eq!(validation.issues.len(), 19),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn retrain_swaps_in_a_model() {
        let service = AssessmentService::new(ScoringPolicy::ModelRequired);
        assert!(!service.model().is_loaded());

        let bundle = service
            .retrain(&quick_options(), None)
            .expect("training succeeds");
        assert!(service.model().is_loaded());

        let report = service
            .score(&Value::Object(sample_input()))
            .expect("model scores the sample");
        assert_eq!(
            report.score_source,
            ScoreSource::Model {
                family: bundle.family()
            }
        );
        assert!((0.0..=100.0).contains(&report.biosecurity_score));
        assert_eq!(report.rule_score, 72);
        let tenths = report.biosecurity_score * 10.0;
        assert!((tenths - tenths.round()).abs() < 1e-9);
    }

    fn bundle_without_poor_fencing() -> ModelBundle {
        let rows: Vec<_> = dataset::generate(400, 7)
            .into_iter()
            .filter(|row| row.input.choice("fencing_quality") != Some("poor"))
            .collect();
        train(&rows, &quick_options()).expect("training succeeds")
    }

    fn poor_fencing() -> Value {
        let mut raw = sample_input();
        raw.insert("fencing_quality".into(), json!("poor"));
        Value::Object(raw)
    }

    fn assert_unseen_fencing(err: AssessmentError) {
        match err {
            AssessmentError::Encoding(EncodingError::UnseenValue { field, value, known }) => {
                assert_eq!(field, "fencing_quality");
                assert_eq!(value, "poor");
                assert!(!known.contains(&"poor".to_string()));
                assert!(known.contains(&"good".to_string()));
            }
            other => panic!("expected an unseen-value error, got {other:?}"),
        }
    }

    #[test]
    fn unseen_answer_fails_when_the_model_is_required() {
        let service = AssessmentService::with_handle(
            ScoringPolicy::ModelRequired,
            ModelHandle::new(Some(bundle_without_poor_fencing())),
        );
        assert_unseen_fencing(service.score(&poor_fencing()).expect_err("unseen answer"));
    }

    #[test]
    fn unseen_answer_is_not_hidden_by_the_rubric_fallback() {
        let service = AssessmentService::with_handle(
            ScoringPolicy::ModelWithRuleFallback,
            ModelHandle::new(Some(bundle_without_poor_fencing())),
        );
        assert_unseen_fencing(service.score(&poor_fencing()).expect_err("unseen answer"));

        let report = service
            .score(&Value::Object(sample_input()))
            .expect("known answers still score");
        assert!(matches!(report.score_source, ScoreSource::Model { .. }));
    }

    #[test]
    fn concurrent_training_is_refused() {
        let service = AssessmentService::new(ScoringPolicy::RulesOnly);
        let _held = service.training.lock().expect("training lock");
        assert!(matches!(
            service.retrain(&quick_options(), None),
            Err(TrainingError::AlreadyRunning)
        ));
    }
}
