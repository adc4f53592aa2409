use farm_biosecurity::assessment::{
    sample_input, validate_map, AssessmentService, ModelHandle, ScoreSource, ScoringPolicy,
};
use farm_biosecurity::model::{
    dataset, train, EncodingError, EstimatorFamily, EstimatorSettings, ModelBundle,
    TrainingError, TrainingOptions,
};
use farm_biosecurity::AssessmentError;
use serde_json::{json, Value};

fn quick_options() -> TrainingOptions {
    TrainingOptions {
        samples: 240,
        seed: 11,
        folds: 3,
        estimators: EstimatorSettings {
            forest_trees: 5,
            boosting_rounds: 20,
            ..EstimatorSettings::default()
        },
        ..TrainingOptions::default()
    }
}

fn trained_bundle() -> ModelBundle {
    let options = quick_options();
    let rows = dataset::generate(options.samples, options.seed);
    train(&rows, &options).expect("training succeeds")
}

#[test]
fn training_reports_every_candidate_and_selects_the_best() {
    let bundle = trained_bundle();
    let report = bundle.report();

    assert_eq!(report.candidates.len(), EstimatorFamily::ALL.len());
    assert_eq!(report.folds, 3);
    assert_eq!(report.train_rows + report.validation_rows, 240);
    assert!(report.validation_rows >= 1);

    let best = report
        .candidates
        .iter()
        .map(|candidate| candidate.cv_r2)
        .fold(f64::NEG_INFINITY, f64::max);
    let selected = report.selected_candidate().expect("selected candidate");
    assert_eq!(selected.cv_r2, best);
    assert_eq!(bundle.family(), report.selected);
    assert_eq!(bundle.scaler().is_some(), bundle.family().requires_scaling());
}

#[test]
fn predictions_stay_within_the_score_range() {
    let bundle = trained_bundle();
    for row in dataset::generate(50, 99) {
        let score = bundle.predict(&row.input).expect("prediction");
        assert!((0.0..=100.0).contains(&score), "{score} out of range");
    }
}

#[test]
fn saved_bundle_reloads_with_identical_bytes_and_predictions() {
    let bundle = trained_bundle();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("models").join("biosecurity.bin");

    bundle.save(&path).expect("save bundle");
    let reloaded = ModelBundle::load(&path).expect("load bundle");

    assert_eq!(reloaded.report(), bundle.report());
    assert_eq!(reloaded.trained_at(), bundle.trained_at());
    assert_eq!(
        reloaded.to_bytes().expect("encode reloaded"),
        std::fs::read(&path).expect("read saved bytes")
    );

    let input = validate_map(&sample_input()).expect("valid sample");
    assert_eq!(
        reloaded.predict(&input).expect("reloaded prediction"),
        bundle.predict(&input).expect("original prediction")
    );
}

#[test]
fn same_seed_trains_the_same_model() {
    let options = quick_options();
    let rows = dataset::generate(options.samples, options.seed);

    let first = train(&rows, &options).expect("first run");
    let second = train(&rows, &options).expect("second run");
    assert_eq!(first.report(), second.report());

    let input = validate_map(&sample_input()).expect("valid sample");
    assert_eq!(
        first.predict(&input).expect("prediction"),
        second.predict(&input).expect("prediction")
    );
}

#[test]
fn service_scores_with_a_loaded_model() {
    let bundle = trained_bundle();
    let family = bundle.family();
    let service =
        AssessmentService::with_handle(ScoringPolicy::ModelRequired, ModelHandle::new(Some(bundle)));

    let report = service
        .score(&Value::Object(sample_input()))
        .expect("model scores the sample");
    assert_eq!(report.score_source, ScoreSource::Model { family });
    assert!((0.0..=100.0).contains(&report.biosecurity_score));
    assert_eq!(report.rule_score, 72);
    assert_eq!(
        (report.biosecurity_score * 10.0).round() / 10.0,
        report.biosecurity_score
    );
}

#[test]
fn retraining_installs_and_persists_a_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("retrained.bin");
    let service = AssessmentService::new(ScoringPolicy::ModelWithRuleFallback);
    assert!(!service.model().is_loaded());

    let bundle = service
        .retrain(&quick_options(), Some(path.as_path()))
        .expect("retrain succeeds");

    assert!(service.model().is_loaded());
    assert_eq!(
        ModelBundle::load(&path)
            .expect("persisted bundle")
            .to_bytes()
            .expect("encode persisted"),
        bundle.to_bytes().expect("encode installed")
    );

    let report = service
        .score(&Value::Object(sample_input()))
        .expect("scores");
    assert_eq!(
        report.score_source,
        ScoreSource::Model {
            family: bundle.family()
        }
    );
}

#[test]
fn too_few_rows_are_rejected() {
    let options = quick_options();
    let rows = dataset::generate(4, 1);
    assert!(matches!(
        train(&rows, &options),
        Err(TrainingError::TooFewSamples { .. })
    ));
    assert!(matches!(
        train(&[], &options),
        Err(TrainingError::EmptyDataset)
    ));
}

fn bundle_without_poor_fencing() -> ModelBundle {
    let rows: Vec<_> = dataset::generate(400, 7)
        .into_iter()
        .filter(|row| row.input.choice("fencing_quality") != Some("poor"))
        .collect();
    train(&rows, &quick_options()).expect("training succeeds")
}

fn poor_fencing_payload() -> Value {
    let mut raw = sample_input();
    raw.insert("fencing_quality".into(), json!("poor"));
    Value::Object(raw)
}

#[test]
fn unseen_answer_is_an_encoding_error_under_every_model_policy() {
    let bundle = bundle_without_poor_fencing();
    let known = bundle
        .encoder()
        .encoder("fencing_quality")
        .expect("fencing encoder")
        .vocabulary()
        .to_vec();
    assert!(!known.contains(&"poor".to_string()));

    for policy in [
        ScoringPolicy::ModelRequired,
        ScoringPolicy::ModelWithRuleFallback,
    ] {
        let service =
            AssessmentService::with_handle(policy, ModelHandle::new(Some(bundle.clone())));
        let err = service
            .score(&poor_fencing_payload())
            .expect_err("unseen fencing answer");
        match err {
            AssessmentError::Encoding(EncodingError::UnseenValue {
                field,
                value,
                known: listed,
            }) => {
                assert_eq!(field, "fencing_quality");
                assert_eq!(value, "poor");
                assert_eq!(listed, known);
            }
            other => panic!("{policy:?}: expected an encoding error, got {other:?}"),
        }
    }

    let rules = AssessmentService::with_handle(
        ScoringPolicy::RulesOnly,
        ModelHandle::new(Some(bundle)),
    );
    let report = rules
        .score(&poor_fencing_payload())
        .expect("rubric accepts every vocabulary answer");
    assert_eq!(report.score_source, ScoreSource::Rules);
}
