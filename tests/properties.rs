use farm_biosecurity::assessment::{
    classify, validate_map, AssessmentService, Category, FieldKind, RiskThresholds, RiskTier,
    Rubric, ScoringPolicy, FIELDS, MAX_SCORE,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Any questionnaire the validator accepts: one pick per vocabulary plus numeric answers.
fn questionnaire() -> impl Strategy<Value = Map<String, Value>> {
    (
        prop::collection::vec(any::<prop::sample::Index>(), FIELDS.len()),
        0.0f64..5000.0,
        0u64..100_000,
    )
        .prop_map(|(picks, acres, head)| {
            FIELDS
                .iter()
                .zip(picks)
                .map(|(spec, pick)| {
                    let value = match spec.kind {
                        FieldKind::Number => json!(acres),
                        FieldKind::Count => json!(head),
                        FieldKind::Choice(domain) => json!(domain[pick.index(domain.len())]),
                    };
                    (spec.name.to_string(), value)
                })
                .collect()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn total_is_bounded_and_equals_category_sum(raw in questionnaire()) {
        let input = validate_map(&raw).expect("generated input is valid");
        let rubric = Rubric::standard();
        let breakdown = rubric.score(&input);

        prop_assert!(breakdown.total <= MAX_SCORE);
        let sum: u32 = breakdown.categories.values().map(|&points| points as u32).sum();
        prop_assert_eq!(sum, breakdown.total as u32);
    }

    #[test]
    fn categories_never_exceed_their_ceilings(raw in questionnaire()) {
        let input = validate_map(&raw).expect("generated input is valid");
        let rubric = Rubric::standard();
        let breakdown = rubric.score(&input);

        for entry in rubric.categories() {
            prop_assert!(breakdown.category(entry.category) <= entry.ceiling);
        }
        prop_assert_eq!(breakdown.categories.len(), 6);
        prop_assert!(breakdown.categories.contains_key(&Category::PestControl));
    }

    #[test]
    fn scoring_the_same_answers_twice_agrees(raw in questionnaire()) {
        let service = AssessmentService::new(ScoringPolicy::RulesOnly);
        let payload = Value::Object(raw);

        let first = service.score(&payload).expect("valid");
        let second = service.score(&payload).expect("valid");
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.biosecurity_score, f64::from(first.rule_score));
        prop_assert_eq!(first.risk_tier, RiskThresholds::default().classify(first.biosecurity_score));
    }

    #[test]
    fn classification_is_total_and_monotonic(a in any::<f64>(), b in -50.0f64..150.0) {
        let thresholds = RiskThresholds::default();
        let tier = thresholds.classify(a);
        prop_assert!(RiskTier::ALL.contains(&tier));

        let (label, color) = classify(a);
        prop_assert_eq!(label, tier.label());
        prop_assert_eq!(color, tier.color());

        let rank = |tier: RiskTier| RiskTier::ALL.iter().position(|t| *t == tier);
        let higher = thresholds.classify(b + 1.0);
        prop_assert!(rank(higher) <= rank(thresholds.classify(b)));
    }
}
