use super::schema::AssessmentInput;
use super::scoring::ScoreBreakdown;

/// Upper (exclusive) bounds of the overall guidance bands.
///
/// Tuned independently of [`super::risk::RiskThresholds`] even though the
/// defaults currently line up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationBands {
    pub critical_below: f64,
    pub significant_below: f64,
    pub moderate_below: f64,
}

impl Default for RecommendationBands {
    fn default() -> Self {
        Self {
            critical_below: 40.0,
            significant_below: 60.0,
            moderate_below: 80.0,
        }
    }
}

pub const IMMEDIATE_ACTION: &str =
    "Immediate action required: Review and implement all biosecurity protocols";
pub const SIGNIFICANT_IMPROVEMENTS: &str =
    "Significant improvements needed: Focus on high-impact areas first";
pub const MODERATE_IMPROVEMENTS: &str =
    "Moderate improvements: Address remaining gaps systematically";
pub const MAINTAIN_STANDARDS: &str =
    "Maintain current standards and consider advanced biosecurity measures";

impl RecommendationBands {
    pub fn overall_message(&self, score: f64) -> &'static str {
        if score.is_nan() || score < self.critical_below {
            IMMEDIATE_ACTION
        } else if score < self.significant_below {
            SIGNIFICANT_IMPROVEMENTS
        } else if score < self.moderate_below {
            MODERATE_IMPROVEMENTS
        } else {
            MAINTAIN_STANDARDS
        }
    }
}

/// A weak answer and the remediation it calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deficiency {
    pub field: &'static str,
    pub triggers: &'static [&'static str],
    pub message: &'static str,
}

const QUALITY_GAP: &[&str] = &["fair", "poor"];
const ABSENT: &[&str] = &["no"];
const LEVEL_GAP: &[&str] = &["basic", "none"];
const FREQUENCY_GAP: &[&str] = &["monthly", "rarely"];

static STANDARD_DEFICIENCIES: &[Deficiency] = &[
    Deficiency {
        field: "fencing_quality",
        triggers: QUALITY_GAP,
        message: "Upgrade fencing quality to improve farm security",
    },
    Deficiency {
        field: "biosecurity_gates",
        triggers: ABSENT,
        message: "Install biosecurity gates to control access",
    },
    Deficiency {
        field: "quarantine_facility",
        triggers: ABSENT,
        message: "Establish a quarantine facility for new livestock",
    },
    Deficiency {
        field: "vehicle_wash_station",
        triggers: ABSENT,
        message: "Set up a vehicle wash station at farm entry points",
    },
    Deficiency {
        field: "vaccination_protocol",
        triggers: LEVEL_GAP,
        message: "Implement a comprehensive vaccination protocol",
    },
    Deficiency {
        field: "disease_monitoring",
        triggers: FREQUENCY_GAP,
        message: "Increase disease monitoring frequency to at least weekly",
    },
    Deficiency {
        field: "isolation_practices",
        triggers: QUALITY_GAP,
        message: "Improve isolation practices for sick and newly arrived animals",
    },
    Deficiency {
        field: "disinfection_frequency",
        triggers: FREQUENCY_GAP,
        message: "Increase disinfection frequency to at least weekly",
    },
    Deficiency {
        field: "personal_protective_equipment",
        triggers: LEVEL_GAP,
        message: "Provide full personal protective equipment for staff",
    },
    Deficiency {
        field: "visitor_control",
        triggers: LEVEL_GAP,
        message: "Tighten visitor control with sign-in logs and restricted zones",
    },
    Deficiency {
        field: "feed_storage_security",
        triggers: QUALITY_GAP,
        message: "Secure feed storage against contamination and wildlife",
    },
    Deficiency {
        field: "water_source_protection",
        triggers: QUALITY_GAP,
        message: "Protect water sources from runoff and animal access",
    },
    Deficiency {
        field: "rodent_control",
        triggers: QUALITY_GAP,
        message: "Strengthen the rodent control program",
    },
    Deficiency {
        field: "insect_control",
        triggers: QUALITY_GAP,
        message: "Strengthen insect control measures",
    },
    Deficiency {
        field: "staff_training",
        triggers: &["biannual", "annual"],
        message: "Schedule biosecurity training for staff at least quarterly",
    },
    Deficiency {
        field: "protocol_documentation",
        triggers: LEVEL_GAP,
        message: "Document biosecurity protocols and keep them accessible to staff",
    },
    Deficiency {
        field: "emergency_plan",
        triggers: ABSENT,
        message: "Prepare a written disease emergency response plan",
    },
    Deficiency {
        field: "veterinary_contact",
        triggers: ABSENT,
        message: "Establish a relationship with a veterinarian for rapid consultation",
    },
];

/// Derives prioritized remediation messages from answers and the final score.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    bands: RecommendationBands,
    deficiencies: Vec<Deficiency>,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl RecommendationEngine {
    pub fn new(bands: RecommendationBands, deficiencies: Vec<Deficiency>) -> Self {
        Self {
            bands,
            deficiencies,
        }
    }

    pub fn standard() -> Self {
        Self::new(
            RecommendationBands::default(),
            STANDARD_DEFICIENCIES.to_vec(),
        )
    }

    pub fn bands(&self) -> &RecommendationBands {
        &self.bands
    }

    /// Overall guidance first, then triggered deficiencies by points lost (ties keep table order).
    pub fn recommend(
        &self,
        input: &AssessmentInput,
        breakdown: &ScoreBreakdown,
        score: f64,
    ) -> Vec<String> {
        let mut triggered: Vec<(u8, &Deficiency)> = self
            .deficiencies
            .iter()
            .filter(|deficiency| {
                input
                    .choice(deficiency.field)
                    .is_some_and(|answer| deficiency.triggers.contains(&answer))
            })
            .map(|deficiency| {
                let lost = breakdown
                    .component(deficiency.field)
                    .map(|component| component.points_lost())
                    .unwrap_or(0);
                (lost, deficiency)
            })
            .collect();

        triggered.sort_by(|left, right| right.0.cmp(&left.0));

        std::iter::once(self.bands.overall_message(score).to_string())
            .chain(
                triggered
                    .into_iter()
                    .map(|(_, deficiency)| deficiency.message.to_string()),
            )
            .collect()
    }
}
