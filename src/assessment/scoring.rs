use super::schema::{field_spec, AssessmentInput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound of the biosecurity score; category ceilings must add up to it.
pub const MAX_SCORE: u8 = 100;

/// Scored area of the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Infrastructure,
    LivestockManagement,
    HygienePractices,
    FeedWater,
    PestControl,
    TrainingDocumentation,
}

impl Category {
    pub fn key(&self) -> &'static str {
        match self {
            Category::Infrastructure => "infrastructure",
            Category::LivestockManagement => "livestock_management",
            Category::HygienePractices => "hygiene_practices",
            Category::FeedWater => "feed_water",
            Category::PestControl => "pest_control",
            Category::TrainingDocumentation => "training_documentation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Infrastructure => "Farm Infrastructure",
            Category::LivestockManagement => "Livestock Management",
            Category::HygienePractices => "Hygiene Practices",
            Category::FeedWater => "Feed and Water",
            Category::PestControl => "Pest Control",
            Category::TrainingDocumentation => "Training and Documentation",
        }
    }
}

/// Points contributed by one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Step function over an enumerated answer. Anything not listed earns `otherwise`.
    Choice {
        field: &'static str,
        points: &'static [(&'static str, u8)],
        otherwise: u8,
    },
    /// Awards `points` for a "yes" answer, nothing otherwise.
    Flag { field: &'static str, points: u8 },
}

impl Rule {
    pub fn field(&self) -> &'static str {
        match self {
            Rule::Choice { field, .. } | Rule::Flag { field, .. } => *field,
        }
    }

    pub fn max_points(&self) -> u8 {
        match self {
            Rule::Choice {
                points, otherwise, ..
            } => points
                .iter()
                .map(|(_, value)| *value)
                .fold(*otherwise, u8::max),
            Rule::Flag { points, .. } => *points,
        }
    }

    pub fn award(&self, answer: Option<&str>) -> u8 {
        match self {
            Rule::Choice {
                points, otherwise, ..
            } => answer
                .and_then(|answer| {
                    points
                        .iter()
                        .find(|(value, _)| *value == answer)
                        .map(|(_, awarded)| *awarded)
                })
                .unwrap_or(*otherwise),
            Rule::Flag { points, .. } => {
                if answer == Some("yes") {
                    *points
                } else {
                    0
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRubric {
    pub category: Category,
    pub ceiling: u8,
    pub rules: Vec<Rule>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RubricError {
    #[error("category ceilings sum to {total}, expected {}", MAX_SCORE)]
    CeilingMismatch { total: u32 },
    #[error("rule references unknown field {0}")]
    UnknownField(&'static str),
    #[error("rule for {field} awards points for {value}, which is outside its domain")]
    UnknownValue {
        field: &'static str,
        value: &'static str,
    },
}

/// Audit trail entry for a single rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub category: Category,
    pub field: &'static str,
    pub points: u8,
    pub max_points: u8,
}

impl ScoreComponent {
    pub fn points_lost(&self) -> u8 {
        self.max_points.saturating_sub(self.points)
    }
}

/// Clamped category sub-scores plus the rule-level trail that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub categories: BTreeMap<Category, u8>,
    pub components: Vec<ScoreComponent>,
    pub total: u8,
}

impl ScoreBreakdown {
    pub fn category(&self, category: Category) -> u8 {
        self.categories.get(&category).copied().unwrap_or(0)
    }

    pub fn component(&self, field: &str) -> Option<&ScoreComponent> {
        self.components
            .iter()
            .find(|component| component.field == field)
    }
}

/// Weighted rule table mapping answers to category points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rubric {
    categories: Vec<CategoryRubric>,
}

impl Rubric {
    pub fn new(categories: Vec<CategoryRubric>) -> Result<Self, RubricError> {
        let total: u32 = categories.iter().map(|entry| entry.ceiling as u32).sum();
        if total != MAX_SCORE as u32 {
            return Err(RubricError::CeilingMismatch { total });
        }

        for rule in categories.iter().flat_map(|entry| entry.rules.iter()) {
            let spec = field_spec(rule.field()).ok_or(RubricError::UnknownField(rule.field()))?;
            let domain = spec.domain().ok_or(RubricError::UnknownField(rule.field()))?;
            if let Rule::Choice { field, points, .. } = rule {
                if let Some((value, _)) = points.iter().find(|(value, _)| !domain.contains(value))
                {
                    return Err(RubricError::UnknownValue {
                        field: *field,
                        value: *value,
                    });
                }
            }
        }

        Ok(Self { categories })
    }

    pub fn standard() -> Self {
        Self {
            categories: standard_categories(),
        }
    }

    pub fn categories(&self) -> &[CategoryRubric] {
        &self.categories
    }

    pub fn ceiling(&self, category: Category) -> Option<u8> {
        self.categories
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.ceiling)
    }

    /// Sum each category's rules, then clamp the sum to the category ceiling.
    pub fn score(&self, input: &AssessmentInput) -> ScoreBreakdown {
        let mut categories = BTreeMap::new();
        let mut components = Vec::new();
        let mut total: u8 = 0;

        for entry in &self.categories {
            let mut raw: u32 = 0;
            for rule in &entry.rules {
                let points = rule.award(input.choice(rule.field()));
                raw += points as u32;
                components.push(ScoreComponent {
                    category: entry.category,
                    field: rule.field(),
                    points,
                    max_points: rule.max_points(),
                });
            }

            let clamped = raw.min(entry.ceiling as u32) as u8;
            categories.insert(entry.category, clamped);
            total = total.saturating_add(clamped);
        }

        ScoreBreakdown {
            categories,
            components,
            total: total.min(MAX_SCORE),
        }
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_categories() -> Vec<CategoryRubric> {
    const QUALITY_HIGH: &[(&str, u8)] = &[("excellent", 8), ("good", 6), ("fair", 4)];
    const PEST_CONTROL: &[(&str, u8)] = &[("excellent", 5), ("good", 4), ("fair", 2)];

    vec![
        CategoryRubric {
            category: Category::Infrastructure,
            ceiling: 25,
            rules: vec![
                Rule::Choice {
                    field: "fencing_quality",
                    points: QUALITY_HIGH,
                    otherwise: 1,
                },
                Rule::Flag {
                    field: "biosecurity_gates",
                    points: 5,
                },
                Rule::Flag {
                    field: "quarantine_facility",
                    points: 6,
                },
                Rule::Flag {
                    field: "vehicle_wash_station",
                    points: 6,
                },
            ],
        },
        CategoryRubric {
            category: Category::LivestockManagement,
            ceiling: 25,
            rules: vec![
                Rule::Choice {
                    field: "vaccination_protocol",
                    points: &[("strict", 8), ("moderate", 6), ("basic", 4)],
                    otherwise: 1,
                },
                Rule::Choice {
                    field: "disease_monitoring",
                    points: &[("daily", 8), ("weekly", 6), ("monthly", 4)],
                    otherwise: 1,
                },
                Rule::Choice {
                    field: "isolation_practices",
                    points: &[("excellent", 9), ("good", 7), ("fair", 4)],
                    otherwise: 1,
                },
            ],
        },
        CategoryRubric {
            category: Category::HygienePractices,
            ceiling: 20,
            rules: vec![
                Rule::Choice {
                    field: "disinfection_frequency",
                    points: &[("daily", 7), ("weekly", 5), ("monthly", 3)],
                    otherwise: 1,
                },
                Rule::Choice {
                    field: "personal_protective_equipment",
                    points: &[("full", 7), ("partial", 5), ("basic", 3)],
                    otherwise: 1,
                },
                Rule::Choice {
                    field: "visitor_control",
                    points: &[("strict", 6), ("moderate", 4), ("basic", 2)],
                    otherwise: 0,
                },
            ],
        },
        CategoryRubric {
            category: Category::FeedWater,
            ceiling: 15,
            rules: vec![
                Rule::Choice {
                    field: "feed_storage_security",
                    points: QUALITY_HIGH,
                    otherwise: 1,
                },
                Rule::Choice {
                    field: "water_source_protection",
                    points: &[("excellent", 7), ("good", 5), ("fair", 3)],
                    otherwise: 1,
                },
            ],
        },
        CategoryRubric {
            category: Category::PestControl,
            ceiling: 10,
            rules: vec![
                Rule::Choice {
                    field: "rodent_control",
                    points: PEST_CONTROL,
                    otherwise: 0,
                },
                Rule::Choice {
                    field: "insect_control",
                    points: PEST_CONTROL,
                    otherwise: 0,
                },
            ],
        },
        CategoryRubric {
            category: Category::TrainingDocumentation,
            ceiling: 5,
            rules: vec![
                Rule::Choice {
                    field: "staff_training",
                    points: &[("monthly", 3), ("quarterly", 2), ("biannual", 1)],
                    otherwise: 0,
                },
                Rule::Choice {
                    field: "protocol_documentation",
                    points: &[("comprehensive", 2), ("moderate", 1)],
                    otherwise: 0,
                },
                // Emergency readiness shares the training ceiling.
                Rule::Flag {
                    field: "emergency_plan",
                    points: 3,
                },
                Rule::Flag {
                    field: "veterinary_contact",
                    points: 2,
                },
            ],
        },
    ]
}
