use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};

pub const QUALITY: &[&str] = &["excellent", "good", "fair", "poor"];
pub const YES_NO: &[&str] = &["yes", "no"];
pub const PROTOCOL_LEVEL: &[&str] = &["strict", "moderate", "basic", "none"];
pub const FREQUENCY: &[&str] = &["daily", "weekly", "monthly", "rarely"];
pub const PROTECTIVE_EQUIPMENT: &[&str] = &["full", "partial", "basic", "none"];
pub const TRAINING_CADENCE: &[&str] = &["monthly", "quarterly", "biannual", "annual"];
pub const DOCUMENTATION: &[&str] = &["comprehensive", "moderate", "basic", "none"];

/// Shape of a questionnaire answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-negative real number.
    Number,
    /// Non-negative whole number.
    Count,
    /// Member of a closed vocabulary, listed best answer first.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

impl FieldSpec {
    pub fn domain(&self) -> Option<&'static [&'static str]> {
        match self.kind {
            FieldKind::Choice(domain) => Some(domain),
            FieldKind::Number | FieldKind::Count => None,
        }
    }
}

const fn choice(
    name: &'static str,
    domain: &'static [&'static str],
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Choice(domain),
        description,
    }
}

/// Every required questionnaire field, in feature order.
pub static FIELDS: [FieldSpec; 20] = [
    FieldSpec {
        name: "farm_size_acres",
        kind: FieldKind::Number,
        description: "Farm size in acres (positive number)",
    },
    choice(
        "fencing_quality",
        QUALITY,
        "Quality of farm fencing (excellent/good/fair/poor)",
    ),
    choice(
        "biosecurity_gates",
        YES_NO,
        "Presence of biosecurity gates (yes/no)",
    ),
    choice(
        "quarantine_facility",
        YES_NO,
        "Presence of quarantine facility (yes/no)",
    ),
    choice(
        "vehicle_wash_station",
        YES_NO,
        "Presence of vehicle wash station (yes/no)",
    ),
    FieldSpec {
        name: "livestock_count",
        kind: FieldKind::Count,
        description: "Number of livestock (positive integer)",
    },
    choice(
        "vaccination_protocol",
        PROTOCOL_LEVEL,
        "Vaccination protocol level (strict/moderate/basic/none)",
    ),
    choice(
        "disease_monitoring",
        FREQUENCY,
        "Disease monitoring frequency (daily/weekly/monthly/rarely)",
    ),
    choice(
        "isolation_practices",
        QUALITY,
        "Isolation practices quality (excellent/good/fair/poor)",
    ),
    choice(
        "disinfection_frequency",
        FREQUENCY,
        "Disinfection frequency (daily/weekly/monthly/rarely)",
    ),
    choice(
        "personal_protective_equipment",
        PROTECTIVE_EQUIPMENT,
        "PPE level (full/partial/basic/none)",
    ),
    choice(
        "visitor_control",
        PROTOCOL_LEVEL,
        "Visitor control level (strict/moderate/basic/none)",
    ),
    choice(
        "feed_storage_security",
        QUALITY,
        "Feed storage security (excellent/good/fair/poor)",
    ),
    choice(
        "water_source_protection",
        QUALITY,
        "Water source protection (excellent/good/fair/poor)",
    ),
    choice(
        "rodent_control",
        QUALITY,
        "Rodent control quality (excellent/good/fair/poor)",
    ),
    choice(
        "insect_control",
        QUALITY,
        "Insect control quality (excellent/good/fair/poor)",
    ),
    choice(
        "staff_training",
        TRAINING_CADENCE,
        "Staff training frequency (monthly/quarterly/biannual/annual)",
    ),
    choice(
        "protocol_documentation",
        DOCUMENTATION,
        "Protocol documentation level (comprehensive/moderate/basic/none)",
    ),
    choice(
        "emergency_plan",
        YES_NO,
        "Presence of emergency plan (yes/no)",
    ),
    choice(
        "veterinary_contact",
        YES_NO,
        "Veterinary contact availability (yes/no)",
    ),
];

pub fn field_index(name: &str) -> Option<usize> {
    FIELDS.iter().position(|spec| spec.name == name)
}

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.name == name)
}

/// A single type-normalized answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Count(u64),
    /// Canonical vocabulary entry borrowed from the schema.
    Choice(&'static str),
}

impl FieldValue {
    pub fn as_choice(&self) -> Option<&'static str> {
        match self {
            FieldValue::Choice(value) => Some(value),
            FieldValue::Number(_) | FieldValue::Count(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Count(value) => Some(*value as f64),
            FieldValue::Choice(_) => None,
        }
    }

    fn to_json(self) -> Value {
        match self {
            FieldValue::Number(value) => Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Count(value) => Value::Number(value.into()),
            FieldValue::Choice(value) => Value::String(value.to_string()),
        }
    }
}

/// Validated questionnaire; one value per entry of [`FIELDS`], same order.
///
/// Only the validator builds these, so every value is present and in domain.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentInput {
    values: Vec<FieldValue>,
}

impl AssessmentInput {
    pub(crate) fn from_values(values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(values.len(), FIELDS.len());
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<FieldValue> {
        field_index(name).map(|index| self.values[index])
    }

    pub fn choice(&self, name: &str) -> Option<&'static str> {
        self.get(name).and_then(|value| value.as_choice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldSpec, FieldValue)> + '_ {
        FIELDS.iter().zip(self.values.iter().copied())
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.iter()
            .map(|(spec, value)| (spec.name.to_string(), value.to_json()))
            .collect()
    }
}

impl Serialize for AssessmentInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (spec, value) in self.iter() {
            map.serialize_entry(spec.name, &value.to_json())?;
        }
        map.end()
    }
}

/// The reference answer sheet served to clients as an example payload.
pub fn sample_input() -> Map<String, Value> {
    let sample = serde_json::json!({
        "farm_size_acres": 100,
        "fencing_quality": "good",
        "biosecurity_gates": "yes",
        "quarantine_facility": "yes",
        "vehicle_wash_station": "no",
        "livestock_count": 200,
        "vaccination_protocol": "moderate",
        "disease_monitoring": "weekly",
        "isolation_practices": "good",
        "disinfection_frequency": "weekly",
        "personal_protective_equipment": "partial",
        "visitor_control": "moderate",
        "feed_storage_security": "good",
        "water_source_protection": "good",
        "rodent_control": "good",
        "insect_control": "fair",
        "staff_training": "quarterly",
        "protocol_documentation": "moderate",
        "emergency_plan": "yes",
        "veterinary_contact": "yes"
    });

    match sample {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique() {
        let names: HashSet<&str> = FIELDS.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), FIELDS.len());
    }

    #[test]
    fn sample_input_covers_every_field() {
        let sample = sample_input();
        for spec in FIELDS.iter() {
            assert!(sample.contains_key(spec.name), "{} missing", spec.name);
        }
        assert_eq!(sample.len(), FIELDS.len());
    }

    #[test]
    fn choice_domains_are_non_empty_and_distinct() {
        for spec in FIELDS.iter() {
            if let Some(domain) = spec.domain() {
                let distinct: HashSet<&&str> = domain.iter().collect();
                assert!(!domain.is_empty());
                assert_eq!(distinct.len(), domain.len(), "{}", spec.name);
            }
        }
    }
}
