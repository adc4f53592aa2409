use crate::assessment::{AssessmentInput, FieldValue, FIELDS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Closed vocabulary for one categorical field; codes follow sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    vocabulary: Vec<String>,
}

impl CategoricalEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let vocabulary: BTreeSet<&str> = values.into_iter().collect();
        Self {
            vocabulary: vocabulary.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn code(&self, value: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|known| known.as_str().cmp(value))
            .ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("{field} value '{value}' was not seen during training (known values: {})", .known.join(", "))]
    UnseenValue {
        field: String,
        value: String,
        known: Vec<String>,
    },
    #[error("model feature {0} does not match the assessment schema")]
    SchemaMismatch(String),
}

/// Turns validated input into an ordered numeric feature row.
///
/// Fit once on training data and reused unchanged at inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    feature_names: Vec<String>,
    encoders: BTreeMap<String, CategoricalEncoder>,
}

impl FeatureEncoder {
    pub fn fit(rows: &[AssessmentInput]) -> Self {
        let mut encoders = BTreeMap::new();
        for spec in FIELDS.iter().filter(|spec| spec.domain().is_some()) {
            let observed = rows.iter().filter_map(|row| row.choice(spec.name));
            encoders.insert(spec.name.to_string(), CategoricalEncoder::fit(observed));
        }

        Self {
            feature_names: FIELDS.iter().map(|spec| spec.name.to_string()).collect(),
            encoders,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(field)
    }

    pub fn encode(&self, input: &AssessmentInput) -> Result<Vec<f64>, EncodingError> {
        self.feature_names
            .iter()
            .map(|name| {
                let value = input
                    .get(name)
                    .ok_or_else(|| EncodingError::SchemaMismatch(name.clone()))?;
                match (value, self.encoders.get(name)) {
                    (FieldValue::Choice(choice), Some(encoder)) => encoder
                        .code(choice)
                        .map(|code| code as f64)
                        .ok_or_else(|| EncodingError::UnseenValue {
                            field: name.clone(),
                            value: choice.to_string(),
                            known: encoder.vocabulary().to_vec(),
                        }),
                    (FieldValue::Number(_) | FieldValue::Count(_), None) => value
                        .as_f64()
                        .ok_or_else(|| EncodingError::SchemaMismatch(name.clone())),
                    _ => Err(EncodingError::SchemaMismatch(name.clone())),
                }
            })
            .collect()
    }

    pub fn encode_all(&self, rows: &[AssessmentInput]) -> Result<Vec<Vec<f64>>, EncodingError> {
        rows.iter().map(|row| self.encode(row)).collect()
    }
}
