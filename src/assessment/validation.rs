use super::schema::{AssessmentInput, FieldKind, FieldSpec, FieldValue, FIELDS};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Field name used when the payload itself is malformed.
pub const INPUT_FIELD: &str = "input";

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    NotAnObject,
    Missing,
    NotANumber,
    Negative,
    NotAnInteger,
    NotInDomain {
        allowed: &'static [&'static str],
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub kind: IssueKind,
}

impl FieldIssue {
    fn new(field: &str, kind: IssueKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.kind {
            IssueKind::NotAnObject => write!(f, "assessment input must be a JSON object"),
            IssueKind::Missing => write!(f, "{field} is required"),
            IssueKind::NotANumber => write!(f, "{field} must be a number"),
            IssueKind::Negative => write!(f, "{field} must be zero or greater"),
            IssueKind::NotAnInteger => write!(f, "{field} must be a whole number"),
            IssueKind::NotInDomain { allowed, found } => write!(
                f,
                "{field} must be one of: {} (found {found})",
                allowed.join(", ")
            ),
        }
    }
}

impl Serialize for FieldIssue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct IssueView<'a> {
            field: &'a str,
            message: String,
        }

        IssueView {
            field: &self.field,
            message: self.to_string(),
        }
        .serialize(serializer)
    }
}

/// Every problem found in one pass over the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid assessment input: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    pub fn issue_for(&self, field: &str) -> Option<&FieldIssue> {
        self.issues.iter().find(|issue| issue.field == field)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn validate(raw: &Value) -> Result<AssessmentInput, ValidationError> {
    match raw {
        Value::Object(map) => validate_map(map),
        _ => Err(ValidationError {
            issues: vec![FieldIssue::new(INPUT_FIELD, IssueKind::NotAnObject)],
        }),
    }
}

/// Check presence, type and domain of every schema field; unknown keys are ignored.
pub fn validate_map(raw: &Map<String, Value>) -> Result<AssessmentInput, ValidationError> {
    let mut values = Vec::with_capacity(FIELDS.len());
    let mut issues = Vec::new();

    for spec in FIELDS.iter() {
        let outcome = match raw.get(spec.name) {
            None => Err(IssueKind::Missing),
            Some(value) => check_field(spec, value),
        };

        match outcome {
            Ok(value) => values.push(value),
            Err(kind) => issues.push(FieldIssue::new(spec.name, kind)),
        }
    }

    if issues.is_empty() {
        Ok(AssessmentInput::from_values(values))
    } else {
        Err(ValidationError { issues })
    }
}

fn check_field(spec: &FieldSpec, value: &Value) -> Result<FieldValue, IssueKind> {
    match spec.kind {
        FieldKind::Number => {
            let number = value.as_f64().ok_or(IssueKind::NotANumber)?;
            if number < 0.0 {
                return Err(IssueKind::Negative);
            }
            Ok(FieldValue::Number(number))
        }
        FieldKind::Count => {
            let Value::Number(number) = value else {
                return Err(IssueKind::NotANumber);
            };
            if let Some(count) = number.as_u64() {
                Ok(FieldValue::Count(count))
            } else if number.is_i64() || number.as_f64().is_some_and(|n| n < 0.0) {
                Err(IssueKind::Negative)
            } else {
                Err(IssueKind::NotAnInteger)
            }
        }
        FieldKind::Choice(domain) => {
            let found = value.as_str();
            found
                .and_then(|raw| domain.iter().copied().find(|allowed| *allowed == raw))
                .map(FieldValue::Choice)
                .ok_or_else(|| IssueKind::NotInDomain {
                    allowed: domain,
                    found: found
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string()),
                })
        }
    }
}
