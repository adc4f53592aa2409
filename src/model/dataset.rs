//! Synthetic questionnaire generation and the labeled CSV format used for training.

use crate::assessment::{
    validate_map, AssessmentInput, FieldKind, FieldValue, RiskThresholds, RiskTier, Rubric,
    ValidationError, FIELDS,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const SCORE_COLUMN: &str = "biosecurity_score";
pub const RISK_COLUMN: &str = "risk_level";

const FARM_SIZE_RANGE: std::ops::Range<f64> = 1.0..500.0;
const LIVESTOCK_RANGE: std::ops::Range<u64> = 10..1000;

/// A validated answer sheet with its rubric labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub input: AssessmentInput,
    pub biosecurity_score: f64,
    pub risk: RiskTier,
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read or write dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dataset csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset is missing column {0}")]
    MissingColumn(String),
    #[error("row {row} failed validation: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: ValidationError,
    },
    #[error("row {row} has an invalid {column} value '{value}'")]
    InvalidLabel {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Deterministic for a given `(samples, seed)`; labels come from the standard rubric.
pub fn generate(samples: usize, seed: u64) -> Vec<TrainingRow> {
    generate_with(samples, seed, &Rubric::standard(), &RiskThresholds::default())
}

pub fn generate_with(
    samples: usize,
    seed: u64,
    rubric: &Rubric,
    thresholds: &RiskThresholds,
) -> Vec<TrainingRow> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..samples)
        .map(|_| {
            let values = FIELDS
                .iter()
                .map(|spec| match spec.kind {
                    FieldKind::Number => FieldValue::Number(rng.gen_range(FARM_SIZE_RANGE)),
                    FieldKind::Count => FieldValue::Count(rng.gen_range(LIVESTOCK_RANGE)),
                    FieldKind::Choice(domain) => {
                        FieldValue::Choice(domain[rng.gen_range(0..domain.len())])
                    }
                })
                .collect();
            label(AssessmentInput::from_values(values), rubric, thresholds)
        })
        .collect()
}

fn label(input: AssessmentInput, rubric: &Rubric, thresholds: &RiskThresholds) -> TrainingRow {
    let biosecurity_score = f64::from(rubric.score(&input).total);
    TrainingRow {
        risk: thresholds.classify(biosecurity_score),
        biosecurity_score,
        input,
    }
}

pub fn header() -> Vec<&'static str> {
    FIELDS
        .iter()
        .map(|spec| spec.name)
        .chain([SCORE_COLUMN, RISK_COLUMN])
        .collect()
}

pub fn write_csv<W: Write>(writer: W, rows: &[TrainingRow]) -> Result<(), DatasetError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(header())?;

    for row in rows {
        let mut record: Vec<String> = row
            .input
            .iter()
            .map(|(_, value)| match value {
                FieldValue::Number(number) => number.to_string(),
                FieldValue::Count(count) => count.to_string(),
                FieldValue::Choice(choice) => choice.to_string(),
            })
            .collect();
        record.push(row.biosecurity_score.to_string());
        record.push(row.risk.label().to_string());
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Reads labeled rows, validating every answer sheet; column order is free.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<TrainingRow>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| DatasetError::MissingColumn(column.to_string()))
    };
    let field_columns = FIELDS
        .iter()
        .map(|spec| position(spec.name))
        .collect::<Result<Vec<_>, _>>()?;
    let score_column = position(SCORE_COLUMN)?;
    let risk_column = position(RISK_COLUMN)?;

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let cell = |column: usize| record.get(column).unwrap_or_default();

        let raw: Map<String, Value> = FIELDS
            .iter()
            .zip(&field_columns)
            .map(|(spec, &column)| (spec.name.to_string(), cell_to_json(spec.kind, cell(column))))
            .collect();
        let input =
            validate_map(&raw).map_err(|source| DatasetError::InvalidRow { row, source })?;

        let score_text = cell(score_column);
        let biosecurity_score = score_text
            .parse::<f64>()
            .ok()
            .filter(|score| score.is_finite())
            .ok_or_else(|| DatasetError::InvalidLabel {
                row,
                column: SCORE_COLUMN,
                value: score_text.to_string(),
            })?;

        let risk_text = cell(risk_column);
        let risk = RiskTier::ALL
            .into_iter()
            .find(|tier| tier.label() == risk_text)
            .ok_or_else(|| DatasetError::InvalidLabel {
                row,
                column: RISK_COLUMN,
                value: risk_text.to_string(),
            })?;

        rows.push(TrainingRow {
            input,
            biosecurity_score,
            risk,
        });
    }

    Ok(rows)
}

/// Re-types a CSV cell so the validator sees what a JSON client would send.
fn cell_to_json(kind: FieldKind, cell: &str) -> Value {
    match kind {
        FieldKind::Choice(_) => Value::String(cell.to_string()),
        FieldKind::Number | FieldKind::Count => {
            if let Ok(count) = cell.parse::<u64>() {
                Value::from(count)
            } else if let Ok(signed) = cell.parse::<i64>() {
                Value::from(signed)
            } else {
                cell.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(cell.to_string()))
            }
        }
    }
}

pub fn save_csv(path: &Path, rows: &[TrainingRow]) -> Result<(), DatasetError> {
    write_csv(File::create(path)?, rows)
}

pub fn load_csv(path: &Path) -> Result<Vec<TrainingRow>, DatasetError> {
    read_csv(File::open(path)?)
}
