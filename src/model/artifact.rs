use super::encoding::{EncodingError, FeatureEncoder};
use super::estimators::{to_matrix, EstimatorFamily, Regressor};
use super::selection::TrainingReport;
use crate::assessment::{AssessmentInput, MAX_SCORE};
use aprender::error::AprenderError;
use aprender::preprocessing::StandardScaler;
use aprender::traits::{Estimator, Transformer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 8] = b"BIOSECML";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model bundle i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("model bundle payload is corrupt: {0}")]
    Codec(#[from] bincode::Error),
    #[error("file is not a biosecurity model bundle")]
    BadMagic,
    #[error("model bundle format version {found} is not supported (expected {})", FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("model bundle is inconsistent: {0}")]
    Inconsistent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("feature transform failed: {0}")]
    Transform(#[from] AprenderError),
    #[error("model produced a non-finite score ({0})")]
    NonFinite(f64),
}

/// Everything inference needs, frozen at the end of a training run.
///
/// Construction and decoding both check that the scaler matches the
/// family and that the estimator is fitted for the encoder's width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    estimator: Regressor,
    encoder: FeatureEncoder,
    scaler: Option<StandardScaler>,
    report: TrainingReport,
    trained_at: DateTime<Utc>,
}

impl ModelBundle {
    pub fn new(
        estimator: Regressor,
        encoder: FeatureEncoder,
        scaler: Option<StandardScaler>,
        report: TrainingReport,
        trained_at: DateTime<Utc>,
    ) -> Result<Self, ArtifactError> {
        let bundle = Self {
            estimator,
            encoder,
            scaler,
            report,
            trained_at,
        };
        bundle.check()?;
        Ok(bundle)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        let family = self.family();
        let width = self.encoder.feature_names().len();

        if self.report.selected != family {
            return Err(ArtifactError::Inconsistent(format!(
                "report selected {} but the estimator is {}",
                self.report.selected.key(),
                family.key()
            )));
        }
        match (&self.scaler, family.requires_scaling()) {
            (None, true) => {
                return Err(ArtifactError::Inconsistent(format!(
                    "{} needs a feature scaler",
                    family.key()
                )))
            }
            (Some(_), false) => {
                return Err(ArtifactError::Inconsistent(format!(
                    "{} is served on raw features but a scaler is attached",
                    family.key()
                )))
            }
            (Some(scaler), true) if !scaler.is_fitted() || scaler.mean().len() != width => {
                return Err(ArtifactError::Inconsistent(format!(
                    "scaler is not fitted for {width} features"
                )))
            }
            _ => {}
        }
        self.estimator
            .check_fitted(width)
            .map_err(ArtifactError::Inconsistent)
    }

    pub fn family(&self) -> EstimatorFamily {
        self.estimator.family()
    }

    pub fn feature_names(&self) -> &[String] {
        self.encoder.feature_names()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Score in `[0, MAX_SCORE]`; unseen answers and non-finite output are errors.
    pub fn predict(&self, input: &AssessmentInput) -> Result<f64, PredictError> {
        let features = to_matrix(&[self.encoder.encode(input)?])?;
        let features = match &self.scaler {
            Some(scaler) => scaler.transform(&features)?,
            None => features,
        };

        let raw = self
            .estimator
            .predict(&features)
            .as_slice()
            .first()
            .map_or(f64::NAN, |&value| f64::from(value));
        if !raw.is_finite() {
            return Err(PredictError::NonFinite(raw));
        }
        Ok(raw.clamp(0.0, f64::from(MAX_SCORE)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ArtifactError::BadMagic);
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let found = u32::from_le_bytes(version);
        if found != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion { found });
        }

        let bundle: Self = bincode::deserialize(&bytes[HEADER_LEN..])?;
        bundle.check()?;
        Ok(bundle)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::from_bytes(&fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dataset::generate;
    use crate::model::selection::{train, TrainingOptions};
    use aprender::primitives::{Matrix, Vector};
    use aprender::tree::DecisionTreeRegressor;

    fn small_bundle(family: EstimatorFamily) -> ModelBundle {
        let options = TrainingOptions {
            folds: 2,
            families: vec![family],
            ..TrainingOptions::default()
        };
        train(&generate(80, 4), &options).expect("training succeeds")
    }

    /// Re-encodes `bundle` with its estimator swapped, skipping construction checks.
    fn bytes_with(
        bundle: &ModelBundle,
        estimator: Regressor,
        scaler: Option<StandardScaler>,
    ) -> Vec<u8> {
        ModelBundle {
            estimator,
            encoder: bundle.encoder.clone(),
            scaler,
            report: bundle.report.clone(),
            trained_at: bundle.trained_at,
        }
        .to_bytes()
        .expect("encode")
    }

    #[test]
    fn bytes_round_trip_exactly() {
        let bundle = small_bundle(EstimatorFamily::NearestNeighbors);
        let bytes = bundle.to_bytes().expect("encode");
        let restored = ModelBundle::from_bytes(&bytes).expect("decode");

        assert_eq!(restored.to_bytes().expect("re-encode"), bytes);
        assert_eq!(restored.report(), bundle.report());
        assert!(restored.scaler().is_some());
    }

    #[test]
    fn rejects_foreign_and_future_payloads() {
        assert!(matches!(
            ModelBundle::from_bytes(b"not a model"),
            Err(ArtifactError::BadMagic)
        ));

        let mut bytes = small_bundle(EstimatorFamily::RidgeRegression)
            .to_bytes()
            .expect("encode");
        bytes[MAGIC.len()..HEADER_LEN].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            ModelBundle::from_bytes(&bytes),
            Err(ArtifactError::UnsupportedVersion { found: 7 })
        ));
    }

    #[test]
    fn truncated_payload_is_a_codec_error() {
        let bytes = small_bundle(EstimatorFamily::RidgeRegression)
            .to_bytes()
            .expect("encode");
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ModelBundle::from_bytes(truncated),
            Err(ArtifactError::Codec(_))
        ));
    }

    #[test]
    fn predictions_are_clamped_to_the_score_range() {
        let bundle = small_bundle(EstimatorFamily::LinearRegression);
        for row in generate(40, 99) {
            let score = bundle.predict(&row.input).expect("predict");
            assert!((0.0..=100.0).contains(&score));
        }
        assert!(bundle.scaler().is_none());
    }

    #[test]
    fn scaled_family_without_a_scaler_is_rejected() {
        let bundle = small_bundle(EstimatorFamily::NearestNeighbors);
        let err = ModelBundle::new(
            bundle.estimator.clone(),
            bundle.encoder.clone(),
            None,
            bundle.report.clone(),
            bundle.trained_at,
        )
        .expect_err("scaler is required");
        assert!(matches!(err, ArtifactError::Inconsistent(_)));

        let bytes = bytes_with(&bundle, bundle.estimator.clone(), None);
        assert!(matches!(
            ModelBundle::from_bytes(&bytes),
            Err(ArtifactError::Inconsistent(_))
        ));
    }

    #[test]
    fn unscaled_family_with_a_scaler_is_rejected() {
        let scaled = small_bundle(EstimatorFamily::NearestNeighbors);
        let ridge = small_bundle(EstimatorFamily::RidgeRegression);
        let bytes = bytes_with(&ridge, ridge.estimator.clone(), scaled.scaler.clone());
        assert!(matches!(
            ModelBundle::from_bytes(&bytes),
            Err(ArtifactError::Inconsistent(_))
        ));
    }

    #[test]
    fn decoded_tree_must_be_fitted_and_inside_the_feature_width() {
        let bundle = small_bundle(EstimatorFamily::RegressionTree);
        let width = bundle.feature_names().len();

        let unfitted = bytes_with(&bundle, Regressor::Tree(DecisionTreeRegressor::new()), None);
        assert!(matches!(
            ModelBundle::from_bytes(&unfitted),
            Err(ArtifactError::Inconsistent(_))
        ));

        // Only the column past the encoder's width carries signal.
        let wide = width + 1;
        let mut data = Vec::new();
        let mut targets = Vec::new();
        for row in 0..20 {
            let signal = (row % 2) as f32;
            data.extend(std::iter::repeat(1.0).take(width));
            data.push(signal);
            targets.push(signal * 10.0);
        }
        let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
        tree.fit(
            &Matrix::from_vec(20, wide, data).expect("wide matrix"),
            &Vector::from_vec(targets),
        )
        .expect("fit");

        let out_of_range = bytes_with(&bundle, Regressor::Tree(tree), None);
        match ModelBundle::from_bytes(&out_of_range) {
            Err(ArtifactError::Inconsistent(reason)) => {
                assert!(reason.contains("feature"), "{reason}")
            }
            other => panic!("expected an inconsistent bundle, got {other:?}"),
        }
    }

    #[test]
    fn report_must_name_the_stored_family() {
        let tree = small_bundle(EstimatorFamily::RegressionTree);
        let ridge = small_bundle(EstimatorFamily::RidgeRegression);
        let bytes = bytes_with(&tree, ridge.estimator.clone(), None);
        assert!(matches!(
            ModelBundle::from_bytes(&bytes),
            Err(ArtifactError::Inconsistent(_))
        ));
    }
}
