use farm_biosecurity::assessment::AssessmentService;
use farm_biosecurity::config::TrainingLimits;
use farm_biosecurity::error::AppError;
use farm_biosecurity::model::{ArtifactError, ModelBundle, TrainingOptions};
use metrics_exporter_prometheus::PrometheusHandle;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) service: Arc<AssessmentService>,
    pub(crate) training: Arc<TrainingOptions>,
    pub(crate) limits: TrainingLimits,
    pub(crate) bundle_path: Arc<PathBuf>,
}

/// Reads the serving bundle if one exists; a missing file is not an error.
pub(crate) fn load_bundle(path: &Path) -> Result<Option<ModelBundle>, AppError> {
    match ModelBundle::load(path) {
        Ok(bundle) => {
            info!(
                path = %path.display(),
                family = bundle.family().key(),
                trained_at = %bundle.trained_at(),
                "model bundle loaded"
            );
            Ok(Some(bundle))
        }
        Err(ArtifactError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "no model bundle found; scoring with the rubric");
            Ok(None)
        }
        Err(err) => Err(AppError::from(err)),
    }
}
