use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use farm_biosecurity::assessment::{
    sample_input, AssessmentError, AssessmentReport, FieldKind, FIELDS,
};
use farm_biosecurity::error::AppError;
use farm_biosecurity::model::{EstimatorFamily, TrainingOptions, TrainingReport, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn assessment_routes() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/assessments", post(assessment_endpoint))
        .route("/api/v1/assessments/sample", get(sample_endpoint))
        .route("/api/v1/model", get(model_endpoint))
        .route("/api/v1/model/train", post(train_endpoint))
}

pub(crate) async fn healthcheck(Extension(state): Extension<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": state.service.model().is_loaded(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn assessment_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<AssessmentReport>, AppError> {
    let report = state.service.score(&payload)?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub(crate) struct FieldView {
    pub(crate) name: &'static str,
    pub(crate) kind: &'static str,
    pub(crate) description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) allowed: Option<&'static [&'static str]>,
}

pub(crate) async fn sample_endpoint() -> Json<Value> {
    let fields: Vec<FieldView> = FIELDS
        .iter()
        .map(|spec| FieldView {
            name: spec.name,
            kind: match spec.kind {
                FieldKind::Number => "number",
                FieldKind::Count => "integer",
                FieldKind::Choice(_) => "choice",
            },
            description: spec.description,
            allowed: spec.domain(),
        })
        .collect();

    Json(json!({
        "sample": sample_input(),
        "fields": fields,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct ModelView {
    pub(crate) family: EstimatorFamily,
    pub(crate) label: &'static str,
    pub(crate) feature_names: Vec<String>,
    pub(crate) trained_at: DateTime<Utc>,
    pub(crate) format_version: u32,
    pub(crate) report: TrainingReport,
}

pub(crate) async fn model_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<ModelView>, AppError> {
    let bundle = state
        .service
        .model()
        .snapshot()
        .ok_or_else(|| AssessmentError::ModelUnavailable {
            reason: "no model has been trained or loaded".to_string(),
        })?;

    Ok(Json(ModelView {
        family: bundle.family(),
        label: bundle.family().label(),
        feature_names: bundle.feature_names().to_vec(),
        trained_at: bundle.trained_at(),
        format_version: FORMAT_VERSION,
        report: bundle.report().clone(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TrainRequest {
    #[serde(default)]
    pub(crate) samples: Option<usize>,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
    #[serde(default)]
    pub(crate) folds: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TrainResponse {
    pub(crate) family: EstimatorFamily,
    pub(crate) trained_at: DateTime<Utc>,
    pub(crate) persisted_to: String,
    pub(crate) report: TrainingReport,
}

pub(crate) async fn train_endpoint(
    Extension(state): Extension<AppState>,
    request: Option<Json<TrainRequest>>,
) -> Result<Json<TrainResponse>, AppError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let defaults = state.training.as_ref();
    let options = TrainingOptions {
        samples: request.samples.unwrap_or(defaults.samples),
        seed: request.seed.unwrap_or(defaults.seed),
        folds: request.folds.unwrap_or(defaults.folds),
        ..defaults.clone()
    };
    state.limits.check(&options).map_err(AppError::BadRequest)?;

    let service = Arc::clone(&state.service);
    let path = Arc::clone(&state.bundle_path);
    let bundle =
        tokio::task::spawn_blocking(move || service.retrain(&options, Some(path.as_path())))
            .await
            .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::Other, err)))??;

    Ok(Json(TrainResponse {
        family: bundle.family(),
        trained_at: bundle.trained_at(),
        persisted_to: state.bundle_path.display().to_string(),
        report: bundle.report().clone(),
    }))
}
