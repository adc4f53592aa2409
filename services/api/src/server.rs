use crate::cli::ServeArgs;
use crate::infra::{load_bundle, AppState};
use crate::routes::assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use farm_biosecurity::assessment::{AssessmentService, ModelHandle};
use farm_biosecurity::config::AppConfig;
use farm_biosecurity::error::AppError;
use farm_biosecurity::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let bundle = load_bundle(&config.model.bundle_path)?;
    let service = Arc::new(AssessmentService::with_handle(
        config.model.policy,
        ModelHandle::new(bundle),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        service,
        training: Arc::new(config.training.clone()),
        limits: config.training_limits,
        bundle_path: Arc::new(config.model.bundle_path.clone()),
    };

    let app = assessment_routes()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        policy = config.model.policy.as_str(),
        "biosecurity assessment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
