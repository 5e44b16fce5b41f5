use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_planning_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sales_intel::config::AppConfig;
use sales_intel::error::AppError;
use sales_intel::telemetry;
use sales_intel::workflows::prioritization::ActionPlanner;
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

    let planner_defaults = config.planner.planner_config();
    ActionPlanner::new(planner_defaults.clone())?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_planning_routes(Arc::new(planner_defaults))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        budget = config.planner.budget,
        cap = config.planner.per_customer_cap,
        "sales action planner ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
