use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use estate_leads::config::AppConfig;
use estate_leads::error::AppError;
use estate_leads::leads::{InMemoryCrmStore, LeadService, NotificationDispatcher};
use estate_leads::telemetry;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{seed_development_tenant, AppState, LoggingAlertTransport};
use crate::routes::with_operational_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryCrmStore::default());
    if let Some(tenant) = config.seed_tenant.as_deref() {
        let agency = seed_development_tenant(&store, tenant);
        tracing::debug!(tenant = %agency.0, "seeded trial subscription");
    }
    let alerts = Arc::new(LoggingAlertTransport);
    let service = Arc::new(LeadService::new(store.clone(), alerts));
    let dispatcher = Arc::new(NotificationDispatcher::new(store));

    let app = with_operational_routes(service, dispatcher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead lifecycle engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
