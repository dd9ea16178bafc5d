use crate::cli::ServeArgs;
use crate::infra::{
    AppState, FileSystemDocumentStore, InMemoryIdentityProvider, InMemoryLeadRepository,
    InMemoryTeacherRepository,
};
use crate::routes::{with_platform_routes, PlatformServices};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tutor_market::config::AppConfig;
use tutor_market::error::AppError;
use tutor_market::security::SlidingWindowRateLimiter;
use tutor_market::telemetry;
use tutor_market::workflows::applications::{
    IntakeSettings, StaffAccess, TeacherApplicationService,
};
use tutor_market::workflows::leads::LeadService;
use tutor_market::workflows::sign_in::SignInLinkService;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let identity = Arc::new(InMemoryIdentityProvider::default());
    let applications = Arc::new(TeacherApplicationService::new(
        Arc::new(InMemoryTeacherRepository::default()),
        identity.clone(),
        Arc::new(FileSystemDocumentStore::new(&config.intake.document_root)),
        IntakeSettings::from(&config.intake),
    ));

    let staff = match config.security.staff_token.as_deref() {
        Some(token) => StaffAccess::with_token(token),
        None => {
            warn!("APP_STAFF_TOKEN is not set; review endpoints are open");
            StaffAccess::open()
        }
    };

    let limiter = Arc::new(SlidingWindowRateLimiter::new(
        config.security.sign_in_max_attempts,
        Duration::from_secs(config.security.sign_in_window_secs),
    ));
    let sign_in = Arc::new(SignInLinkService::new(
        identity,
        limiter,
        config.intake.dashboard_url.clone(),
    ));
    let leads = Arc::new(LeadService::new(Arc::new(
        InMemoryLeadRepository::default(),
    )));

    let app = with_platform_routes(PlatformServices {
        applications,
        staff,
        leads,
        sign_in,
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        document_root = %config.intake.document_root.display(),
        "tutor marketplace intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
