use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use referral_engine::config::AppConfig;
use referral_engine::error::AppError;
use referral_engine::telemetry;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::infra::{build_service, AppReferralService, AppState};
use crate::routes::with_referral_routes;

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

    let service = build_service(config.referrals.into());
    spawn_sla_scanner(Arc::clone(&service), config.referrals.scan_interval_secs);

    let app = with_referral_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "referral settlement engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Background loop flipping acknowledgment-expired referrals to overdue.
fn spawn_sla_scanner(service: Arc<AppReferralService>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match service.run_sla_scan(Utc::now()) {
                Ok(outcome) => {
                    if outcome.updated > 0 {
                        info!(
                            checked = outcome.checked,
                            updated = outcome.updated,
                            "sla scan flipped overdue referrals"
                        );
                    }
                }
                Err(err) => warn!(%err, "sla scan failed"),
            }
        }
    });
}
