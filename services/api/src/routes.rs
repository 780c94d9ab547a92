use std::io::Cursor;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::Utc;
use referral_engine::error::AppError;
use referral_engine::workflows::leads::import_leads;
use referral_engine::workflows::referrals::{referral_router, ReferralId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::infra::{AppReferralService, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct LeadImportRequest {
    pub(crate) leads_csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LeadImportResponse {
    pub(crate) created: Vec<ReferralId>,
    pub(crate) rejected: Vec<RejectedLead>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RejectedLead {
    pub(crate) row: usize,
    pub(crate) reason: String,
}

pub(crate) fn with_referral_routes(service: Arc<AppReferralService>) -> axum::Router {
    referral_router(Arc::clone(&service))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/leads/import",
            axum::routing::post(lead_import_endpoint),
        )
        .layer(Extension(service))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
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

pub(crate) async fn lead_import_endpoint(
    Extension(service): Extension<Arc<AppReferralService>>,
    Json(payload): Json<LeadImportRequest>,
) -> Result<Json<LeadImportResponse>, AppError> {
    let reader = Cursor::new(payload.leads_csv.into_bytes());
    let outcome = import_leads(&service, reader, Utc::now())?;

    Ok(Json(LeadImportResponse {
        created: outcome.created,
        rejected: outcome
            .rejected
            .into_iter()
            .map(|(row, reason)| RejectedLead { row, reason })
            .collect(),
    }))
}
