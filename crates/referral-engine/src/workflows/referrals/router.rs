use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::catalog::PartnerCatalog;
use super::domain::{Buyer, NewReferral, ReferralId, ReferralOrigin, ReferralStatus};
use super::repository::{AuditLogWriter, NotificationDispatcher, ReferralRepository};
use super::service::{ReferralService, ReferralServiceError};

/// Router builder exposing the referral lifecycle endpoints.
pub fn referral_router<R, C, N, A>(service: Arc<ReferralService<R, C, N, A>>) -> Router
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    Router::new()
        .route("/api/v1/referrals", post(create_handler::<R, C, N, A>))
        .route(
            "/api/v1/referrals/statistics",
            get(statistics_handler::<R, C, N, A>),
        )
        .route(
            "/api/v1/referrals/alerts",
            get(alerts_handler::<R, C, N, A>),
        )
        .route(
            "/api/v1/referrals/sla/scan",
            post(scan_handler::<R, C, N, A>),
        )
        .route(
            "/api/v1/referrals/:referral_id",
            get(fetch_handler::<R, C, N, A>),
        )
        .route(
            "/api/v1/referrals/:referral_id/status",
            post(status_handler::<R, C, N, A>),
        )
        .route(
            "/api/v1/referrals/:referral_id/notes",
            put(notes_handler::<R, C, N, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct CreateReferralRequest {
    pub offer_id: String,
    pub partner_id: String,
    pub buyer_company: String,
    pub buyer_contact: String,
    pub origin: ReferralOrigin,
    pub success_fee_percent: u8,
    #[serde(default)]
    pub expected_value: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub target_status: ReferralStatus,
    #[serde(default)]
    pub won_value: Option<u64>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub threshold_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub partner_id: Option<String>,
}

fn error_response(err: ReferralServiceError) -> Response {
    let status = match &err {
        ReferralServiceError::Validation(_) | ReferralServiceError::MissingField(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ReferralServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ReferralServiceError::NotFound => StatusCode::NOT_FOUND,
        ReferralServiceError::Collaborator(_) => StatusCode::BAD_GATEWAY,
        ReferralServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    axum::Json(request): axum::Json<CreateReferralRequest>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    let new_referral = NewReferral {
        offer_id: super::catalog::OfferId(request.offer_id),
        partner_id: super::catalog::PartnerId(request.partner_id),
        buyer: Buyer {
            company: request.buyer_company,
            contact: request.buyer_contact,
        },
        origin: request.origin,
        success_fee_percent: request.success_fee_percent,
        expected_value: request.expected_value,
    };

    match service.create_referral(new_referral, Utc::now()) {
        Ok(referral) => (StatusCode::CREATED, axum::Json(referral.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn fetch_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    Path(referral_id): Path<String>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    match service.get(&ReferralId(referral_id)) {
        Ok(referral) => (StatusCode::OK, axum::Json(referral.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    Path(referral_id): Path<String>,
    axum::Json(request): axum::Json<StatusUpdateRequest>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    let actor = request.actor.as_deref().unwrap_or("manager");
    match service.update_status(
        &ReferralId(referral_id),
        request.target_status,
        request.won_value,
        actor,
        Utc::now(),
    ) {
        Ok(referral) => (StatusCode::OK, axum::Json(referral.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn notes_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    Path(referral_id): Path<String>,
    axum::Json(request): axum::Json<NotesRequest>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    match service.update_notes(&ReferralId(referral_id), &request.notes) {
        Ok(referral) => (StatusCode::OK, axum::Json(referral.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn statistics_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    Query(query): Query<StatisticsQuery>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    let scope = query.partner_id.map(super::catalog::PartnerId);
    match service.statistics(scope.as_ref()) {
        Ok(statistics) => (StatusCode::OK, axum::Json(statistics)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn alerts_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
    Query(query): Query<AlertsQuery>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    match service.follow_up_alerts(query.threshold_days, Utc::now()) {
        Ok(alerts) => (StatusCode::OK, axum::Json(alerts)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn scan_handler<R, C, N, A>(
    State(service): State<Arc<ReferralService<R, C, N, A>>>,
) -> Response
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    match service.run_sla_scan(Utc::now()) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}
