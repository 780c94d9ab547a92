use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::catalog::{CatalogError, OfferId, PartnerCatalog, PartnerId};
use super::commission::{self, CommissionError};
use super::domain::{NewReferral, Referral, ReferralId, ReferralStatus};
use super::report::{self, FollowUpAlert, ReferralStatistics};
use super::repository::{
    AuditEntry, AuditLogWriter, NotificationDispatcher, PartnerNotification, ReferralRepository,
    RepositoryError,
};
use super::sla::{SlaMonitor, SlaScanOutcome};
use super::transitions::{self, TransitionError, TransitionTrigger};

/// Lifecycle timing applied by the service; normally sourced from
/// [`crate::config::ReferralConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ReferralSettings {
    pub ack_sla: Duration,
    pub follow_up_threshold_days: i64,
}

impl Default for ReferralSettings {
    fn default() -> Self {
        crate::config::ReferralConfig::default().into()
    }
}

impl From<crate::config::ReferralConfig> for ReferralSettings {
    fn from(config: crate::config::ReferralConfig) -> Self {
        Self {
            ack_sla: Duration::hours(config.ack_sla_hours),
            follow_up_threshold_days: config.follow_up_threshold_days,
        }
    }
}

/// Façade combining the store, catalog, state machine, SLA monitor, and
/// outbound ports. All timestamps come in as parameters; the service never
/// reads the wall clock itself.
pub struct ReferralService<R, C, N, A> {
    repository: Arc<R>,
    catalog: Arc<C>,
    notifier: Arc<N>,
    audit: Arc<A>,
    settings: ReferralSettings,
}

static REFERRAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_referral_id() -> ReferralId {
    let id = REFERRAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReferralId(format!("ref-{id:06}"))
}

impl<R, C, N, A> ReferralService<R, C, N, A>
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
{
    pub fn new(
        repository: Arc<R>,
        catalog: Arc<C>,
        notifier: Arc<N>,
        audit: Arc<A>,
        settings: ReferralSettings,
    ) -> Self {
        Self {
            repository,
            catalog,
            notifier,
            audit,
            settings,
        }
    }

    /// Route a new referral to a partner.
    ///
    /// Fails closed when the catalog cannot answer; an unresolved offer or
    /// partner id, an out-of-range percentage, a percentage off the offer's
    /// negotiated rate, or blank buyer fields are validation failures and
    /// nothing is stored.
    pub fn create_referral(
        &self,
        request: NewReferral,
        now: DateTime<Utc>,
    ) -> Result<Referral, ReferralServiceError> {
        if request.buyer.company.trim().is_empty() {
            return Err(ValidationIssue::MissingBuyerCompany.into());
        }
        if request.buyer.contact.trim().is_empty() {
            return Err(ValidationIssue::MissingBuyerContact.into());
        }
        commission::validate_percent(request.success_fee_percent)
            .map_err(ValidationIssue::from)?;

        let offer = self
            .catalog
            .resolve_offer(&request.offer_id)?
            .ok_or_else(|| ValidationIssue::UnknownOffer(request.offer_id.clone()))?;
        // The rate is negotiated per offer; a request quoting anything else
        // is stale or wrong.
        if request.success_fee_percent != offer.success_fee_percent {
            return Err(ValidationIssue::FeePercentMismatch {
                requested: request.success_fee_percent,
                negotiated: offer.success_fee_percent,
            }
            .into());
        }
        if self.catalog.resolve_partner(&request.partner_id)?.is_none() {
            return Err(ValidationIssue::UnknownPartner(request.partner_id).into());
        }

        let success_fee_expected = request
            .expected_value
            .map(|value| commission::success_fee(value, request.success_fee_percent))
            .transpose()
            .map_err(ValidationIssue::from)?;

        let referral = Referral {
            id: next_referral_id(),
            offer_id: request.offer_id,
            partner_id: request.partner_id,
            buyer: request.buyer,
            origin: request.origin,
            status: ReferralStatus::Sent,
            success_fee_percent: request.success_fee_percent,
            expected_value: request.expected_value,
            won_value: None,
            success_fee_expected,
            success_fee_realized: None,
            ack_deadline: now + self.settings.ack_sla,
            last_status_update: now,
            internal_notes: String::new(),
            created_at: now,
        };

        Ok(self.repository.insert(referral)?)
    }

    /// Apply a manager-driven status change through the state machine.
    ///
    /// A conditional-write conflict is retried once against the fresh record:
    /// if the concurrent winner already produced the requested status the
    /// call resolves as a no-op, otherwise the transition is re-applied from
    /// the fresh status, so a manual acknowledgment that loses the race to
    /// the SLA scan still lands as `overdue -> acked`. A fresh status that
    /// does not admit the target surfaces as an invalid transition from that
    /// status.
    pub fn update_status(
        &self,
        id: &ReferralId,
        target: ReferralStatus,
        won_value: Option<u64>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Referral, ReferralServiceError> {
        let current = self
            .repository
            .fetch(id)?
            .ok_or(ReferralServiceError::NotFound)?;

        let (stored, from) = match self.attempt_transition(&current, target, won_value, now) {
            Ok(outcome) => outcome,
            Err(ReferralServiceError::Repository(RepositoryError::Conflict)) => {
                let fresh = self
                    .repository
                    .fetch(id)?
                    .ok_or(ReferralServiceError::NotFound)?;
                if fresh.status == target {
                    return Ok(fresh);
                }
                match self.attempt_transition(&fresh, target, won_value, now) {
                    Ok(outcome) => outcome,
                    // Lost twice in a row; resolve against whatever won.
                    Err(ReferralServiceError::Repository(RepositoryError::Conflict)) => {
                        let latest = self
                            .repository
                            .fetch(id)?
                            .ok_or(ReferralServiceError::NotFound)?;
                        if latest.status == target {
                            return Ok(latest);
                        }
                        return Err(ReferralServiceError::InvalidTransition {
                            from: latest.status,
                            to: target,
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        if let Err(err) = self.audit.record(AuditEntry {
            referral_id: stored.id.clone(),
            from_status: from,
            to_status: target,
            actor: actor.to_string(),
            at: now,
        }) {
            warn!(referral_id = %stored.id.0, %err, "audit entry dropped");
        }

        Ok(stored)
    }

    /// One state-machine pass plus conditional write, reporting the status
    /// the transition was applied from.
    fn attempt_transition(
        &self,
        current: &Referral,
        target: ReferralStatus,
        won_value: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(Referral, ReferralStatus), ReferralServiceError> {
        let updated =
            transitions::apply(current, target, won_value, TransitionTrigger::Manual, now)?;
        let stored = self.repository.apply_transition(current.status, updated)?;
        Ok((stored, current.status))
    }

    /// Notes are metadata: always writable, never stamps
    /// `last_status_update`.
    pub fn update_notes(
        &self,
        id: &ReferralId,
        notes: &str,
    ) -> Result<Referral, ReferralServiceError> {
        match self.repository.save_notes(id, notes) {
            Ok(referral) => Ok(referral),
            Err(RepositoryError::NotFound) => Err(ReferralServiceError::NotFound),
            Err(other) => Err(other.into()),
        }
    }

    pub fn get(&self, id: &ReferralId) -> Result<Referral, ReferralServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ReferralServiceError::NotFound)
    }

    /// Aggregate dashboard statistics, over the whole referral set or scoped
    /// to a single partner.
    pub fn statistics(
        &self,
        scope: Option<&PartnerId>,
    ) -> Result<ReferralStatistics, ReferralServiceError> {
        let mut referrals = self.repository.list()?;
        if let Some(partner_id) = scope {
            referrals.retain(|referral| &referral.partner_id == partner_id);
        }
        Ok(report::compute_statistics(&referrals))
    }

    /// Non-terminal referrals without a status change for longer than the
    /// threshold (service default when `None`), oldest first. Each alert
    /// emits a best-effort notification.
    pub fn follow_up_alerts(
        &self,
        threshold_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FollowUpAlert>, ReferralServiceError> {
        let threshold = threshold_days.unwrap_or(self.settings.follow_up_threshold_days);
        let referrals = self.repository.list()?;
        let alerts = report::compute_follow_up_alerts(&referrals, threshold, now);

        for alert in &alerts {
            let mut details = BTreeMap::new();
            details.insert(
                "days_since_update".to_string(),
                alert.days_since_update.to_string(),
            );
            details.insert("status".to_string(), alert.referral.status.to_string());
            if let Err(err) = self.notifier.dispatch(PartnerNotification {
                template: "follow_up_due".to_string(),
                referral_id: alert.referral.id.clone(),
                details,
            }) {
                warn!(referral_id = %alert.referral.id.0, %err, "follow-up notification dropped");
            }
        }

        Ok(alerts)
    }

    /// Run one SLA scan pass over the store.
    pub fn run_sla_scan(&self, now: DateTime<Utc>) -> Result<SlaScanOutcome, ReferralServiceError> {
        let monitor = SlaMonitor::new(
            self.repository.clone(),
            self.notifier.clone(),
            self.audit.clone(),
        );
        Ok(monitor.scan(now)?)
    }
}

/// Error raised by the referral service.
#[derive(Debug, thiserror::Error)]
pub enum ReferralServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationIssue),
    #[error("no transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ReferralStatus,
        to: ReferralStatus,
    },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("referral not found")]
    NotFound,
    #[error("collaborator unavailable: {0}")]
    Collaborator(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Creation-time validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationIssue {
    #[error("buyer company is required")]
    MissingBuyerCompany,
    #[error("buyer contact is required")]
    MissingBuyerContact,
    #[error("offer {0} does not resolve in the catalog")]
    UnknownOffer(OfferId),
    #[error("partner {0} does not resolve in the directory")]
    UnknownPartner(PartnerId),
    #[error("success fee percent {requested} is off the offer's negotiated rate {negotiated}")]
    FeePercentMismatch { requested: u8, negotiated: u8 },
    #[error("won_value must be greater than zero")]
    WonValueNotPositive,
    #[error(transparent)]
    Commission(#[from] CommissionError),
}

impl From<TransitionError> for ReferralServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal { from, to } => Self::InvalidTransition { from, to },
            TransitionError::MissingWonValue => Self::MissingField("won_value"),
            TransitionError::WonValueNotPositive => {
                Self::Validation(ValidationIssue::WonValueNotPositive)
            }
            TransitionError::Commission(err) => Self::Validation(ValidationIssue::Commission(err)),
        }
    }
}
