//! Background acknowledgment-SLA enforcement.
//!
//! The monitor is a read-mostly scan over `sent` referrals with per-record
//! conditional writes: a manager acknowledging a referral in the same instant
//! wins the race, and the scan records a skip instead of an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::ReferralStatus;
use super::repository::{
    AuditEntry, AuditLogWriter, NotificationDispatcher, PartnerNotification, ReferralRepository,
    RepositoryError,
};
use super::transitions::{self, TransitionTrigger};

pub(crate) const SLA_SCAN_ACTOR: &str = "sla-monitor";

/// Result of one scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlaScanOutcome {
    /// Referrals in `sent` examined this pass.
    pub checked: usize,
    /// Referrals actually flipped to `overdue`.
    pub updated: usize,
}

pub(crate) struct SlaMonitor<R, N, A> {
    repository: Arc<R>,
    notifier: Arc<N>,
    audit: Arc<A>,
}

impl<R, N, A> SlaMonitor<R, N, A>
where
    R: ReferralRepository,
    N: NotificationDispatcher,
    A: AuditLogWriter,
{
    pub(crate) fn new(repository: Arc<R>, notifier: Arc<N>, audit: Arc<A>) -> Self {
        Self {
            repository,
            notifier,
            audit,
        }
    }

    /// Flip every `sent` referral whose acknowledgment deadline has elapsed
    /// to `overdue`.
    ///
    /// Idempotent: records already moved on (by a manager or an earlier pass)
    /// no longer show up as `sent`, and a record that changes between the
    /// listing and the conditional write is skipped, not failed. Only the
    /// initial listing can fail the scan wholesale.
    pub(crate) fn scan(&self, now: DateTime<Utc>) -> Result<SlaScanOutcome, RepositoryError> {
        let pending = self.repository.list_by_status(ReferralStatus::Sent)?;
        let checked = pending.len();
        let mut updated = 0;

        for referral in pending {
            if referral.ack_deadline >= now {
                continue;
            }

            let overdue = match transitions::apply(
                &referral,
                ReferralStatus::Overdue,
                None,
                TransitionTrigger::SlaScan,
                now,
            ) {
                Ok(overdue) => overdue,
                // The listing already filtered to `sent`; a failure here is
                // a logic error in the table, not a reason to abort the pass.
                Err(err) => {
                    warn!(referral_id = %referral.id.0, %err, "skipping untransitionable referral");
                    continue;
                }
            };

            match self
                .repository
                .apply_transition(ReferralStatus::Sent, overdue)
            {
                Ok(stored) => {
                    updated += 1;
                    if let Err(err) = self.audit.record(AuditEntry {
                        referral_id: stored.id.clone(),
                        from_status: ReferralStatus::Sent,
                        to_status: ReferralStatus::Overdue,
                        actor: SLA_SCAN_ACTOR.to_string(),
                        at: now,
                    }) {
                        warn!(referral_id = %stored.id.0, %err, "audit entry dropped");
                    }

                    let mut details = BTreeMap::new();
                    details.insert(
                        "ack_deadline".to_string(),
                        stored.ack_deadline.to_rfc3339(),
                    );
                    details.insert("partner_id".to_string(), stored.partner_id.0.clone());
                    if let Err(err) = self.notifier.dispatch(PartnerNotification {
                        template: "referral_overdue".to_string(),
                        referral_id: stored.id.clone(),
                        details,
                    }) {
                        warn!(referral_id = %stored.id.0, %err, "overdue notification dropped");
                    }
                }
                // Lost the race to a concurrent manual transition.
                Err(RepositoryError::Conflict) => continue,
                Err(err) => {
                    warn!(
                        referral_id = %referral.id.0,
                        %err,
                        "overdue flip failed, retrying next pass"
                    );
                }
            }
        }

        Ok(SlaScanOutcome { checked, updated })
    }
}
