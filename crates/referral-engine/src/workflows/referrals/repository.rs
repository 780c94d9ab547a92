use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Referral, ReferralId, ReferralStatus};

/// Storage abstraction for referrals.
///
/// Status mutation goes exclusively through [`apply_transition`], a
/// conditional write: the store must compare the persisted status against
/// `expected_from` and refuse with [`RepositoryError::Conflict`] when another
/// transition got there first. That is what serializes a concurrent manual
/// acknowledgment against the SLA scan.
///
/// [`apply_transition`]: ReferralRepository::apply_transition
pub trait ReferralRepository: Send + Sync {
    fn insert(&self, referral: Referral) -> Result<Referral, RepositoryError>;
    fn fetch(&self, id: &ReferralId) -> Result<Option<Referral>, RepositoryError>;
    fn list(&self) -> Result<Vec<Referral>, RepositoryError>;
    fn list_by_status(&self, status: ReferralStatus) -> Result<Vec<Referral>, RepositoryError>;
    /// Replace the stored record with `updated` only if the stored status
    /// still equals `expected_from`.
    fn apply_transition(
        &self,
        expected_from: ReferralStatus,
        updated: Referral,
    ) -> Result<Referral, RepositoryError>;
    /// Overwrite the internal notes without touching `last_status_update`.
    fn save_notes(&self, id: &ReferralId, notes: &str) -> Result<Referral, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("conditional write lost to a concurrent transition")]
    Conflict,
    #[error("referral not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound best-effort notification hook (partner e-mail, webhook, ...).
/// Delivery failure must never block or roll back a transition.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: PartnerNotification) -> Result<(), NotificationError>;
}

/// Notification payload; `template` selects the message on the dispatcher
/// side ("referral_overdue", "follow_up_due").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerNotification {
    pub template: String,
    pub referral_id: ReferralId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Append-only audit hook, invoked after every successful status transition.
pub trait AuditLogWriter: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub referral_id: ReferralId,
    pub from_status: ReferralStatus,
    pub to_status: ReferralStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}
