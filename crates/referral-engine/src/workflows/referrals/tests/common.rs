//! Shared fixtures and in-memory port doubles for the referral tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::workflows::referrals::catalog::{
    CatalogError, OfferId, OfferSnapshot, PartnerCatalog, PartnerId, PartnerSnapshot,
};
use crate::workflows::referrals::domain::{
    Buyer, NewReferral, Referral, ReferralId, ReferralOrigin, ReferralStatus,
};
use crate::workflows::referrals::repository::{
    AuditEntry, AuditError, AuditLogWriter, NotificationDispatcher, NotificationError,
    PartnerNotification, ReferralRepository, RepositoryError,
};
use crate::workflows::referrals::service::{ReferralService, ReferralSettings};

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).single().expect("valid timestamp")
}

pub(super) fn settings() -> ReferralSettings {
    ReferralSettings {
        ack_sla: Duration::hours(24),
        follow_up_threshold_days: 7,
    }
}

#[derive(Default)]
pub(super) struct InMemoryStore {
    records: Mutex<HashMap<ReferralId, Referral>>,
}

impl InMemoryStore {
    /// Overwrite a stored record directly, bypassing the transition checks.
    /// Used to stage race scenarios.
    pub(super) fn force_put(&self, referral: Referral) {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(referral.id.clone(), referral);
    }
}

impl ReferralRepository for InMemoryStore {
    fn insert(&self, referral: Referral) -> Result<Referral, RepositoryError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.contains_key(&referral.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(referral.id.clone(), referral.clone());
        Ok(referral)
    }

    fn fetch(&self, id: &ReferralId) -> Result<Option<Referral>, RepositoryError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Referral>, RepositoryError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn list_by_status(&self, status: ReferralStatus) -> Result<Vec<Referral>, RepositoryError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|referral| referral.status == status)
            .cloned()
            .collect())
    }

    fn apply_transition(
        &self,
        expected_from: ReferralStatus,
        updated: Referral,
    ) -> Result<Referral, RepositoryError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let stored = guard.get(&updated.id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected_from {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    fn save_notes(&self, id: &ReferralId, notes: &str) -> Result<Referral, RepositoryError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let referral = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        referral.internal_notes = notes.to_string();
        Ok(referral.clone())
    }
}

/// Repository wrapper whose next conditional write fails with `Conflict`,
/// mimicking a lost race. A staged "winner" record, if any, is installed in
/// the inner store at that same moment, so the caller's re-read observes the
/// state the concurrent transition produced.
pub(super) struct ConflictOnce {
    pub(super) inner: Arc<InMemoryStore>,
    armed: Mutex<bool>,
    winner: Mutex<Option<Referral>>,
}

impl ConflictOnce {
    pub(super) fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(true),
            winner: Mutex::new(None),
        }
    }

    pub(super) fn stage_winner(&self, referral: Referral) {
        *self.winner.lock().expect("winner mutex poisoned") = Some(referral);
    }
}

impl ReferralRepository for ConflictOnce {
    fn insert(&self, referral: Referral) -> Result<Referral, RepositoryError> {
        self.inner.insert(referral)
    }

    fn fetch(&self, id: &ReferralId) -> Result<Option<Referral>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self) -> Result<Vec<Referral>, RepositoryError> {
        self.inner.list()
    }

    fn list_by_status(&self, status: ReferralStatus) -> Result<Vec<Referral>, RepositoryError> {
        self.inner.list_by_status(status)
    }

    fn apply_transition(
        &self,
        expected_from: ReferralStatus,
        updated: Referral,
    ) -> Result<Referral, RepositoryError> {
        let mut armed = self.armed.lock().expect("flag mutex poisoned");
        if *armed {
            *armed = false;
            if let Some(winner) = self.winner.lock().expect("winner mutex poisoned").take() {
                self.inner.force_put(winner);
            }
            return Err(RepositoryError::Conflict);
        }
        self.inner.apply_transition(expected_from, updated)
    }

    fn save_notes(&self, id: &ReferralId, notes: &str) -> Result<Referral, RepositoryError> {
        self.inner.save_notes(id, notes)
    }
}

#[derive(Default)]
pub(super) struct StaticCatalog {
    offers: HashMap<String, OfferSnapshot>,
    partners: HashMap<String, PartnerSnapshot>,
    pub(super) unavailable: bool,
}

impl StaticCatalog {
    pub(super) fn offline() -> Self {
        Self {
            unavailable: true,
            ..Self::with_demo_entries()
        }
    }

    pub(super) fn with_demo_entries() -> Self {
        let mut catalog = Self::default();
        catalog.offers.insert(
            "offer-erp".to_string(),
            OfferSnapshot {
                offer_id: OfferId("offer-erp".to_string()),
                name: "ERP Cloud".to_string(),
                success_fee_percent: 15,
            },
        );
        catalog.offers.insert(
            "offer-crm".to_string(),
            OfferSnapshot {
                offer_id: OfferId("offer-crm".to_string()),
                name: "CRM Suite".to_string(),
                success_fee_percent: 10,
            },
        );
        catalog.partners.insert(
            "partner-acme".to_string(),
            PartnerSnapshot {
                partner_id: PartnerId("partner-acme".to_string()),
                name: "Acme Integrations".to_string(),
            },
        );
        catalog.partners.insert(
            "partner-nimbus".to_string(),
            PartnerSnapshot {
                partner_id: PartnerId("partner-nimbus".to_string()),
                name: "Nimbus Consulting".to_string(),
            },
        );
        catalog
    }
}

impl PartnerCatalog for StaticCatalog {
    fn resolve_offer(&self, id: &OfferId) -> Result<Option<OfferSnapshot>, CatalogError> {
        if self.unavailable {
            return Err(CatalogError::Unavailable("catalog offline".to_string()));
        }
        Ok(self.offers.get(&id.0).cloned())
    }

    fn resolve_partner(&self, id: &PartnerId) -> Result<Option<PartnerSnapshot>, CatalogError> {
        if self.unavailable {
            return Err(CatalogError::Unavailable("catalog offline".to_string()));
        }
        Ok(self.partners.get(&id.0).cloned())
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    events: Mutex<Vec<PartnerNotification>>,
    pub(super) fail: bool,
}

impl RecordingNotifier {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn events(&self) -> Vec<PartnerNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for RecordingNotifier {
    fn dispatch(&self, notification: PartnerNotification) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Transport("smtp down".to_string()));
        }
        let mut guard = self.events.lock().expect("notifier mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
    pub(super) fail: bool,
}

impl RecordingAudit {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLogWriter for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Unavailable("sink offline".to_string()));
        }
        let mut guard = self.entries.lock().expect("audit mutex poisoned");
        guard.push(entry);
        Ok(())
    }
}

pub(super) type TestService =
    ReferralService<InMemoryStore, StaticCatalog, RecordingNotifier, RecordingAudit>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) audit: Arc<RecordingAudit>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let audit = Arc::new(RecordingAudit::default());
    let service = Arc::new(ReferralService::new(
        store.clone(),
        Arc::new(StaticCatalog::with_demo_entries()),
        notifier.clone(),
        audit.clone(),
        settings(),
    ));
    Harness {
        service,
        store,
        notifier,
        audit,
    }
}

pub(super) fn referral_with_status(status: ReferralStatus) -> Referral {
    Referral {
        id: ReferralId("ref-test-1".to_string()),
        offer_id: OfferId("offer-erp".to_string()),
        partner_id: PartnerId("partner-acme".to_string()),
        buyer: Buyer {
            company: "Padaria Estrela".to_string(),
            contact: "Ana Souza".to_string(),
        },
        origin: ReferralOrigin::Marketplace,
        status,
        success_fee_percent: 15,
        expected_value: Some(100_000),
        won_value: None,
        success_fee_expected: Some(15_000),
        success_fee_realized: None,
        ack_deadline: t0() + Duration::hours(24),
        last_status_update: t0(),
        internal_notes: String::new(),
        created_at: t0(),
    }
}

pub(super) fn new_referral() -> NewReferral {
    NewReferral {
        offer_id: OfferId("offer-erp".to_string()),
        partner_id: PartnerId("partner-acme".to_string()),
        buyer: Buyer {
            company: "Padaria Estrela".to_string(),
            contact: "Ana Souza".to_string(),
        },
        origin: ReferralOrigin::Marketplace,
        success_fee_percent: 15,
        expected_value: Some(100_000),
    }
}
