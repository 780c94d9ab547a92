use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use referral_engine::workflows::referrals::{
    AuditEntry, AuditError, AuditLogWriter, CatalogError, NotificationDispatcher,
    NotificationError, OfferId, OfferSnapshot, PartnerCatalog, PartnerId, PartnerNotification,
    PartnerSnapshot, Referral, ReferralId, ReferralRepository, ReferralService, ReferralSettings,
    ReferralStatus, RepositoryError,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mutex-backed store; the conditional write holds the lock across the
/// status comparison and the swap, which is what the transition contract
/// requires.
#[derive(Default)]
pub(crate) struct InMemoryReferralStore {
    records: Mutex<HashMap<ReferralId, Referral>>,
}

impl ReferralRepository for InMemoryReferralStore {
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

/// Catalog backed by a fixed seed until the real catalog service is wired in.
pub(crate) struct SeededCatalog {
    offers: HashMap<String, OfferSnapshot>,
    partners: HashMap<String, PartnerSnapshot>,
}

impl SeededCatalog {
    pub(crate) fn demo() -> Self {
        let mut offers = HashMap::new();
        for (id, name, percent) in [
            ("offer-erp", "ERP Cloud", 15u8),
            ("offer-crm", "CRM Suite", 10),
            ("offer-fiscal", "Nota Fiscal Connector", 12),
        ] {
            offers.insert(
                id.to_string(),
                OfferSnapshot {
                    offer_id: OfferId(id.to_string()),
                    name: name.to_string(),
                    success_fee_percent: percent,
                },
            );
        }

        let mut partners = HashMap::new();
        for (id, name) in [
            ("partner-acme", "Acme Integrations"),
            ("partner-nimbus", "Nimbus Consulting"),
        ] {
            partners.insert(
                id.to_string(),
                PartnerSnapshot {
                    partner_id: PartnerId(id.to_string()),
                    name: name.to_string(),
                },
            );
        }

        Self { offers, partners }
    }
}

impl PartnerCatalog for SeededCatalog {
    fn resolve_offer(&self, id: &OfferId) -> Result<Option<OfferSnapshot>, CatalogError> {
        Ok(self.offers.get(&id.0).cloned())
    }

    fn resolve_partner(&self, id: &PartnerId) -> Result<Option<PartnerSnapshot>, CatalogError> {
        Ok(self.partners.get(&id.0).cloned())
    }
}

/// Notification adapter that logs dispatches and keeps them queryable; a real
/// transport integration replaces this without touching the core.
#[derive(Default)]
pub(crate) struct LoggingNotifier {
    events: Mutex<Vec<PartnerNotification>>,
}

impl LoggingNotifier {
    pub(crate) fn events(&self) -> Vec<PartnerNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for LoggingNotifier {
    fn dispatch(&self, notification: PartnerNotification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            referral_id = %notification.referral_id.0,
            "notification dispatched"
        );
        let mut guard = self.events.lock().expect("notifier mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

/// Audit adapter writing entries to the service log.
#[derive(Default)]
pub(crate) struct LoggingAuditLog;

impl AuditLogWriter for LoggingAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            referral_id = %entry.referral_id.0,
            from = entry.from_status.label(),
            to = entry.to_status.label(),
            actor = %entry.actor,
            at = %entry.at.to_rfc3339(),
            "status transition"
        );
        Ok(())
    }
}

pub(crate) type AppReferralService =
    ReferralService<InMemoryReferralStore, SeededCatalog, LoggingNotifier, LoggingAuditLog>;

pub(crate) fn build_service(settings: ReferralSettings) -> Arc<AppReferralService> {
    Arc::new(ReferralService::new(
        Arc::new(InMemoryReferralStore::default()),
        Arc::new(SeededCatalog::demo()),
        Arc::new(LoggingNotifier::default()),
        Arc::new(LoggingAuditLog),
        settings,
    ))
}
