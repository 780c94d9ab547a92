//! Referral lifecycle tracking and commission settlement.
//!
//! A referral enters as `sent`, must be acknowledged by the partner before
//! its SLA deadline, moves through negotiation, and settles a success-fee
//! commission when the deal closes. The transition table in [`transitions`]
//! is the single source of truth for which status changes are legal; the
//! service façade in [`service`] wires the table to the store, catalog, and
//! outbound ports.

pub mod catalog;
pub mod commission;
pub mod domain;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod sla;
pub(crate) mod transitions;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, OfferId, OfferSnapshot, PartnerCatalog, PartnerId, PartnerSnapshot};
pub use commission::{success_fee, CommissionError};
pub use domain::{
    Buyer, NewReferral, Referral, ReferralId, ReferralOrigin, ReferralStatus, ReferralView,
};
pub use report::{FollowUpAlert, ReferralStatistics, StatusCountEntry};
pub use repository::{
    AuditEntry, AuditError, AuditLogWriter, NotificationDispatcher, NotificationError,
    PartnerNotification, ReferralRepository, RepositoryError,
};
pub use router::referral_router;
pub use service::{ReferralService, ReferralServiceError, ReferralSettings, ValidationIssue};
pub use sla::SlaScanOutcome;
pub use transitions::TransitionError;
