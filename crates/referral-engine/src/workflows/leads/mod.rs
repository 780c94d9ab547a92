//! Batch import of marketplace checkout leads.
//!
//! The checkout flow exports captured leads as CSV; the importer feeds each
//! row through the referral service. A row the service rejects (unknown
//! offer, bad percentage) is counted and logged, never aborts the batch;
//! only an unreadable file fails the import wholesale.

mod parser;

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::workflows::referrals::{
    AuditLogWriter, NotificationDispatcher, PartnerCatalog, ReferralId, ReferralRepository,
    ReferralService,
};

pub use parser::LeadParseError;

#[derive(Debug, thiserror::Error)]
pub enum LeadImportError {
    #[error(transparent)]
    Parse(#[from] LeadParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one import batch.
#[derive(Debug, Default)]
pub struct LeadImportOutcome {
    pub created: Vec<ReferralId>,
    /// `(csv row number, rejection message)` for rows the service refused.
    pub rejected: Vec<(usize, String)>,
}

/// Parse a checkout export and create a referral per lead.
pub fn import_leads<R, C, N, A, Rd>(
    service: &Arc<ReferralService<R, C, N, A>>,
    reader: Rd,
    now: DateTime<Utc>,
) -> Result<LeadImportOutcome, LeadImportError>
where
    R: ReferralRepository + 'static,
    C: PartnerCatalog + 'static,
    N: NotificationDispatcher + 'static,
    A: AuditLogWriter + 'static,
    Rd: Read,
{
    let records = parser::parse_leads(reader)?;
    let mut outcome = LeadImportOutcome::default();

    for record in records {
        match service.create_referral(record.referral, now) {
            Ok(referral) => outcome.created.push(referral.id),
            Err(err) => {
                warn!(row = record.row, %err, "lead rejected during import");
                outcome.rejected.push((record.row, err.to_string()));
            }
        }
    }

    Ok(outcome)
}
