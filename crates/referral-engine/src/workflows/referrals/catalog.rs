//! Read-only collaborator port for the offer/partner catalog.
//!
//! The catalog is owned elsewhere; the engine only needs to confirm that a
//! referral's offer and partner references resolve before accepting it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerId(pub String);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog view of an offer, including the negotiated commission rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub offer_id: OfferId,
    pub name: String,
    pub success_fee_percent: u8,
}

/// Directory view of a supply partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerSnapshot {
    pub partner_id: PartnerId,
    pub name: String,
}

/// Resolves offer/partner references. `Ok(None)` means the id does not exist;
/// `Err` means the catalog itself could not answer, in which case referral
/// creation fails closed rather than storing dangling references.
pub trait PartnerCatalog: Send + Sync {
    fn resolve_offer(&self, id: &OfferId) -> Result<Option<OfferSnapshot>, CatalogError>;
    fn resolve_partner(&self, id: &PartnerId) -> Result<Option<PartnerSnapshot>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}
