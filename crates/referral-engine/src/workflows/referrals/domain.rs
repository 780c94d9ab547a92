use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{OfferId, PartnerId};

/// Identifier wrapper for routed referrals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralId(pub String);

/// Where a referral originated. Informational only; every origin follows the
/// same lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralOrigin {
    Marketplace,
    Assisted,
    Campaign,
}

impl ReferralOrigin {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::Assisted => "assisted",
            Self::Campaign => "campaign",
        }
    }
}

/// Lifecycle status of a referral. `Won` and `Lost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Sent,
    Acked,
    InNegotiation,
    Won,
    Lost,
    Overdue,
}

impl ReferralStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Sent,
            Self::Acked,
            Self::InNegotiation,
            Self::Won,
            Self::Lost,
            Self::Overdue,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Acked => "acked",
            Self::InNegotiation => "in_negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Overdue => "overdue",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Free-text identification of the prospective buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub company: String,
    pub contact: String,
}

/// Creation request for a referral, before catalog resolution and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReferral {
    pub offer_id: OfferId,
    pub partner_id: PartnerId,
    pub buyer: Buyer,
    pub origin: ReferralOrigin,
    /// Negotiated success-fee percentage, fixed for the referral's lifetime.
    pub success_fee_percent: u8,
    /// Estimated deal value in the smallest currency unit (centavos).
    pub expected_value: Option<u64>,
}

/// A routed sales lead tracked through its negotiation lifecycle.
///
/// Monetary fields are integers in the smallest currency unit. Only `status`,
/// `internal_notes`, and the derived fee fields change after creation, and
/// status changes go exclusively through the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub offer_id: OfferId,
    pub partner_id: PartnerId,
    pub buyer: Buyer,
    pub origin: ReferralOrigin,
    pub status: ReferralStatus,
    pub success_fee_percent: u8,
    pub expected_value: Option<u64>,
    /// Closed deal value; present if and only if `status == Won`.
    pub won_value: Option<u64>,
    pub success_fee_expected: Option<u64>,
    /// Set exactly once, at the WON transition; never recomputed.
    pub success_fee_realized: Option<u64>,
    /// Only evaluated for overdue detection while `status == Sent`.
    pub ack_deadline: DateTime<Utc>,
    pub last_status_update: DateTime<Utc>,
    pub internal_notes: String,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn view(&self) -> ReferralView {
        ReferralView {
            id: self.id.clone(),
            offer_id: self.offer_id.clone(),
            partner_id: self.partner_id.clone(),
            buyer: self.buyer.clone(),
            origin: self.origin.label(),
            status: self.status.label(),
            success_fee_percent: self.success_fee_percent,
            expected_value: self.expected_value,
            won_value: self.won_value,
            success_fee_expected: self.success_fee_expected,
            success_fee_realized: self.success_fee_realized,
            ack_deadline: self.ack_deadline,
            last_status_update: self.last_status_update,
            internal_notes: self.internal_notes.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serialized representation exposed to API consumers, with labeled enums.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralView {
    pub id: ReferralId,
    pub offer_id: OfferId,
    pub partner_id: PartnerId,
    pub buyer: Buyer,
    pub origin: &'static str,
    pub status: &'static str,
    pub success_fee_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub won_value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_fee_expected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_fee_realized: Option<u64>,
    pub ack_deadline: DateTime<Utc>,
    pub last_status_update: DateTime<Utc>,
    pub internal_notes: String,
    pub created_at: DateTime<Utc>,
}
