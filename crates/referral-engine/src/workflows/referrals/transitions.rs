//! The referral state machine.
//!
//! Every legal status change is a row in [`legal`]; nothing else in the crate
//! decides whether a transition is allowed. `apply` is pure: it returns the
//! updated record and leaves persistence and side effects to the caller.

use chrono::{DateTime, Utc};

use super::commission::{self, CommissionError};
use super::domain::{Referral, ReferralStatus};

/// Who is driving the transition. `SENT -> OVERDUE` belongs to the SLA scan
/// alone; a manager asking for `overdue` by hand is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTrigger {
    Manual,
    SlaScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no transition from {from:?} to {to:?}")]
    Illegal {
        from: ReferralStatus,
        to: ReferralStatus,
    },
    #[error("won_value is required to close a referral as won")]
    MissingWonValue,
    #[error("won_value must be greater than zero")]
    WonValueNotPositive,
    #[error(transparent)]
    Commission(#[from] CommissionError),
}

/// The full transition table.
pub(crate) const fn legal(
    from: ReferralStatus,
    to: ReferralStatus,
    trigger: TransitionTrigger,
) -> bool {
    use ReferralStatus::*;
    use TransitionTrigger::*;

    matches!(
        (from, to, trigger),
        (Sent, Acked, Manual)
            | (Sent, Overdue, SlaScan)
            | (Overdue, Acked, Manual)
            | (Overdue, Lost, Manual)
            | (Acked, InNegotiation, Manual)
            | (Acked, Lost, Manual)
            | (InNegotiation, Won, Manual)
            | (InNegotiation, Lost, Manual)
    )
}

/// Validate and apply a transition, returning the updated referral.
///
/// On success the result carries the new status and a fresh
/// `last_status_update`; the WON row additionally stores `won_value` and the
/// realized fee. The input referral is never mutated, so a failed call
/// leaves no trace.
pub(crate) fn apply(
    referral: &Referral,
    target: ReferralStatus,
    won_value: Option<u64>,
    trigger: TransitionTrigger,
    now: DateTime<Utc>,
) -> Result<Referral, TransitionError> {
    if !legal(referral.status, target, trigger) {
        return Err(TransitionError::Illegal {
            from: referral.status,
            to: target,
        });
    }

    let mut updated = referral.clone();
    updated.status = target;
    updated.last_status_update = now;

    if target == ReferralStatus::Won {
        let value = won_value.ok_or(TransitionError::MissingWonValue)?;
        if value == 0 {
            return Err(TransitionError::WonValueNotPositive);
        }
        updated.won_value = Some(value);
        updated.success_fee_realized =
            Some(commission::success_fee(value, referral.success_fee_percent)?);
    }

    Ok(updated)
}
