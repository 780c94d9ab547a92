//! Read models over the referral set: dashboard statistics and stale-referral
//! follow-up alerts. Pure functions so reporting is testable without a store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commission::round_half_up_div;
use super::domain::{Referral, ReferralStatus, ReferralView};

/// Aggregate dashboard numbers for a referral set.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralStatistics {
    pub total: usize,
    pub by_status: Vec<StatusCountEntry>,
    /// `won / (won + lost)` as a percentage, round-half-up; 0 when no
    /// referral has reached a terminal state.
    pub conversion_rate_percent: u8,
    pub expected_value_total: u64,
    pub won_value_total: u64,
    pub expected_fee_total: u64,
    pub realized_fee_total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCountEntry {
    pub status: ReferralStatus,
    pub status_label: &'static str,
    pub count: usize,
}

pub(crate) fn compute_statistics(referrals: &[Referral]) -> ReferralStatistics {
    let by_status = ReferralStatus::ordered()
        .into_iter()
        .map(|status| StatusCountEntry {
            status,
            status_label: status.label(),
            count: referrals.iter().filter(|r| r.status == status).count(),
        })
        .collect::<Vec<_>>();

    let won = referrals
        .iter()
        .filter(|r| r.status == ReferralStatus::Won)
        .count() as u128;
    let lost = referrals
        .iter()
        .filter(|r| r.status == ReferralStatus::Lost)
        .count() as u128;
    let decided = won + lost;
    let conversion_rate_percent = if decided == 0 {
        0
    } else {
        round_half_up_div(won * 100, decided) as u8
    };

    let sum = |f: fn(&Referral) -> Option<u64>| -> u64 {
        referrals.iter().filter_map(f).sum()
    };

    ReferralStatistics {
        total: referrals.len(),
        by_status,
        conversion_rate_percent,
        expected_value_total: sum(|r| r.expected_value),
        won_value_total: sum(|r| r.won_value),
        expected_fee_total: sum(|r| r.success_fee_expected),
        realized_fee_total: sum(|r| r.success_fee_realized),
    }
}

/// A non-terminal referral that has gone quiet for longer than the follow-up
/// threshold.
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpAlert {
    pub referral: ReferralView,
    pub days_since_update: i64,
}

/// Non-terminal referrals whose last status change is older than
/// `threshold_days`, oldest update first.
pub(crate) fn compute_follow_up_alerts(
    referrals: &[Referral],
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Vec<FollowUpAlert> {
    let mut stale: Vec<&Referral> = referrals
        .iter()
        .filter(|r| !r.status.is_terminal())
        .filter(|r| now - r.last_status_update > chrono::Duration::days(threshold_days))
        .collect();
    stale.sort_by_key(|r| r.last_status_update);

    stale
        .into_iter()
        .map(|r| FollowUpAlert {
            referral: r.view(),
            days_since_update: (now - r.last_status_update).num_days(),
        })
        .collect()
}
