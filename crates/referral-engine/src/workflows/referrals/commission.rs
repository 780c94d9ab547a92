//! Success-fee arithmetic.
//!
//! All money is integer smallest-currency-unit; fees are derived with exact
//! integer arithmetic and round-half-up tie-breaking. Floating point never
//! enters the computation.

/// Error raised for out-of-contract calculator inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommissionError {
    #[error("success fee percent must be within 0..=100, got {0}")]
    PercentOutOfRange(u8),
}

pub(crate) fn validate_percent(percent: u8) -> Result<(), CommissionError> {
    if percent > 100 {
        return Err(CommissionError::PercentOutOfRange(percent));
    }
    Ok(())
}

/// `round(value * percent / 100)` with round-half-up tie-breaking.
///
/// Negative values are unrepresentable by construction; the only rejected
/// input is a percentage above 100.
pub fn success_fee(value: u64, percent: u8) -> Result<u64, CommissionError> {
    validate_percent(percent)?;
    let fee = round_half_up_div(value as u128 * percent as u128, 100);
    // value * percent / 100 <= value, so the cast back never truncates.
    Ok(fee as u64)
}

/// Integer `round(numerator / denominator)` rounding `.5` up.
///
/// `(2n + d) / 2d` keeps the arithmetic exact; callers pass `u128` operands
/// so the doubling cannot overflow for any monetary input.
pub(crate) fn round_half_up_div(numerator: u128, denominator: u128) -> u128 {
    debug_assert!(denominator > 0);
    (2 * numerator + denominator) / (2 * denominator)
}
