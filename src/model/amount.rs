use crate::error::{Result, RouterError};

/// Token quantity in the settlement token's smallest unit.
pub type Amount = u128;

/// Fixed-point fraction where 10_000 = 100%.
pub type Bps = u32;

pub const BPS_SCALE: Bps = 10_000;

/// Seconds in the accrual year used by every time-proportional formula.
pub const SECS_PER_YEAR: u64 = 365 * 86_400;

/// `a * b / c` with overflow and division-by-zero surfaced as errors.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Result<Amount> {
    if c == 0 {
        return Err(RouterError::Overflow { op: "mul_div: zero divisor" });
    }
    a.checked_mul(b)
        .map(|p| p / c)
        .ok_or(RouterError::Overflow { op: "mul_div" })
}

/// Portion of `amount` represented by `bps`.
pub fn apply_bps(amount: Amount, bps: Bps) -> Result<Amount> {
    mul_div(amount, bps as Amount, BPS_SCALE as Amount)
}

/// Scale a bps value by a bps factor (e.g. 5000 scaled by 8000 → 4000).
pub fn scale_bps(value: Bps, factor: Bps) -> Bps {
    ((value as u64 * factor as u64) / BPS_SCALE as u64).min(u32::MAX as u64) as Bps
}

/// Shares minted for `amount` against a pool of `total_assets` backing `total_shares`.
/// An empty pool mints 1:1.
pub fn shares_for_deposit(amount: Amount, total_shares: Amount, total_assets: Amount) -> Result<Amount> {
    if total_shares == 0 || total_assets == 0 {
        return Ok(amount);
    }
    mul_div(amount, total_shares, total_assets)
}

/// Assets redeemable for `shares` against the pool.
pub fn assets_for_shares(shares: Amount, total_shares: Amount, total_assets: Amount) -> Result<Amount> {
    if total_shares == 0 {
        return Ok(0);
    }
    mul_div(shares, total_assets, total_shares)
}

/// Time-proportional accrual: `principal * rate_bps * elapsed / (BPS_SCALE * year)`.
pub fn accrue(principal: Amount, rate_bps: Bps, elapsed_secs: u64) -> Result<Amount> {
    let numerator = principal
        .checked_mul(rate_bps as Amount)
        .and_then(|v| v.checked_mul(elapsed_secs as Amount))
        .ok_or(RouterError::Overflow { op: "accrue" })?;
    Ok(numerator / (BPS_SCALE as Amount * SECS_PER_YEAR as Amount))
}

/// Absolute deviation of `current` from `target`, in bps of `target`.
/// A zero target yields `None` (any nonzero balance is a full exit).
pub fn deviation_bps(current: Amount, target: Amount) -> Option<Amount> {
    if target == 0 {
        return None;
    }
    let diff = current.abs_diff(target);
    Some(diff.saturating_mul(BPS_SCALE as Amount) / target)
}
