use crate::error::{Result, RouterError};
use crate::model::amount::SECS_PER_YEAR;
use crate::model::{BPS_SCALE, BacktestEstimate, Bps, SourceId, YieldSource};

/// Weighted estimate of a candidate allocation over `[start, end]`.
///
/// Not a historical replay: return and risk are the allocation-weighted
/// current APY and risk of each source, the Sharpe-like ratio is their
/// quotient, and drawdown is taken as half the weighted risk.
pub fn estimate(
    registry: &[YieldSource],
    sources: &[SourceId],
    allocations: &[Bps],
    start: u64,
    end: u64,
    now: u64,
) -> Result<BacktestEstimate> {
    if sources.len() != allocations.len() {
        return Err(RouterError::LengthMismatch {
            left: "sources",
            left_len: sources.len(),
            right: "allocations",
            right_len: allocations.len(),
        });
    }
    if start >= end {
        return Err(RouterError::InvalidWindow { start, end });
    }
    if end > now {
        return Err(RouterError::WindowInFuture { end, now });
    }

    let mut weighted_return: u64 = 0;
    let mut weighted_risk: u64 = 0;
    for (id, &alloc) in sources.iter().zip(allocations) {
        let source = registry
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| RouterError::UnknownSource(id.clone()))?;
        weighted_return += source.apy as u64 * alloc as u64 / BPS_SCALE as u64;
        weighted_risk += source.risk_level as u64 * 1_000 * alloc as u64 / BPS_SCALE as u64;
    }

    let sharpe_ratio = if weighted_risk == 0 {
        0.0
    } else {
        weighted_return as f64 / weighted_risk as f64
    };
    let period_return = weighted_return * (end - start) / SECS_PER_YEAR;

    Ok(BacktestEstimate {
        weighted_return: weighted_return as Bps,
        weighted_risk: weighted_risk as Bps,
        sharpe_ratio,
        max_drawdown: (weighted_risk / 2) as Bps,
        period_return: period_return.min(u32::MAX as u64) as Bps,
        start,
        end,
    })
}
