use crate::config::AllocatorKind;
use crate::model::{Amount, BPS_SCALE, Bps, YieldSource};

/// Computes an allocation vector over pre-filtered sources.
///
/// `score` ranks each source independently; `allocate` normalizes the scores
/// to bps summing to exactly 10000, the last entry taking the rounding remainder.
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, source: &YieldSource) -> Amount;

    fn allocate(&self, sources: &[&YieldSource]) -> Vec<Bps> {
        let scores: Vec<Amount> = sources.iter().map(|s| self.score(s)).collect();
        normalize(&scores)
    }
}

/// Baseline split: every eligible source gets the same weight.
pub struct EqualWeight;

impl AllocationStrategy for EqualWeight {
    fn name(&self) -> &'static str {
        "equal_weight"
    }

    fn score(&self, _source: &YieldSource) -> Amount {
        1
    }
}

/// Kelly-style weighting: `apy / risk²`.
pub struct RiskAdjustedYield;

impl AllocationStrategy for RiskAdjustedYield {
    fn name(&self) -> &'static str {
        "risk_adjusted_yield"
    }

    fn score(&self, source: &YieldSource) -> Amount {
        let risk = source.risk_level.max(1) as Amount;
        source.apy as Amount * 1_000_000 / (risk * risk)
    }
}

impl AllocatorKind {
    pub fn strategy(self) -> Box<dyn AllocationStrategy> {
        match self {
            AllocatorKind::EqualWeight => Box::new(EqualWeight),
            AllocatorKind::RiskAdjustedYield => Box::new(RiskAdjustedYield),
        }
    }
}

/// Scale scores to bps. All-zero scores fall back to an equal split.
pub fn normalize(scores: &[Amount]) -> Vec<Bps> {
    if scores.is_empty() {
        return Vec::new();
    }
    let total: Amount = scores.iter().sum();
    let mut weights: Vec<Bps> = if total == 0 {
        vec![BPS_SCALE / scores.len() as Bps; scores.len()]
    } else {
        scores
            .iter()
            .map(|&s| (s.saturating_mul(BPS_SCALE as Amount) / total) as Bps)
            .collect()
    };
    let assigned: Bps = weights[..weights.len() - 1].iter().sum();
    if let Some(last) = weights.last_mut() {
        *last = BPS_SCALE - assigned;
    }
    weights
}
