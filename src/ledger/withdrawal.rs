use std::cmp::Ordering;

use crate::config::WithdrawalOrder;
use crate::model::{SourceStatus, YieldSource};

impl WithdrawalOrder {
    /// Comparator placing the source to drain first at the front.
    pub fn compare(&self, a: &YieldSource, b: &YieldSource) -> Ordering {
        let newest_first = b.registration_index.cmp(&a.registration_index);
        match self {
            WithdrawalOrder::ReverseRegistration => newest_first,
            WithdrawalOrder::Registration => a.registration_index.cmp(&b.registration_index),
            WithdrawalOrder::LowestApyFirst => a.apy.cmp(&b.apy).then(newest_first),
            WithdrawalOrder::HighestRiskFirst => b.risk_level.cmp(&a.risk_level).then(newest_first),
        }
    }
}

/// Indices of sources holding capital, in the order a shortfall is pulled from them.
pub fn drain_order(sources: &[YieldSource], order: WithdrawalOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.balance > 0 && s.status != SourceStatus::Removed)
        .map(|(i, _)| i)
        .collect();
    indices.sort_by(|&a, &b| order.compare(&sources[a], &sources[b]));
    indices
}
