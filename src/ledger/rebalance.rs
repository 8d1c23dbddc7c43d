use serde::{Deserialize, Serialize};

use super::book::LedgerBook;
use crate::error::Result;
use crate::model::amount::{apply_bps, deviation_bps};
use crate::model::{Amount, Bps, SourceId};

/// Direction of capital for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Withdraw,
    Deposit,
}

/// One planned or executed capital move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceMove {
    pub source: SourceId,
    pub direction: Direction,
    pub amount: Amount,
}

/// Moves executed by one rebalance call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub moves: Vec<RebalanceMove>,
}

impl RebalanceReport {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moved(&self, direction: Direction) -> Amount {
        self.moves
            .iter()
            .filter(|m| m.direction == direction)
            .map(|m| m.amount)
            .sum()
    }
}

/// Planned move for the source at `idx`, or `None` when it is within threshold.
///
/// Target is `total_assets * target_allocation`. A source trips when
/// `|current - target| / target >= threshold`; a zero target trips on any
/// nonzero balance and exits fully.
pub fn plan_source(book: &LedgerBook, idx: usize, threshold: Bps) -> Result<Option<(Direction, Amount)>> {
    let source = &book.sources[idx];
    if !source.is_active() {
        return Ok(None);
    }
    let current = source.balance;
    let target = apply_bps(book.total_assets, source.target_allocation)?;

    let tripped = match deviation_bps(current, target) {
        None => current > 0,
        Some(dev) => dev >= threshold as Amount && current != target,
    };
    if !tripped {
        return Ok(None);
    }

    Ok(Some(if current > target {
        (Direction::Withdraw, current - target)
    } else {
        (Direction::Deposit, target - current)
    }))
}

/// Plan for every active source, withdrawals first so freed capital can fund deposits.
pub fn plan(book: &LedgerBook, threshold: Bps) -> Result<Vec<(usize, Direction, Amount)>> {
    let mut withdrawals = Vec::new();
    let mut deposits = Vec::new();
    for idx in 0..book.sources.len() {
        match plan_source(book, idx, threshold)? {
            Some((Direction::Withdraw, amount)) => withdrawals.push((idx, Direction::Withdraw, amount)),
            Some((Direction::Deposit, amount)) => deposits.push((idx, Direction::Deposit, amount)),
            None => {}
        }
    }
    withdrawals.extend(deposits);
    Ok(withdrawals)
}

/// Whether any active source has drifted past the policy threshold.
pub fn needs_rebalance(book: &LedgerBook) -> Result<bool> {
    Ok(!plan(book, book.policy.rebalance_threshold)?.is_empty())
}
