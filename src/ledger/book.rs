use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::RingHistory;
use crate::error::{Result, RouterError};
use crate::model::{AllocationPolicy, Amount, BPS_SCALE, HarvestRecord, LedgerPosition, YieldSource};

/// Everything the ledger persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerBook {
    /// Registration order; removed sources stay for history.
    pub sources: Vec<YieldSource>,
    pub positions: BTreeMap<String, LedgerPosition>,
    pub total_assets: Amount,
    pub total_shares: Amount,
    /// Settlement tokens held by the ledger itself, not deployed to any venue.
    pub idle: Amount,
    pub policy: AllocationPolicy,
    pub harvests: RingHistory<HarvestRecord>,
    pub fees_paid: Amount,
    pub rebalances: u64,
}

/// Headline numbers of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_assets: Amount,
    pub total_shares: Amount,
    pub idle: Amount,
    pub deployed: Amount,
}

impl LedgerBook {
    pub fn new(policy: AllocationPolicy, harvest_capacity: usize) -> Self {
        Self {
            sources: Vec::new(),
            positions: BTreeMap::new(),
            total_assets: 0,
            total_shares: 0,
            idle: 0,
            policy,
            harvests: RingHistory::new(harvest_capacity),
            fees_paid: 0,
            rebalances: 0,
        }
    }

    pub fn index_of(&self, id: &str) -> Result<usize> {
        self.sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RouterError::UnknownSource(id.to_string()))
    }

    pub fn source(&self, id: &str) -> Result<&YieldSource> {
        self.index_of(id).map(|i| &self.sources[i])
    }

    /// Aggregate target allocation of active sources, optionally ignoring one.
    pub fn active_allocation(&self, except: Option<usize>) -> u64 {
        self.sources
            .iter()
            .enumerate()
            .filter(|(i, s)| s.is_active() && Some(*i) != except)
            .map(|(_, s)| s.target_allocation as u64)
            .sum()
    }

    /// Reject a target that would push active allocation above 100%.
    pub fn check_allocation_budget(&self, except: Option<usize>, target: u32) -> Result<()> {
        let total = self.active_allocation(except) + target as u64;
        if total > BPS_SCALE as u64 {
            return Err(RouterError::AllocationExceeded { total });
        }
        Ok(())
    }

    pub fn deployed(&self) -> Amount {
        self.sources.iter().map(|s| s.balance).sum()
    }

    pub fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            total_assets: self.total_assets,
            total_shares: self.total_shares,
            idle: self.idle,
            deployed: self.deployed(),
        }
    }

    /// Share conservation: shares add up across positions and assets add up
    /// across sources plus the idle buffer.
    pub fn is_conserved(&self) -> bool {
        let user_shares: Amount = self.positions.values().map(|p| p.shares).sum();
        user_shares == self.total_shares && self.deployed() + self.idle == self.total_assets
    }

    /// Move a source's recorded balance to what the venue reports, carrying the
    /// difference into `total_assets`.
    pub fn mark_to_market(&mut self, idx: usize, live: Amount) {
        let recorded = self.sources[idx].balance;
        if live >= recorded {
            self.total_assets += live - recorded;
        } else {
            self.total_assets = self.total_assets.saturating_sub(recorded - live);
        }
        self.sources[idx].balance = live;
    }

    /// Record a withdrawal from a venue: `requested` leaves the source,
    /// `received` lands in the idle buffer, the gap is realized as a loss.
    pub fn settle_withdrawal(&mut self, idx: usize, requested: Amount, received: Amount) {
        let source = &mut self.sources[idx];
        source.balance = source.balance.saturating_sub(requested);
        self.idle += received;
        self.total_assets = self
            .total_assets
            .saturating_sub(requested.saturating_sub(received));
    }

    /// Record capital moved from the idle buffer into a venue.
    pub fn settle_deposit(&mut self, idx: usize, amount: Amount) {
        let source = &mut self.sources[idx];
        source.balance += amount;
        source.total_deposited += amount;
        self.idle -= amount;
    }
}
