//! Pooled share accounting over a registry of yield sources.
//!
//! Deposits mint shares against `total_assets`, get routed to active sources
//! by target allocation, and are pulled back on withdrawal. Keepers harvest
//! yield (net of the performance fee, compounding into `total_assets`) and
//! rebalance drifted sources back to target.
//!
//! Every operation works on a clone of the book. Validation happens before
//! any external call; after that, each step touches the clone only once the
//! venue or custody call it records has succeeded, so the clone is committed
//! even when a later step fails.

pub mod book;
pub mod rebalance;
pub mod withdrawal;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{Result, RouterError};
use crate::model::amount::{apply_bps, assets_for_shares, mul_div, shares_for_deposit};
use crate::model::{
    AllocationPolicy, Amount, BPS_SCALE, Bps, HarvestRecord, LedgerPosition, SourceId, SourceSpec,
    SourceStatus, YieldSource,
};
use crate::venues::{TokenCustody, VenueAdapter};

pub use book::{LedgerBook, LedgerTotals};
pub use rebalance::{Direction, RebalanceMove, RebalanceReport};

/// Outcome of a harvest pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    /// One record per source above the dust threshold, failures included.
    pub records: Vec<HarvestRecord>,
    pub harvested: Amount,
    pub fees: Amount,
    /// Set when the pass triggered an auto-rebalance.
    pub rebalance: Option<RebalanceReport>,
}

/// Per-source outcome of an emergency shutdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub exited: Vec<(SourceId, Amount)>,
    pub failed: Vec<(SourceId, String)>,
}

pub struct AllocationLedger {
    config: LedgerConfig,
    book: LedgerBook,
    venues: HashMap<SourceId, Box<dyn VenueAdapter>>,
    custody: Arc<dyn TokenCustody>,
}

impl AllocationLedger {
    pub fn new(config: LedgerConfig, custody: Arc<dyn TokenCustody>) -> Self {
        let book = LedgerBook::new(config.policy.clone(), config.harvest_history);
        Self {
            config,
            book,
            venues: HashMap::new(),
            custody,
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn book(&self) -> &LedgerBook {
        &self.book
    }

    pub fn sources(&self) -> &[YieldSource] {
        &self.book.sources
    }

    pub fn source(&self, id: &str) -> Result<&YieldSource> {
        self.book.source(id)
    }

    pub fn position(&self, user: &str) -> Option<&LedgerPosition> {
        self.book.positions.get(user)
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.book.policy
    }

    pub fn totals(&self) -> LedgerTotals {
        self.book.totals()
    }

    pub fn harvest_history(&self) -> Vec<HarvestRecord> {
        self.book.harvests.to_vec()
    }

    /// Assets per share; 1.0 for an empty pool.
    pub fn share_price(&self) -> f64 {
        if self.book.total_shares == 0 {
            return 1.0;
        }
        self.book.total_assets as f64 / self.book.total_shares as f64
    }

    pub fn is_conserved(&self) -> bool {
        self.book.is_conserved()
    }

    pub fn needs_rebalance(&self) -> Result<bool> {
        rebalance::needs_rebalance(&self.book)
    }

    /// Replace the book with a persisted one. Venues must be re-attached for
    /// every source that still holds capital.
    pub fn restore(&mut self, book: LedgerBook) {
        self.book = book;
    }

    pub fn attach_venue(&mut self, id: &str, venue: Box<dyn VenueAdapter>) -> Result<()> {
        self.book.index_of(id)?;
        self.venues.insert(id.to_string(), venue);
        Ok(())
    }

    // ── Registry ────────────────────────────────────────────────────

    pub fn add_source(&mut self, spec: SourceSpec, venue: Box<dyn VenueAdapter>, now: u64) -> Result<()> {
        if self.book.sources.iter().any(|s| s.id == spec.id) {
            return Err(RouterError::DuplicateSource(spec.id));
        }
        let registered = self
            .book
            .sources
            .iter()
            .filter(|s| s.status != SourceStatus::Removed)
            .count();
        if registered >= self.config.max_sources {
            return Err(RouterError::RegistryFull {
                capacity: self.config.max_sources,
            });
        }
        if spec.token != self.config.asset {
            return Err(RouterError::TokenMismatch {
                source_id: spec.id,
                token: spec.token,
                expected: self.config.asset.clone(),
            });
        }
        if !(1..=10).contains(&spec.risk_level) {
            return Err(RouterError::range("risk_level", spec.risk_level, 1, 10));
        }
        if spec.max_allocation > BPS_SCALE || spec.min_allocation > spec.max_allocation {
            return Err(RouterError::InvalidInput(format!(
                "allocation bounds {}..={} for `{}` are not a valid bps range",
                spec.min_allocation, spec.max_allocation, spec.id
            )));
        }
        self.check_bounds(&spec.id, spec.target_allocation, spec.min_allocation, spec.max_allocation)?;
        self.book.check_allocation_budget(None, spec.target_allocation)?;

        let idx = self.book.sources.len();
        info!(
            source = %spec.id,
            target_bps = spec.target_allocation,
            risk = spec.risk_level,
            "source registered"
        );
        self.venues.insert(spec.id.clone(), venue);
        self.book.sources.push(YieldSource::from_spec(spec, idx, now));
        Ok(())
    }

    /// Harvest, drain, then logically delete. Returns capital recovered to the
    /// idle buffer. The source keeps its history and is never reused.
    pub async fn remove_source(&mut self, id: &str, now: u64) -> Result<Amount> {
        let idx = self.book.index_of(id)?;
        if self.book.sources[idx].status == SourceStatus::Removed {
            return Err(self.unavailable(idx));
        }
        let mut book = self.book.clone();
        let result = self.retire(&mut book, idx, now).await;
        self.book = book;
        let recovered = result?;
        self.book.sources[idx].status = SourceStatus::Removed;
        self.book.sources[idx].target_allocation = 0;
        self.venues.remove(id);
        info!(source = %id, recovered = %recovered, "source removed");
        Ok(recovered)
    }

    pub async fn set_source_active(&mut self, id: &str, active: bool, now: u64) -> Result<()> {
        let idx = self.book.index_of(id)?;
        match (self.book.sources[idx].status, active) {
            (SourceStatus::Active, true) | (SourceStatus::Inactive, false) => Ok(()),
            (SourceStatus::Active, false) => {
                let mut book = self.book.clone();
                let result = self.retire(&mut book, idx, now).await;
                self.book = book;
                let recovered = result?;
                self.book.sources[idx].status = SourceStatus::Inactive;
                info!(source = %id, recovered = %recovered, "source deactivated");
                Ok(())
            }
            (SourceStatus::Inactive, true) => {
                self.book
                    .check_allocation_budget(Some(idx), self.book.sources[idx].target_allocation)?;
                let mut book = self.book.clone();
                book.sources[idx].status = SourceStatus::Active;
                info!(source = %id, "source reactivated");
                self.targeted_rebalance(&mut book, idx).await;
                self.book = book;
                Ok(())
            }
            _ => Err(self.unavailable(idx)),
        }
    }

    /// Change one source's target. Auto-rebalance then moves only that source.
    pub async fn update_allocation(&mut self, id: &str, target: Bps) -> Result<()> {
        let idx = self.book.index_of(id)?;
        let source = &self.book.sources[idx];
        if matches!(source.status, SourceStatus::EmergencyExit | SourceStatus::Removed) {
            return Err(self.unavailable(idx));
        }
        self.check_bounds(id, target, source.min_allocation, source.max_allocation)?;
        if source.is_active() {
            self.book.check_allocation_budget(Some(idx), target)?;
        }
        let previous = source.target_allocation;

        let mut book = self.book.clone();
        book.sources[idx].target_allocation = target;
        info!(source = %id, from_bps = previous, to_bps = target, "allocation updated");
        if book.sources[idx].is_active() {
            self.targeted_rebalance(&mut book, idx).await;
        }
        self.book = book;
        Ok(())
    }

    pub fn report_apy(&mut self, id: &str, apy: Bps) -> Result<()> {
        let idx = self.book.index_of(id)?;
        self.book.sources[idx].apy = apy;
        debug!(source = %id, apy_bps = apy, "apy reported");
        Ok(())
    }

    pub fn set_policy(&mut self, policy: AllocationPolicy) -> Result<()> {
        if !(1..=10).contains(&policy.risk_tolerance) {
            return Err(RouterError::range("risk_tolerance", policy.risk_tolerance, 1, 10));
        }
        for (field, value) in [
            ("max_single_source", policy.max_single_source),
            ("rebalance_threshold", policy.rebalance_threshold),
        ] {
            if value > BPS_SCALE {
                return Err(RouterError::range(field, value, 0, BPS_SCALE as u64));
            }
        }
        if let Some(over) = self
            .book
            .sources
            .iter()
            .find(|s| s.is_active() && s.target_allocation > policy.max_single_source)
        {
            return Err(RouterError::AllocationOutOfBounds {
                source_id: over.id.clone(),
                allocation: over.target_allocation,
                min: over.min_allocation,
                max: policy.max_single_source,
            });
        }
        info!(
            emergency = policy.emergency_mode,
            auto_rebalance = policy.auto_rebalance,
            threshold_bps = policy.rebalance_threshold,
            "allocation policy updated"
        );
        self.book.policy = policy;
        Ok(())
    }

    // ── Deposits and withdrawals ────────────────────────────────────

    /// Pull `amount` from `user`, mint shares and route capital by target
    /// allocation. A venue that refuses its portion leaves it idle for the
    /// next rebalance. Returns the shares minted.
    pub async fn deposit(&mut self, user: &str, amount: Amount, now: u64) -> Result<Amount> {
        if amount == 0 {
            return Err(RouterError::ZeroAmount);
        }
        if self.book.policy.emergency_mode {
            return Err(RouterError::EmergencyMode);
        }
        let shares = shares_for_deposit(amount, self.book.total_shares, self.book.total_assets)?;
        if shares == 0 {
            return Err(RouterError::InvalidInput(format!(
                "deposit of {amount} is too small to mint a share"
            )));
        }
        let mut routes = Vec::new();
        for (idx, source) in self.book.sources.iter().enumerate() {
            if !source.is_active() {
                continue;
            }
            let portion = apply_bps(amount, source.target_allocation)?;
            if portion > 0 {
                routes.push((idx, portion));
            }
        }

        self.custody
            .transfer(&self.config.asset, user, &self.config.account, amount)
            .await
            .map_err(RouterError::Custody)?;

        let mut book = self.book.clone();
        book.idle += amount;
        book.total_assets += amount;
        book.total_shares += shares;

        let mut routed = Vec::with_capacity(routes.len());
        for (idx, portion) in routes {
            let id = book.sources[idx].id.clone();
            let venue = venue_mut(&mut self.venues, &id)?;
            match venue.deposit(portion).await {
                Ok(()) => {
                    book.settle_deposit(idx, portion);
                    routed.push((id, portion));
                }
                Err(err) => warn!(source = %id, error = %err, "deposit routing failed, left idle"),
            }
        }

        let position = book.positions.entry(user.to_string()).or_default();
        position.total_deposited += amount;
        position.cost_basis += amount;
        position.shares += shares;
        position.last_deposit = now;
        for (id, portion) in routed {
            *position.allocations.entry(id).or_insert(0) += portion;
        }

        info!(user, amount = %amount, shares = %shares, "deposit");
        self.book = book;
        Ok(shares)
    }

    /// Burn `shares` and pay out their pro-rata value. Pending yield is harvested
    /// first; a shortfall in the idle buffer is pulled from sources in the
    /// configured withdrawal order. Returns the amount paid.
    pub async fn withdraw(&mut self, user: &str, shares: Amount, now: u64) -> Result<Amount> {
        if shares == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let held = self.book.positions.get(user).map(|p| p.shares).unwrap_or(0);
        if held < shares {
            return Err(RouterError::InsufficientShares {
                requested: shares,
                available: held,
            });
        }

        let mut book = self.book.clone();
        let result = self.withdraw_into(&mut book, user, shares, now).await;
        self.book = book;
        result
    }

    async fn withdraw_into(&mut self, book: &mut LedgerBook, user: &str, shares: Amount, now: u64) -> Result<Amount> {
        if !book.policy.emergency_mode {
            self.harvest_eligible(book, now).await?;
        }

        let amount = assets_for_shares(shares, book.total_shares, book.total_assets)?;
        if amount > book.idle {
            for idx in withdrawal::drain_order(&book.sources, self.config.withdrawal_order) {
                if book.idle >= amount {
                    break;
                }
                let take = (amount - book.idle).min(book.sources[idx].balance);
                let id = book.sources[idx].id.clone();
                let venue = venue_mut(&mut self.venues, &id)?;
                match venue.withdraw(take).await {
                    Ok(received) => {
                        let received = received.min(take);
                        book.settle_withdrawal(idx, take, received);
                        debug!(source = %id, requested = %take, received = %received, "shortfall pulled");
                    }
                    Err(err) => warn!(source = %id, error = %err, "shortfall pull failed"),
                }
            }
        }
        // Slippage on the pull is a pool loss; the payout is capped by what arrived.
        let amount = amount.min(assets_for_shares(shares, book.total_shares, book.total_assets)?);
        if amount > book.idle {
            return Err(RouterError::InsufficientLiquidity {
                requested: amount,
                available: book.idle,
            });
        }

        self.custody
            .transfer(&self.config.asset, &self.config.account, user, amount)
            .await
            .map_err(RouterError::Custody)?;
        book.idle -= amount;
        book.total_assets -= amount;
        book.total_shares -= shares;

        let position = book.positions.entry(user.to_string()).or_default();
        let basis_released = mul_div(position.cost_basis, shares, position.shares)?;
        for allocated in position.allocations.values_mut() {
            *allocated -= mul_div(*allocated, shares, position.shares)?;
        }
        position.cost_basis -= basis_released;
        position.yield_earned += amount.saturating_sub(basis_released);
        position.total_withdrawn += amount;
        position.shares -= shares;
        position.last_withdraw = now;

        info!(user, shares = %shares, amount = %amount, "withdraw");
        Ok(amount)
    }

    // ── Harvesting ──────────────────────────────────────────────────

    /// Harvest every active source with capital. A failing venue is recorded
    /// as an unsuccessful harvest and does not stop the others.
    pub async fn harvest_all(&mut self, now: u64) -> Result<HarvestReport> {
        let mut book = self.book.clone();
        let result = self.harvest_eligible(&mut book, now).await;
        let report = match result {
            Ok(mut report) => {
                report.rebalance = self.auto_rebalance(&mut book).await;
                Ok(report)
            }
            Err(err) => Err(err),
        };
        self.book = book;
        report
    }

    pub async fn harvest_source(&mut self, id: &str, now: u64) -> Result<HarvestReport> {
        let idx = self.book.index_of(id)?;
        if !self.book.sources[idx].is_active() {
            return Err(self.unavailable(idx));
        }
        let mut book = self.book.clone();
        let result = self.harvest_one(&mut book, idx, now).await;
        let report = match result {
            Ok(record) => {
                let mut report = HarvestReport::default();
                if let Some(record) = record {
                    report.harvested = record.harvested;
                    report.fees = record.harvested - record.profit;
                    report.records.push(record);
                }
                report.rebalance = self.auto_rebalance(&mut book).await;
                Ok(report)
            }
            Err(err) => Err(err),
        };
        self.book = book;
        report
    }

    async fn harvest_eligible(&mut self, book: &mut LedgerBook, now: u64) -> Result<HarvestReport> {
        let mut report = HarvestReport::default();
        for idx in 0..book.sources.len() {
            let source = &book.sources[idx];
            if !source.is_active() || source.balance == 0 {
                continue;
            }
            let id = source.id.clone();
            match self.harvest_one(book, idx, now).await {
                Ok(Some(record)) => {
                    report.harvested += record.harvested;
                    report.fees += record.harvested - record.profit;
                    report.records.push(record);
                }
                Ok(None) => {}
                Err(err @ RouterError::Venue { .. }) => {
                    warn!(source = %id, error = %err, "harvest failed");
                    let record = HarvestRecord {
                        timestamp: now,
                        source: id,
                        harvested: 0,
                        profit: 0,
                        success: false,
                    };
                    book.harvests.push(record.clone());
                    report.records.push(record);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Realize one source's yield, take the performance fee, compound the rest.
    /// Yield below the dust threshold is compounded without a fee or a record.
    async fn harvest_one(&mut self, book: &mut LedgerBook, idx: usize, now: u64) -> Result<Option<HarvestRecord>> {
        let id = book.sources[idx].id.clone();
        let venue = venue_mut(&mut self.venues, &id)?;
        let harvested = venue
            .harvest()
            .await
            .map_err(|e| RouterError::venue(&id, e))?;
        let live_apy = venue.current_apy();

        let dust = harvested < self.config.min_harvest;
        let fee = if dust {
            0
        } else {
            apply_bps(harvested, self.config.performance_fee)?
        };
        // The harvested tokens already sit in the ledger account.
        let fee_paid = if fee > 0 {
            self.custody
                .transfer(&self.config.asset, &self.config.account, &self.config.fee_recipient, fee)
                .await
                .map_err(RouterError::Custody)
        } else {
            Ok(())
        };

        let source = &mut book.sources[idx];
        source.last_harvest = now;
        source.total_harvested += harvested;
        if let Some(apy) = live_apy {
            source.apy = apy;
        }
        let fee = if fee_paid.is_ok() { fee } else { 0 };
        let profit = harvested - fee;
        book.idle += profit;
        book.total_assets += profit;
        book.fees_paid += fee;
        fee_paid?;

        if harvested == 0 {
            return Ok(None);
        }
        if dust {
            debug!(source = %id, harvested = %harvested, "harvest below dust threshold");
            return Ok(None);
        }
        let record = HarvestRecord {
            timestamp: now,
            source: id.clone(),
            harvested,
            profit,
            success: true,
        };
        book.harvests.push(record.clone());
        info!(source = %id, harvested = %harvested, fee = %fee, profit = %profit, "harvest");
        Ok(Some(record))
    }

    // ── Rebalancing ─────────────────────────────────────────────────

    /// Move capital until every active source is within the policy threshold
    /// of its target, reading live venue balances first. Withdrawals run
    /// before deposits; deposits are bounded by the idle buffer.
    pub async fn rebalance(&mut self) -> Result<RebalanceReport> {
        if self.book.policy.emergency_mode {
            return Err(RouterError::EmergencyMode);
        }
        let mut book = self.book.clone();
        let result = self.rebalance_book(&mut book).await;
        self.book = book;
        result
    }

    async fn auto_rebalance(&mut self, book: &mut LedgerBook) -> Option<RebalanceReport> {
        if !book.policy.auto_rebalance || book.policy.emergency_mode {
            return None;
        }
        match rebalance::needs_rebalance(book) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                warn!(error = %err, "rebalance check failed");
                return None;
            }
        }
        match self.rebalance_book(book).await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "auto-rebalance failed");
                None
            }
        }
    }

    async fn rebalance_book(&mut self, book: &mut LedgerBook) -> Result<RebalanceReport> {
        for idx in 0..book.sources.len() {
            if book.sources[idx].is_active() {
                self.sync_balance(book, idx).await?;
            }
        }
        let threshold = book.policy.rebalance_threshold;
        let plan = rebalance::plan(book, threshold)?;
        let mut report = RebalanceReport::default();
        for (idx, direction, amount) in plan {
            match self.execute_move(book, idx, direction, amount).await {
                Ok(Some(mv)) => report.moves.push(mv),
                Ok(None) => {}
                Err(err) => warn!(source = %book.sources[idx].id, error = %err, "rebalance move failed"),
            }
        }
        if !report.is_empty() {
            book.rebalances += 1;
            info!(
                moves = report.moves.len(),
                withdrawn = %report.moved(Direction::Withdraw),
                deposited = %report.moved(Direction::Deposit),
                "rebalance"
            );
        }
        Ok(report)
    }

    /// Rebalance a single source after a target or status change, when the
    /// policy allows it. Failures are logged and left to the next keeper pass.
    async fn targeted_rebalance(&mut self, book: &mut LedgerBook, idx: usize) {
        if !book.policy.auto_rebalance || book.policy.emergency_mode {
            return;
        }
        let id = book.sources[idx].id.clone();
        if let Err(err) = self.sync_balance(book, idx).await {
            warn!(source = %id, error = %err, "targeted rebalance skipped");
            return;
        }
        let threshold = book.policy.rebalance_threshold;
        let planned = match rebalance::plan_source(book, idx, threshold) {
            Ok(planned) => planned,
            Err(err) => {
                warn!(source = %id, error = %err, "targeted rebalance skipped");
                return;
            }
        };
        if let Some((direction, amount)) = planned {
            match self.execute_move(book, idx, direction, amount).await {
                Ok(Some(_)) => book.rebalances += 1,
                Ok(None) => {}
                Err(err) => warn!(source = %id, error = %err, "targeted rebalance failed"),
            }
        }
    }

    async fn execute_move(
        &mut self,
        book: &mut LedgerBook,
        idx: usize,
        direction: Direction,
        amount: Amount,
    ) -> Result<Option<RebalanceMove>> {
        let id = book.sources[idx].id.clone();
        let venue = venue_mut(&mut self.venues, &id)?;
        let moved = match direction {
            Direction::Withdraw => {
                let received = venue
                    .withdraw(amount)
                    .await
                    .map_err(|e| RouterError::venue(&id, e))?
                    .min(amount);
                book.settle_withdrawal(idx, amount, received);
                amount
            }
            Direction::Deposit => {
                let funded = amount.min(book.idle);
                if funded == 0 {
                    return Ok(None);
                }
                venue
                    .deposit(funded)
                    .await
                    .map_err(|e| RouterError::venue(&id, e))?;
                book.settle_deposit(idx, funded);
                funded
            }
        };
        debug!(source = %id, ?direction, amount = %moved, "rebalance move");
        Ok(Some(RebalanceMove {
            source: id,
            direction,
            amount: moved,
        }))
    }

    // ── Emergency paths ─────────────────────────────────────────────

    /// Harvest and drain one source, then retire it permanently.
    pub async fn emergency_exit(&mut self, id: &str, now: u64) -> Result<Amount> {
        let idx = self.book.index_of(id)?;
        let mut book = self.book.clone();
        let result = self.exit_into(&mut book, idx, now).await;
        self.book = book;
        result
    }

    /// Enter emergency mode and exit every source independently; one failing
    /// venue does not block the rest.
    pub async fn emergency_shutdown(&mut self, now: u64) -> ShutdownReport {
        let mut book = self.book.clone();
        book.policy.emergency_mode = true;
        warn!("emergency shutdown started");

        let mut report = ShutdownReport::default();
        for idx in 0..book.sources.len() {
            if matches!(
                book.sources[idx].status,
                SourceStatus::EmergencyExit | SourceStatus::Removed
            ) {
                continue;
            }
            let id = book.sources[idx].id.clone();
            match self.exit_into(&mut book, idx, now).await {
                Ok(recovered) => report.exited.push((id, recovered)),
                Err(err) => report.failed.push((id, err.to_string())),
            }
        }
        warn!(
            exited = report.exited.len(),
            failed = report.failed.len(),
            "emergency shutdown finished"
        );
        self.book = book;
        report
    }

    async fn exit_into(&mut self, book: &mut LedgerBook, idx: usize, now: u64) -> Result<Amount> {
        if matches!(
            book.sources[idx].status,
            SourceStatus::EmergencyExit | SourceStatus::Removed
        ) {
            return Err(self.unavailable(idx));
        }
        let id = book.sources[idx].id.clone();
        // Getting capital out matters more than the last harvest.
        if let Err(err) = self.harvest_one(book, idx, now).await {
            warn!(source = %id, error = %err, "harvest before exit failed");
        }
        match self.drain(book, idx).await {
            Ok(recovered) => {
                book.sources[idx].status = SourceStatus::EmergencyExit;
                warn!(source = %id, recovered = %recovered, "source emergency-exited");
                Ok(recovered)
            }
            Err(err) => {
                warn!(source = %id, error = %err, "emergency exit failed");
                Err(err)
            }
        }
    }

    // ── Venue plumbing ──────────────────────────────────────────────

    /// Harvest then drain, the common first half of deactivate and remove.
    async fn retire(&mut self, book: &mut LedgerBook, idx: usize, now: u64) -> Result<Amount> {
        if book.sources[idx].is_exited() {
            return Ok(0);
        }
        self.harvest_one(book, idx, now).await?;
        self.drain(book, idx).await
    }

    async fn sync_balance(&mut self, book: &mut LedgerBook, idx: usize) -> Result<()> {
        let id = book.sources[idx].id.clone();
        let venue = venue_mut(&mut self.venues, &id)?;
        let live = venue
            .balance()
            .await
            .map_err(|e| RouterError::venue(&id, e))?;
        if live != book.sources[idx].balance {
            debug!(source = %id, recorded = %book.sources[idx].balance, live = %live, "balance drift");
            book.mark_to_market(idx, live);
        }
        Ok(())
    }

    /// Withdraw everything a source holds into the idle buffer.
    async fn drain(&mut self, book: &mut LedgerBook, idx: usize) -> Result<Amount> {
        self.sync_balance(book, idx).await?;
        let balance = book.sources[idx].balance;
        if balance == 0 {
            return Ok(0);
        }
        let id = book.sources[idx].id.clone();
        let venue = venue_mut(&mut self.venues, &id)?;
        let received = venue
            .withdraw(balance)
            .await
            .map_err(|e| RouterError::venue(&id, e))?
            .min(balance);
        book.settle_withdrawal(idx, balance, received);
        Ok(received)
    }

    /// Forward time to every venue adapter.
    pub async fn tick_venues(&mut self, now: u64, dt_secs: u64) -> Result<()> {
        for (id, venue) in self.venues.iter_mut() {
            venue
                .tick(now, dt_secs)
                .await
                .map_err(|e| RouterError::venue(id, e))?;
        }
        Ok(())
    }

    fn check_bounds(&self, id: &str, target: Bps, min: Bps, max: Bps) -> Result<()> {
        let max = max.min(self.book.policy.max_single_source);
        if target < min || target > max {
            return Err(RouterError::AllocationOutOfBounds {
                source_id: id.to_string(),
                allocation: target,
                min,
                max,
            });
        }
        Ok(())
    }

    fn unavailable(&self, idx: usize) -> RouterError {
        let source = &self.book.sources[idx];
        RouterError::SourceUnavailable {
            source_id: source.id.clone(),
            status: source.status.to_string(),
        }
    }
}

fn venue_mut<'a>(
    venues: &'a mut HashMap<SourceId, Box<dyn VenueAdapter>>,
    id: &str,
) -> Result<&'a mut Box<dyn VenueAdapter>> {
    venues
        .get_mut(id)
        .ok_or_else(|| RouterError::UnknownSource(id.to_string()))
}
