//! Strategy lifecycle, share accounting, fee-adjusted compounding and
//! keeper-driven rebalancing. Venue-specific work is delegated to an
//! `ExecutionHook` chosen by strategy type.

pub mod hooks;
pub mod metrics;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StrategyEngineConfig;
use crate::engine::RingHistory;
use crate::error::{Result, RouterError};
use crate::model::amount::{SECS_PER_YEAR, accrue, apply_bps, assets_for_shares, mul_div, shares_for_deposit};
use crate::model::{
    Amount, BPS_SCALE, HarvestRecord, PerformanceMetrics, RebalanceParams, Strategy, StrategyConfig,
    StrategyId, StrategySpec, StrategyStatus, StrategyType, UserStake,
};
use crate::venues::TokenCustody;

pub use hooks::{AccountingHook, ExecutionHook};
pub use metrics::ReturnsTracker;

/// Everything persisted for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyBook {
    pub strategy: Strategy,
    pub config: StrategyConfig,
    pub metrics: PerformanceMetrics,
    pub harvests: RingHistory<HarvestRecord>,
    pub returns: ReturnsTracker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub books: BTreeMap<StrategyId, StrategyBook>,
    pub next_id: StrategyId,
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            books: BTreeMap::new(),
            next_id: 1,
        }
    }
}

pub struct StrategyEngine {
    config: StrategyEngineConfig,
    state: StrategyState,
    hooks: HashMap<StrategyType, Box<dyn ExecutionHook>>,
    fallback: Box<dyn ExecutionHook>,
    custody: Arc<dyn TokenCustody>,
}

impl StrategyEngine {
    pub fn new(config: StrategyEngineConfig, custody: Arc<dyn TokenCustody>) -> Self {
        Self {
            config,
            state: StrategyState::default(),
            hooks: HashMap::new(),
            fallback: Box::new(AccountingHook::new()),
            custody,
        }
    }

    /// Route every strategy of `strategy_type` through `hook`.
    pub fn set_hook(&mut self, strategy_type: StrategyType, hook: Box<dyn ExecutionHook>) {
        self.hooks.insert(strategy_type, hook);
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn config(&self) -> &StrategyEngineConfig {
        &self.config
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn restore(&mut self, state: StrategyState) {
        self.state = state;
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.state.books.values().map(|b| &b.strategy)
    }

    pub fn strategy(&self, id: StrategyId) -> Result<&Strategy> {
        self.book(id).map(|b| &b.strategy)
    }

    pub fn strategy_config(&self, id: StrategyId) -> Result<&StrategyConfig> {
        self.book(id).map(|b| &b.config)
    }

    pub fn metrics(&self, id: StrategyId) -> Result<&PerformanceMetrics> {
        self.book(id).map(|b| &b.metrics)
    }

    pub fn harvest_history(&self, id: StrategyId) -> Result<Vec<HarvestRecord>> {
        self.book(id).map(|b| b.harvests.to_vec())
    }

    pub fn stake(&self, id: StrategyId, user: &str) -> Option<&UserStake> {
        self.state.books.get(&id).and_then(|b| b.strategy.stake(user))
    }

    /// Custody account holding a strategy's capital.
    pub fn account(&self, id: StrategyId) -> String {
        format!("{}:{id}", self.config.account_prefix)
    }

    fn book(&self, id: StrategyId) -> Result<&StrategyBook> {
        self.state.books.get(&id).ok_or(RouterError::UnknownStrategy(id))
    }

    /// Distinct strategies in which `user` holds shares.
    fn holdings(&self, user: &str) -> usize {
        self.state
            .books
            .values()
            .filter(|b| b.strategy.stake(user).is_some_and(|s| s.shares > 0))
            .count()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Create a strategy in `Inactive` status with the engine's default config.
    pub fn create_strategy(&mut self, spec: StrategySpec, now: u64) -> Result<StrategyId> {
        if spec.name.trim().is_empty() {
            return Err(RouterError::InvalidInput("strategy name is empty".to_string()));
        }
        if spec.input_tokens.is_empty() {
            return Err(RouterError::InvalidInput(format!(
                "strategy `{}` declares no input tokens",
                spec.name
            )));
        }
        if spec.performance_fee > self.config.max_performance_fee {
            return Err(RouterError::range(
                "performance_fee",
                spec.performance_fee,
                0,
                self.config.max_performance_fee as u64,
            ));
        }
        if spec.management_fee > self.config.max_management_fee {
            return Err(RouterError::range(
                "management_fee",
                spec.management_fee,
                0,
                self.config.max_management_fee as u64,
            ));
        }
        if !(1..=10).contains(&spec.risk_level) {
            return Err(RouterError::range("risk_level", spec.risk_level, 1, 10));
        }
        if spec.min_deposit > spec.max_deposit {
            return Err(RouterError::InvalidInput(format!(
                "min_deposit {} exceeds max_deposit {}",
                spec.min_deposit, spec.max_deposit
            )));
        }
        if spec.harvest_interval == 0 {
            return Err(RouterError::range("harvest_interval", spec.harvest_interval, 1, u64::MAX));
        }

        let id = self.state.next_id;
        let strategy = Strategy::from_spec(id, spec, now);
        info!(strategy = id, name = %strategy.name, kind = ?strategy.strategy_type, "strategy created");
        self.state.books.insert(
            id,
            StrategyBook {
                strategy,
                config: self.config.default_config.clone(),
                metrics: PerformanceMetrics::default(),
                harvests: RingHistory::new(self.config.harvest_history),
                returns: ReturnsTracker::new(self.config.harvest_history),
            },
        );
        self.state.next_id += 1;
        Ok(id)
    }

    pub fn set_status(&mut self, id: StrategyId, next: StrategyStatus) -> Result<()> {
        let book = self
            .state
            .books
            .get_mut(&id)
            .ok_or(RouterError::UnknownStrategy(id))?;
        let current = book.strategy.status;
        if !current.can_transition_to(next) {
            return Err(RouterError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        book.strategy.status = next;
        if next == StrategyStatus::Emergency {
            warn!(strategy = id, from = %current, "strategy entered emergency");
        } else {
            info!(strategy = id, from = %current, to = %next, "strategy status changed");
        }
        Ok(())
    }

    pub fn activate(&mut self, id: StrategyId) -> Result<()> {
        self.set_status(id, StrategyStatus::Active)
    }

    pub fn pause(&mut self, id: StrategyId) -> Result<()> {
        self.set_status(id, StrategyStatus::Paused)
    }

    pub fn resume(&mut self, id: StrategyId) -> Result<()> {
        let status = self.strategy(id)?.status;
        if status != StrategyStatus::Paused {
            return Err(RouterError::InvalidTransition {
                from: status.to_string(),
                to: StrategyStatus::Active.to_string(),
            });
        }
        self.set_status(id, StrategyStatus::Active)
    }

    pub fn deprecate(&mut self, id: StrategyId) -> Result<()> {
        self.set_status(id, StrategyStatus::Deprecated)
    }

    pub fn enter_emergency(&mut self, id: StrategyId) -> Result<()> {
        self.set_status(id, StrategyStatus::Emergency)
    }

    /// Leave emergency into `Paused`; an admin resumes explicitly.
    pub fn resolve_emergency(&mut self, id: StrategyId) -> Result<()> {
        let status = self.strategy(id)?.status;
        if status != StrategyStatus::Emergency {
            return Err(RouterError::InvalidTransition {
                from: status.to_string(),
                to: StrategyStatus::Paused.to_string(),
            });
        }
        self.set_status(id, StrategyStatus::Paused)
    }

    pub fn update_config(&mut self, id: StrategyId, config: StrategyConfig) -> Result<()> {
        for (field, value) in [
            ("deposit_fee", config.deposit_fee),
            ("withdrawal_fee", config.withdrawal_fee),
        ] {
            if value > self.config.max_flow_fee {
                return Err(RouterError::range(field, value, 0, self.config.max_flow_fee as u64));
            }
        }
        for (field, value) in [
            ("rebalance_threshold", config.rebalance_threshold),
            ("slippage_tolerance", config.slippage_tolerance),
        ] {
            if value > BPS_SCALE {
                return Err(RouterError::range(field, value, 0, BPS_SCALE as u64));
            }
        }
        let book = self
            .state
            .books
            .get_mut(&id)
            .ok_or(RouterError::UnknownStrategy(id))?;
        book.config = config;
        info!(strategy = id, "strategy config updated");
        Ok(())
    }

    // ── Deposits and withdrawals ────────────────────────────────────

    /// Deposit `amount` for `user`, net of the deposit fee. Returns shares minted.
    pub async fn deposit(&mut self, user: &str, id: StrategyId, amount: Amount, now: u64) -> Result<Amount> {
        if amount == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let book = self.book(id)?;
        let strategy = &book.strategy;
        if strategy.status != StrategyStatus::Active {
            return Err(unavailable(strategy));
        }
        let total = strategy
            .total_deposited
            .checked_add(amount)
            .ok_or(RouterError::Overflow { op: "strategy deposit" })?;
        if total > strategy.max_deposit {
            return Err(RouterError::DepositAboveMaximum {
                total,
                max: strategy.max_deposit,
            });
        }
        if amount < strategy.min_deposit {
            return Err(RouterError::DepositBelowMinimum {
                amount,
                min: strategy.min_deposit,
            });
        }
        let already_holds = strategy.stake(user).is_some_and(|s| s.shares > 0);
        let limit = self.config.max_strategies_per_user;
        if !already_holds && self.holdings(user) >= limit {
            return Err(RouterError::StrategyLimitReached {
                user: user.to_string(),
                limit,
            });
        }
        let fee = apply_bps(amount, book.config.deposit_fee)?;
        let net = amount - fee;
        let shares = shares_for_deposit(net, strategy.total_shares, strategy.total_deposited)?;
        if shares == 0 {
            return Err(RouterError::InvalidInput(format!(
                "deposit of {amount} is too small to mint a share"
            )));
        }

        // The whole amount moves in one transfer; every later failure hands it back.
        let account = self.account(id);
        let asset = self.config.asset.clone();
        self.custody
            .transfer(&asset, user, &account, amount)
            .await
            .map_err(RouterError::Custody)?;
        let strategy = strategy.clone();
        let hook = hook_mut(&mut self.hooks, &mut self.fallback, strategy.strategy_type);
        let deployed = hook.deploy(&strategy, net).await;
        if let Err(err) = deployed {
            warn!(strategy = id, error = %err, "deploy failed, refunding");
            self.refund(id, &account, user, amount).await;
            return Err(RouterError::venue(&account, err));
        }
        let charged = if fee > 0 {
            self.custody
                .transfer(&asset, &account, &self.config.fee_recipient, fee)
                .await
        } else {
            Ok(())
        };
        if let Err(err) = charged {
            warn!(strategy = id, error = %err, "deposit fee transfer failed, unwinding");
            let hook = hook_mut(&mut self.hooks, &mut self.fallback, strategy.strategy_type);
            let recalled = hook.withdraw(&strategy, net).await;
            if let Err(recall) = recalled {
                warn!(strategy = id, error = %recall, "recall after failed fee transfer failed");
            }
            self.refund(id, &account, user, amount).await;
            return Err(RouterError::Custody(err));
        }

        let book = self.book_mut(id)?;
        let strategy = &mut book.strategy;
        strategy.total_deposited += net;
        strategy.total_shares += shares;
        strategy.accrued_fees += fee;
        let stake = strategy.users.entry(user.to_string()).or_default();
        stake.shares += shares;
        stake.deposited += net;
        stake.last_deposit = now;
        book.returns
            .record_price(book.strategy.total_deposited, book.strategy.total_shares);

        info!(strategy = id, user, amount = %amount, fee = %fee, shares = %shares, "strategy deposit");
        Ok(shares)
    }

    /// Redeem `shares`. The withdrawal fee is taken from what the hook actually
    /// returned. Allowed in every status. Returns the amount paid to the user.
    pub async fn withdraw(&mut self, user: &str, id: StrategyId, shares: Amount, now: u64) -> Result<Amount> {
        if shares == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let book = self.book(id)?;
        let held = book.strategy.stake(user).map(|s| s.shares).unwrap_or(0);
        if held < shares {
            return Err(RouterError::InsufficientShares {
                requested: shares,
                available: held,
            });
        }
        let requested = assets_for_shares(shares, book.strategy.total_shares, book.strategy.total_deposited)?;
        let fee_bps = book.config.withdrawal_fee;
        let strategy = book.strategy.clone();

        let account = self.account(id);
        let hook = hook_mut(&mut self.hooks, &mut self.fallback, strategy.strategy_type);
        let actual = hook
            .withdraw(&strategy, requested)
            .await
            .map_err(|e| RouterError::venue(&account, e))?
            .min(requested);
        let fee = apply_bps(actual, fee_bps)?;
        let payout = actual - fee;
        self.pay_out(&account, user, payout, fee).await?;

        let book = self.book_mut(id)?;
        let strategy = &mut book.strategy;
        strategy.total_deposited -= requested;
        strategy.total_shares -= shares;
        strategy.accrued_fees += fee;
        if let Some(stake) = strategy.users.get_mut(user) {
            let basis = mul_div(stake.deposited, shares, stake.shares)?;
            stake.deposited -= basis;
            stake.shares -= shares;
        }
        book.returns
            .record_price(book.strategy.total_deposited, book.strategy.total_shares);

        debug!(strategy = id, requested = %requested, actual = %actual, "hook withdrawal settled");
        info!(strategy = id, user, shares = %shares, amount = %payout, fee = %fee, at = now, "strategy withdraw");
        Ok(payout)
    }

    /// Exit the caller's whole position with no fees, whatever the status.
    pub async fn emergency_withdraw(&mut self, user: &str, id: StrategyId, now: u64) -> Result<Amount> {
        let book = self.book(id)?;
        if !book.config.emergency_withdraw_enabled {
            return Err(RouterError::EmergencyWithdrawDisabled(id));
        }
        let stake = book.strategy.stake(user).cloned().unwrap_or_default();
        if stake.shares == 0 {
            return Err(RouterError::InsufficientShares {
                requested: 1,
                available: 0,
            });
        }
        let owed = assets_for_shares(stake.shares, book.strategy.total_shares, book.strategy.total_deposited)?;
        let strategy = book.strategy.clone();

        let account = self.account(id);
        let hook = hook_mut(&mut self.hooks, &mut self.fallback, strategy.strategy_type);
        let actual = hook
            .emergency_exit(&strategy, owed)
            .await
            .map_err(|e| RouterError::venue(&account, e))?
            .min(owed);
        let paid = actual + stake.rewards;
        self.pay_out(&account, user, paid, 0).await?;

        let book = self.book_mut(id)?;
        let strategy = &mut book.strategy;
        strategy.total_deposited -= owed;
        strategy.total_shares -= stake.shares;
        strategy.users.insert(user.to_string(), UserStake::default());
        book.returns
            .record_price(book.strategy.total_deposited, book.strategy.total_shares);

        warn!(strategy = id, user, amount = %paid, at = now, "emergency withdraw");
        Ok(paid)
    }

    /// Pay out rewards credited while auto-compound was off.
    pub async fn claim_rewards(&mut self, user: &str, id: StrategyId) -> Result<Amount> {
        let rewards = self
            .book(id)?
            .strategy
            .stake(user)
            .map(|s| s.rewards)
            .unwrap_or(0);
        if rewards == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let account = self.account(id);
        self.pay_out(&account, user, rewards, 0).await?;
        if let Some(stake) = self.book_mut(id)?.strategy.users.get_mut(user) {
            stake.rewards = 0;
        }
        info!(strategy = id, user, amount = %rewards, "rewards claimed");
        Ok(rewards)
    }

    // ── Harvest ─────────────────────────────────────────────────────

    /// Accrue rewards since the last harvest at the strategy's expected APY,
    /// take performance and management fees, then compound or credit the rest.
    pub async fn harvest(&mut self, id: StrategyId, now: u64) -> Result<HarvestRecord> {
        let book = self.book(id)?;
        let strategy = &book.strategy;
        if strategy.status != StrategyStatus::Active {
            return Err(unavailable(strategy));
        }
        let ready_at = strategy.last_harvest.saturating_add(strategy.harvest_interval);
        if now < ready_at {
            return Err(RouterError::HarvestNotReady {
                strategy_id: id,
                ready_at,
            });
        }
        let elapsed = now - strategy.last_harvest;
        let base = strategy.total_deposited;
        let rewards = accrue(base, strategy.expected_apy, elapsed)?;
        let performance_fee = apply_bps(rewards, strategy.performance_fee)?;
        let management_fee = accrue(base, strategy.management_fee, elapsed)?.min(rewards - performance_fee);
        let fees = performance_fee + management_fee;
        let net = rewards - fees;
        if net < book.config.min_profit_to_harvest {
            return Err(RouterError::BelowMinimumProfit {
                profit: net,
                min: book.config.min_profit_to_harvest,
            });
        }
        let auto_compound = book.config.auto_compound;

        let account = self.account(id);
        let asset = self.config.asset.clone();
        let reserve = self.config.rewards_account.clone();
        self.custody
            .transfer(&asset, &reserve, &account, net)
            .await
            .map_err(RouterError::Custody)?;
        if let Err(err) = self
            .custody
            .transfer(&asset, &reserve, &self.config.fee_recipient, fees)
            .await
        {
            if let Err(undo) = self.custody.transfer(&asset, &account, &reserve, net).await {
                warn!(strategy = id, error = %undo, "reward reversal failed");
            }
            return Err(RouterError::Custody(err));
        }

        let book = self.book_mut(id)?;
        let strategy = &mut book.strategy;
        if auto_compound {
            strategy.total_deposited += net;
        } else if strategy.total_shares > 0 {
            let total_shares = strategy.total_shares;
            let mut credited: Amount = 0;
            let holders: Vec<String> = strategy
                .users
                .iter()
                .filter(|(_, s)| s.shares > 0)
                .map(|(u, _)| u.clone())
                .collect();
            let last = holders.len().saturating_sub(1);
            for (i, user) in holders.iter().enumerate() {
                if let Some(stake) = strategy.users.get_mut(user) {
                    let share = if i == last {
                        net - credited
                    } else {
                        mul_div(net, stake.shares, total_shares)?
                    };
                    stake.rewards += share;
                    credited += share;
                }
            }
        }
        strategy.last_harvest = now;
        strategy.accrued_fees += fees;
        strategy.actual_apy = if base == 0 || elapsed == 0 {
            0
        } else {
            let period = base
                .checked_mul(elapsed as Amount)
                .ok_or(RouterError::Overflow { op: "strategy apy" })?;
            mul_div(net, BPS_SCALE as Amount * SECS_PER_YEAR as Amount, period)?.min(u32::MAX as Amount) as u32
        };

        let record = HarvestRecord {
            timestamp: now,
            source: account,
            harvested: rewards,
            profit: net,
            success: true,
        };
        book.harvests.push(record.clone());
        book.returns
            .record_price(book.strategy.total_deposited, book.strategy.total_shares);
        book.returns.record_harvest(&mut book.metrics, net, base, elapsed, now);

        info!(
            strategy = id,
            rewards = %rewards,
            performance_fee = %performance_fee,
            management_fee = %management_fee,
            net = %net,
            compounded = auto_compound,
            "strategy harvest"
        );
        Ok(record)
    }

    // ── Rebalance ───────────────────────────────────────────────────

    /// Keeper-triggered rebalance. Returns false when the hook reports no
    /// rebalance is needed.
    pub async fn rebalance(&mut self, id: StrategyId, params: &RebalanceParams, now: u64) -> Result<bool> {
        if now > params.deadline {
            return Err(RouterError::DeadlinePassed {
                deadline: params.deadline,
                now,
            });
        }
        let book = self.book(id)?;
        if !book.config.auto_rebalance {
            return Err(RouterError::AutoRebalanceDisabled(id));
        }
        if book.strategy.status != StrategyStatus::Active {
            return Err(unavailable(&book.strategy));
        }
        if params.max_slippage > book.config.slippage_tolerance {
            return Err(RouterError::range(
                "max_slippage",
                params.max_slippage,
                0,
                book.config.slippage_tolerance as u64,
            ));
        }
        if !params.target_weights.is_empty() {
            let venues = book.strategy.venues.len();
            if venues > 0 && params.target_weights.len() != venues {
                return Err(RouterError::LengthMismatch {
                    left: "target_weights",
                    left_len: params.target_weights.len(),
                    right: "venues",
                    right_len: venues,
                });
            }
            let sum: u64 = params.target_weights.iter().map(|&w| w as u64).sum();
            if sum != BPS_SCALE as u64 {
                return Err(RouterError::InvalidInput(format!(
                    "target weights sum to {sum} bps, expected {BPS_SCALE}"
                )));
            }
        }
        let strategy = book.strategy.clone();
        let config = book.config.clone();

        let account = self.account(id);
        let hook = hook_mut(&mut self.hooks, &mut self.fallback, strategy.strategy_type);
        if !hook.needs_rebalance(&strategy, &config, params) {
            debug!(strategy = id, "rebalance not needed");
            return Ok(false);
        }
        let slippage = hook
            .rebalance(&strategy, params)
            .await
            .map_err(|e| RouterError::venue(&account, e))?;
        if slippage > params.max_slippage {
            warn!(strategy = id, slippage_bps = slippage, max_bps = params.max_slippage, "rebalance slippage above limit");
        }
        info!(strategy = id, weights = ?params.target_weights, slippage_bps = slippage, "strategy rebalanced");
        Ok(true)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn book_mut(&mut self, id: StrategyId) -> Result<&mut StrategyBook> {
        self.state.books.get_mut(&id).ok_or(RouterError::UnknownStrategy(id))
    }

    /// Send `amount` to `user` and `fee` to the fee sink from a strategy account.
    /// Nothing moves unless the account covers both legs; a failed payout takes
    /// the fee back.
    async fn pay_out(&self, account: &str, user: &str, amount: Amount, fee: Amount) -> Result<()> {
        let asset = &self.config.asset;
        let needed = amount
            .checked_add(fee)
            .ok_or(RouterError::Overflow { op: "strategy payout" })?;
        let held = self
            .custody
            .balance_of(asset, account)
            .await
            .map_err(RouterError::Custody)?;
        if held < needed {
            return Err(RouterError::InsufficientLiquidity {
                requested: needed,
                available: held,
            });
        }
        if fee > 0 {
            self.custody
                .transfer(asset, account, &self.config.fee_recipient, fee)
                .await
                .map_err(RouterError::Custody)?;
        }
        if let Err(err) = self.custody.transfer(asset, account, user, amount).await {
            if fee > 0 {
                if let Err(undo) = self
                    .custody
                    .transfer(asset, &self.config.fee_recipient, account, fee)
                    .await
                {
                    warn!(account, error = %undo, "fee return after failed payout failed");
                }
            }
            return Err(RouterError::Custody(err));
        }
        Ok(())
    }

    /// Best-effort return of a deposit that could not be completed.
    async fn refund(&self, id: StrategyId, account: &str, user: &str, amount: Amount) {
        if let Err(err) = self.custody.transfer(&self.config.asset, account, user, amount).await {
            warn!(strategy = id, user, error = %err, "refund failed");
        }
    }
}

fn hook_mut<'a>(
    hooks: &'a mut HashMap<StrategyType, Box<dyn ExecutionHook>>,
    fallback: &'a mut Box<dyn ExecutionHook>,
    strategy_type: StrategyType,
) -> &'a mut dyn ExecutionHook {
    match hooks.get_mut(&strategy_type) {
        Some(hook) => hook.as_mut(),
        None => fallback.as_mut(),
    }
}

fn unavailable(strategy: &Strategy) -> RouterError {
    RouterError::StrategyUnavailable {
        strategy_id: strategy.id,
        status: strategy.status.to_string(),
    }
}
