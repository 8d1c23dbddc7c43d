//! Application facade over the three engines.
//!
//! Each engine sits in its own `Serialized` section. The router checks the
//! caller's capability, names the account/target pair the call acts on, and
//! reads the clock; the engines themselves never decide who may call them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::access::{Caller, Role};
use crate::config::RouterConfig;
use crate::engine::{Clock, Serialized};
use crate::error::{Result, RouterError};
use crate::ledger::{AllocationLedger, HarvestReport, LedgerTotals, RebalanceReport, ShutdownReport};
use crate::model::{
    AllocationPolicy, Amount, BacktestEstimate, Bps, HarvestRecord, LedgerPosition, MarketCondition,
    MarketReport, ModelId, OptimizationResult, PerformanceMetrics, RebalanceParams, RiskProfile,
    SourceId, SourceSpec, Strategy, StrategyConfig, StrategyId, StrategySpec, StrategyStatus,
    StrategyType, UserStake, YieldPrediction, YieldSource,
};
use crate::optimizer::OptimizationEngine;
use crate::store::Snapshot;
use crate::strategy::{ExecutionHook, StrategyEngine};
use crate::venues::{TokenCustody, VenueAdapter};

const LEDGER: &str = "ledger";
const OPTIMIZER: &str = "optimizer";

fn key(account: &str, target: &str) -> String {
    format!("{account}@{target}")
}

fn strategy_target(id: StrategyId) -> String {
    format!("strategy:{id}")
}

pub struct YieldRouter {
    ledger: Serialized<AllocationLedger>,
    optimizer: Serialized<OptimizationEngine>,
    strategies: Serialized<StrategyEngine>,
    clock: Arc<dyn Clock>,
}

impl YieldRouter {
    pub fn new(config: RouterConfig, custody: Arc<dyn TokenCustody>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Serialized::new(AllocationLedger::new(config.ledger, custody.clone())),
            optimizer: Serialized::new(OptimizationEngine::new(config.optimizer)),
            strategies: Serialized::new(StrategyEngine::new(config.strategies, custody)),
            clock,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // ── Source registry (admin) ─────────────────────────────────────

    pub async fn add_source(&self, caller: &Caller, spec: SourceSpec, venue: Box<dyn VenueAdapter>) -> Result<()> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.add_source(spec, venue, now)
    }

    pub async fn remove_source(&self, caller: &Caller, id: &str) -> Result<Amount> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.remove_source(id, now).await
    }

    pub async fn set_source_active(&self, caller: &Caller, id: &str, active: bool) -> Result<()> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.set_source_active(id, active, now).await
    }

    pub async fn update_allocation(&self, caller: &Caller, id: &str, target: Bps) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.update_allocation(id, target).await
    }

    pub async fn set_policy(&self, caller: &Caller, policy: AllocationPolicy) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.set_policy(policy)
    }

    pub async fn emergency_exit(&self, caller: &Caller, id: &str) -> Result<Amount> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.emergency_exit(id, now).await
    }

    pub async fn emergency_shutdown(&self, caller: &Caller) -> Result<ShutdownReport> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        Ok(ledger.emergency_shutdown(now).await)
    }

    // ── Ledger keeper and oracle paths ──────────────────────────────

    pub async fn harvest_all(&self, caller: &Caller) -> Result<HarvestReport> {
        caller.require(Role::Keeper)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.harvest_all(now).await
    }

    pub async fn harvest_source(&self, caller: &Caller, id: &str) -> Result<HarvestReport> {
        caller.require(Role::Keeper)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.harvest_source(id, now).await
    }

    pub async fn rebalance(&self, caller: &Caller) -> Result<RebalanceReport> {
        caller.require(Role::Keeper)?;
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.rebalance().await
    }

    /// Forward simulated time to every venue.
    pub async fn tick_venues(&self, caller: &Caller, dt_secs: u64) -> Result<()> {
        caller.require(Role::Keeper)?;
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.tick_venues(now, dt_secs).await
    }

    pub async fn report_apy(&self, caller: &Caller, id: &str, apy: Bps) -> Result<()> {
        caller.require(Role::Oracle)?;
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.report_apy(id, apy)
    }

    // ── Ledger positions (any caller, for themselves) ───────────────

    pub async fn deposit(&self, caller: &Caller, amount: Amount) -> Result<Amount> {
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.deposit(&caller.id, amount, now).await
    }

    pub async fn withdraw(&self, caller: &Caller, shares: Amount) -> Result<Amount> {
        let now = self.now();
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.withdraw(&caller.id, shares, now).await
    }

    // ── Ledger queries ──────────────────────────────────────────────

    pub async fn sources(&self) -> Vec<YieldSource> {
        self.ledger.read().await.sources().to_vec()
    }

    pub async fn source(&self, id: &str) -> Result<YieldSource> {
        self.ledger.read().await.source(id).cloned()
    }

    pub async fn position(&self, user: &str) -> Option<LedgerPosition> {
        self.ledger.read().await.position(user).cloned()
    }

    pub async fn totals(&self) -> LedgerTotals {
        self.ledger.read().await.totals()
    }

    pub async fn share_price(&self) -> f64 {
        self.ledger.read().await.share_price()
    }

    pub async fn harvest_history(&self) -> Vec<HarvestRecord> {
        self.ledger.read().await.harvest_history()
    }

    pub async fn policy(&self) -> AllocationPolicy {
        self.ledger.read().await.policy().clone()
    }

    pub async fn is_conserved(&self) -> bool {
        self.ledger.read().await.is_conserved()
    }

    // ── Optimizer administration ────────────────────────────────────

    pub async fn register_model(
        &self,
        caller: &Caller,
        name: &str,
        version: &str,
        keys: Vec<String>,
        values: Vec<i64>,
    ) -> Result<ModelId> {
        caller.require(Role::Admin)?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.register_model(name, version, keys, values)
    }

    pub async fn enable_model(&self, caller: &Caller, id: ModelId) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.enable_model(id)
    }

    pub async fn set_active_model(&self, caller: &Caller, id: ModelId) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.set_active_model(id)
    }

    pub async fn deactivate_model(&self, caller: &Caller, id: ModelId) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.deactivate_model(id)
    }

    pub async fn update_model_accuracy(&self, caller: &Caller, id: ModelId, accuracy: Bps) -> Result<()> {
        caller.require(Role::Oracle)?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.update_model_accuracy(id, accuracy)
    }

    pub async fn record_market_condition(&self, caller: &Caller, report: &MarketReport) -> Result<()> {
        caller.require(Role::Oracle)?;
        let now = self.now();
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.record_market_condition(report, now)
    }

    // ── Optimizer (any caller) ──────────────────────────────────────

    pub async fn set_risk_profile(&self, caller: &Caller, user: &str, profile: RiskProfile) -> Result<()> {
        caller.require_self_or_admin(user)?;
        let mut optimizer = self.optimizer.enter(key(user, OPTIMIZER)).await?;
        optimizer.set_risk_profile(user, profile)
    }

    pub async fn optimize(&self, caller: &Caller, amount: Amount) -> Result<OptimizationResult> {
        let now = self.now();
        let sources = self.sources().await;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.optimize(&caller.id, amount, &sources, now)
    }

    pub async fn predict_yield(&self, caller: &Caller, source: &str, timeframe_days: u32) -> Result<YieldPrediction> {
        let now = self.now();
        let source = self.source(source).await?;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        optimizer.predict_yield(&source, timeframe_days, now)
    }

    pub async fn backtest(
        &self,
        sources: &[SourceId],
        allocations: &[Bps],
        start: u64,
        end: u64,
    ) -> Result<BacktestEstimate> {
        let now = self.now();
        let registry = self.sources().await;
        self.optimizer
            .read()
            .await
            .backtest(&registry, sources, allocations, start, end, now)
    }

    pub async fn risk_profile(&self, user: &str) -> RiskProfile {
        self.optimizer.read().await.risk_profile(user)
    }

    pub async fn last_result(&self, user: &str) -> Option<OptimizationResult> {
        self.optimizer.read().await.last_result(user).cloned()
    }

    pub async fn predictions(&self, source: &str) -> Vec<YieldPrediction> {
        self.optimizer.read().await.predictions(source)
    }

    pub async fn latest_market(&self) -> Option<MarketCondition> {
        self.optimizer.read().await.latest_market().cloned()
    }

    /// Optimize for the admin, then write the recommended weights into the
    /// ledger's target allocations. Active sources outside the recommendation
    /// are set to zero. Every new target is checked against its source bounds
    /// before any is applied; decreases run before increases so the aggregate
    /// never passes 100% along the way. The cooldown starts and the result is
    /// cached only once the ledger accepted every change.
    pub async fn optimize_and_apply(&self, caller: &Caller, amount: Amount) -> Result<OptimizationResult> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let sources = self.sources().await;
        let mut optimizer = self.optimizer.enter(key(&caller.id, OPTIMIZER)).await?;
        let result = optimizer.recommend(&caller.id, amount, &sources, now)?;

        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        let recommended: BTreeMap<&str, Bps> = result
            .sources
            .iter()
            .map(String::as_str)
            .zip(result.allocations.iter().copied())
            .collect();
        let max_single = ledger.policy().max_single_source;
        let mut changes = Vec::new();
        for source in ledger.sources().iter().filter(|s| s.is_active()) {
            let target = recommended.get(source.id.as_str()).copied().unwrap_or(0);
            if target < source.min_allocation || target > source.max_allocation.min(max_single) {
                return Err(RouterError::AllocationOutOfBounds {
                    source_id: source.id.clone(),
                    allocation: target,
                    min: source.min_allocation,
                    max: source.max_allocation.min(max_single),
                });
            }
            if target != source.target_allocation {
                changes.push((source.id.clone(), source.target_allocation, target));
            }
        }
        changes.sort_by_key(|(_, from, to)| *to > *from);
        for (id, _, target) in &changes {
            ledger.update_allocation(id, *target).await?;
        }
        optimizer.commit_result(&caller.id, result.clone());
        info!(caller = %caller.id, changed = changes.len(), "optimization applied to ledger");
        Ok(result)
    }

    // ── Strategies (admin) ──────────────────────────────────────────

    pub async fn create_strategy(&self, caller: &Caller, spec: StrategySpec) -> Result<StrategyId> {
        caller.require(Role::Admin)?;
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, "strategies")).await?;
        engine.create_strategy(spec, now)
    }

    pub async fn set_strategy_status(&self, caller: &Caller, id: StrategyId, status: StrategyStatus) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.set_status(id, status)
    }

    pub async fn resolve_emergency(&self, caller: &Caller, id: StrategyId) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.resolve_emergency(id)
    }

    pub async fn update_strategy_config(&self, caller: &Caller, id: StrategyId, config: StrategyConfig) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.update_config(id, config)
    }

    pub async fn set_strategy_hook(
        &self,
        caller: &Caller,
        strategy_type: StrategyType,
        hook: Box<dyn ExecutionHook>,
    ) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut engine = self.strategies.enter(key(&caller.id, "strategies")).await?;
        engine.set_hook(strategy_type, hook);
        Ok(())
    }

    // ── Strategies (keeper) ─────────────────────────────────────────

    pub async fn harvest_strategy(&self, caller: &Caller, id: StrategyId) -> Result<HarvestRecord> {
        caller.require(Role::Keeper)?;
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.harvest(id, now).await
    }

    pub async fn rebalance_strategy(&self, caller: &Caller, id: StrategyId, params: &RebalanceParams) -> Result<bool> {
        caller.require(Role::Keeper)?;
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.rebalance(id, params, now).await
    }

    // ── Strategies (any caller, for themselves) ─────────────────────

    pub async fn strategy_deposit(&self, caller: &Caller, id: StrategyId, amount: Amount) -> Result<Amount> {
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.deposit(&caller.id, id, amount, now).await
    }

    pub async fn strategy_withdraw(&self, caller: &Caller, id: StrategyId, shares: Amount) -> Result<Amount> {
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.withdraw(&caller.id, id, shares, now).await
    }

    pub async fn emergency_withdraw(&self, caller: &Caller, id: StrategyId) -> Result<Amount> {
        let now = self.now();
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.emergency_withdraw(&caller.id, id, now).await
    }

    pub async fn claim_rewards(&self, caller: &Caller, id: StrategyId) -> Result<Amount> {
        let mut engine = self.strategies.enter(key(&caller.id, &strategy_target(id))).await?;
        engine.claim_rewards(&caller.id, id).await
    }

    // ── Strategy queries ────────────────────────────────────────────

    pub async fn strategy(&self, id: StrategyId) -> Result<Strategy> {
        self.strategies.read().await.strategy(id).cloned()
    }

    pub async fn strategy_metrics(&self, id: StrategyId) -> Result<PerformanceMetrics> {
        self.strategies.read().await.metrics(id).cloned()
    }

    pub async fn strategy_stake(&self, id: StrategyId, user: &str) -> Option<UserStake> {
        self.strategies.read().await.stake(id, user).cloned()
    }

    // ── Persistence ─────────────────────────────────────────────────

    pub async fn snapshot(&self) -> Snapshot {
        let ledger = self.ledger.read().await.book().clone();
        let optimizer = self.optimizer.read().await.state().clone();
        let strategies = self.strategies.read().await.state().clone();
        Snapshot {
            saved_at: self.now(),
            ledger,
            optimizer,
            strategies,
        }
    }

    /// Replace all engine state. Venue adapters for sources holding capital
    /// must be re-attached with `attach_venue`.
    pub async fn restore(&self, caller: &Caller, snapshot: Snapshot) -> Result<()> {
        caller.require(Role::Admin)?;
        self.ledger.enter(key(&caller.id, LEDGER)).await?.restore(snapshot.ledger);
        self.optimizer
            .enter(key(&caller.id, OPTIMIZER))
            .await?
            .restore(snapshot.optimizer);
        self.strategies
            .enter(key(&caller.id, "strategies"))
            .await?
            .restore(snapshot.strategies);
        info!(saved_at = snapshot.saved_at, "state restored");
        Ok(())
    }

    pub async fn attach_venue(&self, caller: &Caller, id: &str, venue: Box<dyn VenueAdapter>) -> Result<()> {
        caller.require(Role::Admin)?;
        let mut ledger = self.ledger.enter(key(&caller.id, LEDGER)).await?;
        ledger.attach_venue(id, venue)
    }
}
