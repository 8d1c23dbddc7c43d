use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use yield_router::RouterError;
use yield_router::config::StrategyEngineConfig;
use yield_router::model::amount::SECS_PER_YEAR;
use yield_router::model::{
    Amount, Bps, RebalanceParams, Strategy, StrategyConfig, StrategyId, StrategySpec, StrategyStatus,
    StrategyType,
};
use yield_router::strategy::{ExecutionHook, StrategyEngine};
use yield_router::venues::{InMemoryCustody, TokenCustody};
use yield_router::ErrorClass;

const ASSET: &str = "USDC";
const T0: u64 = 1_000_000;

// ── Helpers ─────────────────────────────────────────────────────────

fn spec(name: &str) -> StrategySpec {
    StrategySpec {
        name: name.into(),
        description: String::new(),
        strategy_type: StrategyType::SingleAsset,
        input_tokens: vec![ASSET.into()],
        output_tokens: vec![ASSET.into()],
        venues: vec!["a".into(), "b".into()],
        min_deposit: 100,
        max_deposit: 1_000_000,
        harvest_interval: 86_400,
        performance_fee: 1_000,
        management_fee: 0,
        risk_level: 3,
        expected_apy: 1_000,
    }
}

fn setup() -> (StrategyEngine, Arc<InMemoryCustody>) {
    setup_with(StrategyEngineConfig::default())
}

fn setup_with(config: StrategyEngineConfig) -> (StrategyEngine, Arc<InMemoryCustody>) {
    let custody = Arc::new(InMemoryCustody::new());
    custody.mint("rewards", ASSET, 1_000_000);
    (StrategyEngine::new(config, custody.clone()), custody)
}

fn active(engine: &mut StrategyEngine, name: &str) -> StrategyId {
    let id = engine.create_strategy(spec(name), T0).unwrap();
    engine.activate(id).unwrap();
    id
}

async fn fund_and_deposit(
    engine: &mut StrategyEngine,
    custody: &InMemoryCustody,
    user: &str,
    id: StrategyId,
    amount: Amount,
) -> Amount {
    custody.mint(user, ASSET, amount);
    engine.deposit(user, id, amount, T0).await.unwrap()
}

fn params(deadline: u64, weights: Vec<Bps>) -> RebalanceParams {
    RebalanceParams {
        deadline,
        target_weights: weights,
        max_slippage: 50,
    }
}

/// Hook whose venue refuses new capital.
struct BrokenHook;

#[async_trait]
impl ExecutionHook for BrokenHook {
    async fn deploy(&mut self, _strategy: &Strategy, _amount: Amount) -> Result<()> {
        bail!("venue rejected deposit")
    }

    async fn withdraw(&mut self, _strategy: &Strategy, amount: Amount) -> Result<Amount> {
        Ok(amount)
    }

    fn needs_rebalance(&self, _: &Strategy, _: &StrategyConfig, _: &RebalanceParams) -> bool {
        false
    }

    async fn rebalance(&mut self, _strategy: &Strategy, _params: &RebalanceParams) -> Result<Bps> {
        Ok(0)
    }
}

/// Custody that refuses every transfer into one account.
struct BlockedSink {
    inner: Arc<InMemoryCustody>,
    blocked: &'static str,
}

#[async_trait]
impl TokenCustody for BlockedSink {
    async fn transfer(&self, token: &str, from: &str, to: &str, amount: Amount) -> Result<()> {
        if to == self.blocked {
            bail!("{to} is not accepting transfers");
        }
        self.inner.transfer(token, from, to, amount).await
    }

    async fn balance_of(&self, token: &str, account: &str) -> Result<Amount> {
        self.inner.balance_of(token, account).await
    }
}

fn setup_blocked(blocked: &'static str) -> (StrategyEngine, Arc<InMemoryCustody>) {
    let inner = Arc::new(InMemoryCustody::new());
    inner.mint("rewards", ASSET, 1_000_000);
    let custody = Arc::new(BlockedSink {
        inner: inner.clone(),
        blocked,
    });
    (StrategyEngine::new(StrategyEngineConfig::default(), custody), inner)
}

/// Hook that moves capital off to a venue on deploy but never brings any back,
/// while reporting full withdrawals.
struct OverReportingHook {
    custody: Arc<InMemoryCustody>,
}

#[async_trait]
impl ExecutionHook for OverReportingHook {
    async fn deploy(&mut self, strategy: &Strategy, amount: Amount) -> Result<()> {
        let account = format!("strategy:{}", strategy.id);
        self.custody.transfer(ASSET, &account, "venue", amount).await
    }

    async fn withdraw(&mut self, _strategy: &Strategy, amount: Amount) -> Result<Amount> {
        Ok(amount)
    }

    fn needs_rebalance(&self, _: &Strategy, _: &StrategyConfig, _: &RebalanceParams) -> bool {
        false
    }

    async fn rebalance(&mut self, _strategy: &Strategy, _params: &RebalanceParams) -> Result<Bps> {
        Ok(0)
    }
}

fn with_fees(engine: &mut StrategyEngine, id: StrategyId, deposit_fee: Bps, withdrawal_fee: Bps) {
    engine
        .update_config(
            id,
            StrategyConfig {
                deposit_fee,
                withdrawal_fee,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
}

// ── Creation ────────────────────────────────────────────────────────

#[test]
fn test_create_strategy_validation() {
    let (mut engine, _) = setup();

    let mut s = spec(" ");
    assert!(matches!(engine.create_strategy(s, T0), Err(RouterError::InvalidInput(_))));

    s = spec("no tokens");
    s.input_tokens.clear();
    assert!(matches!(engine.create_strategy(s, T0), Err(RouterError::InvalidInput(_))));

    s = spec("greedy");
    s.performance_fee = 2_001;
    assert!(matches!(
        engine.create_strategy(s, T0),
        Err(RouterError::OutOfRange { field: "performance_fee", .. })
    ));

    s = spec("greedy mgmt");
    s.management_fee = 501;
    assert!(matches!(
        engine.create_strategy(s, T0),
        Err(RouterError::OutOfRange { field: "management_fee", .. })
    ));

    s = spec("riskless");
    s.risk_level = 0;
    assert!(matches!(
        engine.create_strategy(s, T0),
        Err(RouterError::OutOfRange { field: "risk_level", .. })
    ));

    s = spec("inverted");
    s.min_deposit = 2_000_000;
    assert!(matches!(engine.create_strategy(s, T0), Err(RouterError::InvalidInput(_))));

    s = spec("never");
    s.harvest_interval = 0;
    assert!(engine.create_strategy(s, T0).is_err());

    let id = engine.create_strategy(spec("ok"), T0).unwrap();
    assert_eq!(id, 1);
    let strategy = engine.strategy(id).unwrap();
    assert_eq!(strategy.status, StrategyStatus::Inactive);
    assert_eq!(strategy.last_harvest, T0);
    assert_eq!(engine.strategy_config(id).unwrap(), &StrategyConfig::default());
    assert_eq!(engine.account(id), "strategy:1");
    assert_eq!(engine.create_strategy(spec("next"), T0).unwrap(), 2);
}

#[test]
fn test_update_config_bounds() {
    let (mut engine, _) = setup();
    let id = engine.create_strategy(spec("s"), T0).unwrap();

    let config = StrategyConfig {
        deposit_fee: 501,
        ..StrategyConfig::default()
    };
    assert!(matches!(
        engine.update_config(id, config),
        Err(RouterError::OutOfRange { field: "deposit_fee", .. })
    ));
    let config = StrategyConfig {
        slippage_tolerance: 10_001,
        ..StrategyConfig::default()
    };
    assert!(engine.update_config(id, config).is_err());
    assert!(matches!(
        engine.update_config(42, StrategyConfig::default()),
        Err(RouterError::UnknownStrategy(42))
    ));

    let config = StrategyConfig {
        withdrawal_fee: 50,
        auto_compound: false,
        ..StrategyConfig::default()
    };
    engine.update_config(id, config.clone()).unwrap();
    assert_eq!(engine.strategy_config(id).unwrap(), &config);
}

// ── Status machine ──────────────────────────────────────────────────

#[tokio::test]
async fn test_status_transitions() {
    let (mut engine, custody) = setup();
    let id = engine.create_strategy(spec("s"), T0).unwrap();

    custody.mint("alice", ASSET, 1_000);
    let err = engine.deposit("alice", id, 1_000, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::StrategyUnavailable { .. }));
    assert!(matches!(engine.pause(id), Err(RouterError::InvalidTransition { .. })));

    engine.activate(id).unwrap();
    assert!(matches!(engine.resume(id), Err(RouterError::InvalidTransition { .. })));
    engine.pause(id).unwrap();
    engine.resume(id).unwrap();

    engine.enter_emergency(id).unwrap();
    assert!(matches!(engine.activate(id), Err(RouterError::InvalidTransition { .. })));
    engine.resolve_emergency(id).unwrap();
    assert_eq!(engine.strategy(id).unwrap().status, StrategyStatus::Paused);
    // Only an emergency can be resolved.
    engine.resume(id).unwrap();
    assert!(matches!(
        engine.resolve_emergency(id),
        Err(RouterError::InvalidTransition { .. })
    ));
    assert_eq!(engine.strategy(id).unwrap().status, StrategyStatus::Active);

    engine.deprecate(id).unwrap();
    assert!(engine.resume(id).is_err());
    assert!(engine.enter_emergency(id).is_err());
    assert_eq!(engine.strategy(id).unwrap().status, StrategyStatus::Deprecated);
}

// ── Deposits and withdrawals ────────────────────────────────────────

#[tokio::test]
async fn test_deposit_limits() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    custody.mint("alice", ASSET, 2_000_000);

    let err = engine.deposit("alice", id, 50, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::DepositBelowMinimum { amount: 50, min: 100 }));
    let err = engine.deposit("alice", id, 0, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::ZeroAmount));

    engine.deposit("alice", id, 999_950, T0).await.unwrap();
    let err = engine.deposit("alice", id, 100, T0).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::DepositAboveMaximum {
            total: 1_000_050,
            max: 1_000_000
        }
    ));
    assert_eq!(custody.get("alice", ASSET), 1_000_050);
}

#[tokio::test]
async fn test_deposit_fee_goes_to_treasury() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    engine
        .update_config(
            id,
            StrategyConfig {
                deposit_fee: 100,
                ..StrategyConfig::default()
            },
        )
        .unwrap();

    let shares = fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;
    assert_eq!(shares, 9_900);
    assert_eq!(custody.get("treasury", ASSET), 100);
    assert_eq!(custody.get("strategy:1", ASSET), 9_900);

    let strategy = engine.strategy(id).unwrap();
    assert_eq!(strategy.total_deposited, 9_900);
    assert_eq!(strategy.total_shares, 9_900);
    assert_eq!(strategy.accrued_fees, 100);
    let stake = engine.stake(id, "alice").unwrap();
    assert_eq!(stake.deposited, 9_900);
    assert_eq!(stake.last_deposit, T0);
}

#[tokio::test]
async fn test_strategy_limit_per_user() {
    let (mut engine, custody) = setup_with(StrategyEngineConfig {
        max_strategies_per_user: 1,
        ..StrategyEngineConfig::default()
    });
    let first = active(&mut engine, "first");
    let second = active(&mut engine, "second");

    fund_and_deposit(&mut engine, &custody, "alice", first, 1_000).await;
    custody.mint("alice", ASSET, 2_000);
    let err = engine.deposit("alice", second, 1_000, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::StrategyLimitReached { limit: 1, .. }));
    // Topping up an existing holding is fine.
    engine.deposit("alice", first, 1_000, T0).await.unwrap();
}

#[tokio::test]
async fn test_failed_deploy_refunds_depositor() {
    let (mut engine, custody) = setup();
    engine.set_hook(StrategyType::Leveraged, Box::new(BrokenHook));
    let mut s = spec("levered");
    s.strategy_type = StrategyType::Leveraged;
    let id = engine.create_strategy(s, T0).unwrap();
    engine.activate(id).unwrap();

    custody.mint("alice", ASSET, 5_000);
    let err = engine.deposit("alice", id, 5_000, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::Venue { .. }));
    assert_eq!(custody.get("alice", ASSET), 5_000);
    assert_eq!(engine.strategy(id).unwrap().total_shares, 0);
}

#[tokio::test]
async fn test_unfunded_deposit_moves_nothing() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    with_fees(&mut engine, id, 500, 0);
    custody.mint("alice", ASSET, 960);

    let err = engine.deposit("alice", id, 1_000, T0).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::External);
    assert_eq!(custody.get("alice", ASSET), 960);
    assert_eq!(custody.get("strategy:1", ASSET), 0);
    assert_eq!(custody.get("treasury", ASSET), 0);
    assert!(engine.stake(id, "alice").is_none());
    assert_eq!(engine.strategy(id).unwrap().total_deposited, 0);
}

#[tokio::test]
async fn test_failed_deposit_fee_refunds_depositor() {
    let (mut engine, custody) = setup_blocked("treasury");
    let id = active(&mut engine, "s");
    with_fees(&mut engine, id, 100, 0);
    custody.mint("alice", ASSET, 10_000);

    let err = engine.deposit("alice", id, 10_000, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::Custody(_)));
    assert_eq!(custody.get("alice", ASSET), 10_000);
    assert_eq!(custody.get("strategy:1", ASSET), 0);
    let strategy = engine.strategy(id).unwrap();
    assert_eq!(strategy.total_shares, 0);
    assert_eq!(strategy.accrued_fees, 0);
}

#[tokio::test]
async fn test_failed_withdraw_fee_pays_nothing() {
    let (mut engine, custody) = setup_blocked("treasury");
    let id = active(&mut engine, "s");
    with_fees(&mut engine, id, 0, 100);
    fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;

    let err = engine.withdraw("alice", id, 4_000, T0 + 1).await.unwrap_err();
    assert!(matches!(err, RouterError::Custody(_)));
    assert_eq!(custody.get("alice", ASSET), 0);
    assert_eq!(custody.get("strategy:1", ASSET), 10_000);
    assert_eq!(engine.stake(id, "alice").unwrap().shares, 10_000);
    assert_eq!(engine.strategy(id).unwrap().total_deposited, 10_000);
}

#[tokio::test]
async fn test_payout_the_account_cannot_cover_is_refused() {
    let (mut engine, custody) = setup();
    engine.set_hook(
        StrategyType::Leveraged,
        Box::new(OverReportingHook {
            custody: custody.clone(),
        }),
    );
    let mut s = spec("levered");
    s.strategy_type = StrategyType::Leveraged;
    let id = engine.create_strategy(s, T0).unwrap();
    engine.activate(id).unwrap();
    with_fees(&mut engine, id, 0, 100);
    fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;
    assert_eq!(custody.get("venue", ASSET), 10_000);

    let err = engine.withdraw("alice", id, 4_000, T0 + 1).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::InsufficientLiquidity {
            requested: 4_000,
            available: 0
        }
    ));
    let err = engine.emergency_withdraw("alice", id, T0 + 1).await.unwrap_err();
    assert!(matches!(err, RouterError::InsufficientLiquidity { .. }));

    assert_eq!(custody.get("alice", ASSET), 0);
    assert_eq!(custody.get("treasury", ASSET), 0);
    assert_eq!(engine.stake(id, "alice").unwrap().shares, 10_000);
    assert_eq!(engine.strategy(id).unwrap().total_deposited, 10_000);
}

#[tokio::test]
async fn test_withdraw_fee_and_partial_basis() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    engine
        .update_config(
            id,
            StrategyConfig {
                withdrawal_fee: 100,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;

    let err = engine.withdraw("alice", id, 10_001, T0).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::InsufficientShares {
            requested: 10_001,
            available: 10_000
        }
    ));

    let paid = engine.withdraw("alice", id, 4_000, T0 + 1).await.unwrap();
    assert_eq!(paid, 3_960);
    assert_eq!(custody.get("alice", ASSET), 3_960);
    assert_eq!(custody.get("treasury", ASSET), 40);
    let stake = engine.stake(id, "alice").unwrap();
    assert_eq!(stake.shares, 6_000);
    assert_eq!(stake.deposited, 6_000);
    assert_eq!(engine.strategy(id).unwrap().total_deposited, 6_000);

    // Withdrawals stay open while paused.
    engine.pause(id).unwrap();
    engine.withdraw("alice", id, 6_000, T0 + 2).await.unwrap();
    assert_eq!(engine.strategy(id).unwrap().total_shares, 0);
}

// ── Harvest ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_harvest_compounds_net_rewards() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    fund_and_deposit(&mut engine, &custody, "alice", id, 100_000).await;

    let err = engine.harvest(id, T0 + 3_600).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::HarvestNotReady {
            ready_at: 1_086_400,
            ..
        }
    ));

    let now = T0 + SECS_PER_YEAR;
    let record = engine.harvest(id, now).await.unwrap();
    assert_eq!(record.harvested, 10_000);
    assert_eq!(record.profit, 9_000);
    assert!(record.success);
    assert_eq!(custody.get("treasury", ASSET), 1_000);
    assert_eq!(custody.get("rewards", ASSET), 990_000);

    let strategy = engine.strategy(id).unwrap();
    assert_eq!(strategy.total_deposited, 109_000);
    assert_eq!(strategy.total_shares, 100_000);
    assert_eq!(strategy.actual_apy, 900);
    assert_eq!(strategy.last_harvest, now);
    assert_eq!(engine.harvest_history(id).unwrap().len(), 1);

    // Compounded value flows to the holder.
    let paid = engine.withdraw("alice", id, 100_000, now).await.unwrap();
    assert_eq!(paid, 109_000);
}

#[tokio::test]
async fn test_harvest_management_fee_and_minimum_profit() {
    let (mut engine, custody) = setup();
    let mut s = spec("managed");
    s.management_fee = 200;
    let id = engine.create_strategy(s, T0).unwrap();
    engine.activate(id).unwrap();
    fund_and_deposit(&mut engine, &custody, "alice", id, 100_000).await;

    engine
        .update_config(
            id,
            StrategyConfig {
                min_profit_to_harvest: 1_000_000,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    let err = engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap_err();
    assert!(matches!(err, RouterError::BelowMinimumProfit { profit: 7_000, .. }));

    engine.update_config(id, StrategyConfig::default()).unwrap();
    let record = engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap();
    // 10% perf on 10_000 plus 2% of 100_000 management.
    assert_eq!(record.profit, 7_000);
    assert_eq!(custody.get("treasury", ASSET), 3_000);
}

#[tokio::test]
async fn test_harvest_requires_active_status() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;
    engine.enter_emergency(id).unwrap();

    let err = engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap_err();
    assert!(matches!(err, RouterError::StrategyUnavailable { .. }));
}

#[tokio::test]
async fn test_rewards_credited_without_compounding() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    engine
        .update_config(
            id,
            StrategyConfig {
                auto_compound: false,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    fund_and_deposit(&mut engine, &custody, "alice", id, 30_000).await;
    fund_and_deposit(&mut engine, &custody, "bob", id, 10_000).await;

    let record = engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap();
    assert_eq!(record.profit, 3_600);
    assert_eq!(engine.strategy(id).unwrap().total_deposited, 40_000);
    assert_eq!(engine.stake(id, "alice").unwrap().rewards, 2_700);
    assert_eq!(engine.stake(id, "bob").unwrap().rewards, 900);

    let claimed = engine.claim_rewards("alice", id).await.unwrap();
    assert_eq!(claimed, 2_700);
    assert_eq!(custody.get("alice", ASSET), 2_700);
    assert!(matches!(
        engine.claim_rewards("alice", id).await,
        Err(RouterError::ZeroAmount)
    ));
}

// ── Emergency withdraw ──────────────────────────────────────────────

#[tokio::test]
async fn test_emergency_withdraw_skips_fees_and_pays_rewards() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    engine
        .update_config(
            id,
            StrategyConfig {
                auto_compound: false,
                withdrawal_fee: 100,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    fund_and_deposit(&mut engine, &custody, "alice", id, 10_000).await;
    engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap();
    engine.enter_emergency(id).unwrap();

    let paid = engine.emergency_withdraw("alice", id, T0 + SECS_PER_YEAR).await.unwrap();
    assert_eq!(paid, 10_900);
    assert_eq!(custody.get("alice", ASSET), 10_900);
    assert_eq!(custody.get("treasury", ASSET), 100);
    assert_eq!(engine.stake(id, "alice").unwrap().shares, 0);
    assert_eq!(engine.strategy(id).unwrap().total_shares, 0);

    let err = engine.emergency_withdraw("alice", id, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::InsufficientShares { .. }));
}

#[tokio::test]
async fn test_emergency_withdraw_can_be_disabled() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    fund_and_deposit(&mut engine, &custody, "alice", id, 1_000).await;
    engine
        .update_config(
            id,
            StrategyConfig {
                emergency_withdraw_enabled: false,
                ..StrategyConfig::default()
            },
        )
        .unwrap();

    let err = engine.emergency_withdraw("alice", id, T0).await.unwrap_err();
    assert!(matches!(err, RouterError::EmergencyWithdrawDisabled(1)));
    assert_eq!(engine.stake(id, "alice").unwrap().shares, 1_000);
}

// ── Rebalance ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_rebalance_validation_and_threshold() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    fund_and_deposit(&mut engine, &custody, "alice", id, 1_000).await;
    let now = T0 + 10;

    let err = engine.rebalance(id, &params(now - 1, vec![]), now).await.unwrap_err();
    assert!(matches!(err, RouterError::DeadlinePassed { .. }));

    let mut loose = params(now, vec![8_000, 2_000]);
    loose.max_slippage = 101;
    assert!(matches!(
        engine.rebalance(id, &loose, now).await,
        Err(RouterError::OutOfRange { field: "max_slippage", .. })
    ));
    assert!(matches!(
        engine.rebalance(id, &params(now, vec![10_000]), now).await,
        Err(RouterError::LengthMismatch { .. })
    ));
    assert!(matches!(
        engine.rebalance(id, &params(now, vec![6_000, 3_000]), now).await,
        Err(RouterError::InvalidInput(_))
    ));

    // Deploy seeded an even split, so 50/50 is a no-op.
    assert!(!engine.rebalance(id, &params(now, vec![5_000, 5_000]), now).await.unwrap());
    assert!(!engine.rebalance(id, &params(now, vec![5_400, 4_600]), now).await.unwrap());
    assert!(engine.rebalance(id, &params(now, vec![8_000, 2_000]), now).await.unwrap());
    assert!(!engine.rebalance(id, &params(now, vec![8_000, 2_000]), now).await.unwrap());
}

#[tokio::test]
async fn test_rebalance_disabled_or_inactive() {
    let (mut engine, _) = setup();
    let id = active(&mut engine, "s");
    engine.pause(id).unwrap();
    let err = engine.rebalance(id, &params(T0, vec![]), T0).await.unwrap_err();
    assert!(matches!(err, RouterError::StrategyUnavailable { .. }));

    engine
        .update_config(
            id,
            StrategyConfig {
                auto_rebalance: false,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    let err = engine.rebalance(id, &params(T0, vec![]), T0).await.unwrap_err();
    assert!(matches!(err, RouterError::AutoRebalanceDisabled(1)));
}

// ── Metrics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_performance_metrics_accumulate() {
    let (mut engine, custody) = setup();
    let id = active(&mut engine, "s");
    fund_and_deposit(&mut engine, &custody, "alice", id, 100_000).await;

    engine.harvest(id, T0 + SECS_PER_YEAR).await.unwrap();
    engine.harvest(id, T0 + 2 * SECS_PER_YEAR).await.unwrap();

    let metrics = engine.metrics(id).unwrap();
    assert_eq!(metrics.total_trades, 2);
    assert_eq!(metrics.profitable_trades, 2);
    assert_eq!(metrics.win_rate, 10_000);
    // 9000 / 100_000 then 9810 / 109_000, both in bps.
    assert_eq!(metrics.total_return, 900 + 900);
    assert_eq!(metrics.annualized_return, 900);
    assert_eq!(metrics.max_drawdown, 0);
    assert_eq!(metrics.last_update, T0 + 2 * SECS_PER_YEAR);
}
