//! End-to-end walkthroughs of the router, plus the accounting properties
//! that must hold across any sequence of operations.


use std::path::PathBuf;
use std::sync::Arc;

use venue_common::*;
use yield_router::access::{Caller, Role};
use yield_router::config::{OptimizerConfig, StrategyEngineConfig};
use yield_router::engine::ManualClock;
use yield_router::ledger::rebalance::Direction;
use yield_router::model::{MarketReport, StrategyConfig, StrategySpec, StrategyType, YieldSource};
use yield_router::optimizer::OptimizationEngine;
use yield_router::simulate::{self, SimulateConfig};
use yield_router::store::Snapshot;
use yield_router::strategy::StrategyEngine;
use yield_router::venues::InMemoryCustody;
use yield_router::{RouterError, YieldRouter, example};

const START: u64 = 1_700_000_000;

fn operator() -> Caller {
    Caller::with_roles("operator", [Role::Admin, Role::Keeper, Role::Oracle])
}

async fn two_source_router() -> (YieldRouter, Arc<InMemoryCustody>, MockHandle, MockHandle) {
    let custody = Arc::new(InMemoryCustody::new());
    let clock = Arc::new(ManualClock::new(START));
    let router = YieldRouter::new(router_config(), custody.clone(), clock);
    let (venue_a, a) = MockVenue::new("a", custody.clone());
    let (venue_b, b) = MockVenue::new("b", custody.clone());
    router
        .add_source(&operator(), spec("a", 6_000, 500, 3), Box::new(venue_a))
        .await
        .unwrap();
    router
        .add_source(&operator(), spec("b", 4_000, 300, 6), Box::new(venue_b))
        .await
        .unwrap();
    (router, custody, a, b)
}

fn bounded_strategy(min: u128, max: u128) -> StrategySpec {
    StrategySpec {
        name: "bounded".into(),
        description: String::new(),
        strategy_type: StrategyType::SingleAsset,
        input_tokens: vec![ASSET.into()],
        output_tokens: vec![],
        venues: vec![],
        min_deposit: min,
        max_deposit: max,
        harvest_interval: 86_400,
        performance_fee: 1_000,
        management_fee: 0,
        risk_level: 2,
        expected_apy: 500,
    }
}

// ── Walkthroughs ────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_deposit_routes_by_target() {
    let (router, custody, a, b) = two_source_router().await;
    custody.mint("alice", ASSET, 1_000);

    let shares = router.deposit(&Caller::user("alice"), 1_000).await.unwrap();
    assert_eq!(shares, 1_000);
    assert_eq!(a.principal(), 600);
    assert_eq!(b.principal(), 400);

    let position = router.position("alice").await.unwrap();
    assert_eq!(position.allocations.get("a"), Some(&600));
    assert_eq!(position.allocations.get("b"), Some(&400));
    assert_eq!(router.totals().await.idle, 0);
}

#[tokio::test]
async fn test_drift_is_corrected_by_rebalance() {
    let (router, custody, a, b) = two_source_router().await;
    custody.mint("alice", ASSET, 1_000);
    router.deposit(&Caller::user("alice"), 1_000).await.unwrap();

    a.drift_to(750);
    b.drift_to(250);
    let report = router.rebalance(&operator()).await.unwrap();

    assert_eq!(report.moved(Direction::Withdraw), 150);
    assert_eq!(report.moved(Direction::Deposit), 150);
    assert_eq!(report.moves[0].source, "a");
    assert_eq!(report.moves[1].source, "b");
    assert_eq!(a.principal(), 600);
    assert_eq!(b.principal(), 400);
    assert_eq!(router.totals().await.total_assets, 1_000);

    // Within threshold now.
    assert!(router.rebalance(&operator()).await.unwrap().is_empty());
}

#[test]
fn test_volatile_long_horizon_lowers_confidence() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    let source = YieldSource::from_spec(spec("a", 0, 800, 4), 0, 0);
    let report = |volatility| MarketReport {
        volatility_index: volatility,
        liquidity_index: 50,
        risk_sentiment: 50,
        yield_curve_slope: 0,
        correlation_index: 50,
        bullish: false,
        bearish: false,
        market_phase: 1,
    };

    engine.record_market_condition(&report(80), 1).unwrap();
    let stormy = engine.predict_yield(&source, 60, 1).unwrap();
    engine.record_market_condition(&report(20), 2).unwrap();
    let calm = engine.predict_yield(&source, 1, 2).unwrap();

    assert!(stormy.confidence < calm.confidence);
    assert_eq!(stormy.confidence, 2_800);
    assert_eq!(calm.confidence, 5_000);
}

#[tokio::test]
async fn test_strategy_deposit_bounds() {
    let custody = Arc::new(InMemoryCustody::new());
    let mut engine = StrategyEngine::new(StrategyEngineConfig::default(), custody.clone());
    let id = engine.create_strategy(bounded_strategy(100, 1_000), START).unwrap();
    engine.activate(id).unwrap();
    custody.mint("alice", ASSET, 2_000);

    assert!(matches!(
        engine.deposit("alice", id, 50, START).await,
        Err(RouterError::DepositBelowMinimum { .. })
    ));
    assert_eq!(engine.deposit("alice", id, 1_000, START).await.unwrap(), 1_000);
    assert!(matches!(
        engine.deposit("alice", id, 1, START).await,
        Err(RouterError::DepositAboveMaximum { total: 1_001, max: 1_000 })
    ));
}

#[tokio::test]
async fn test_disabled_emergency_withdraw_blocks_holders() {
    let custody = Arc::new(InMemoryCustody::new());
    let mut engine = StrategyEngine::new(StrategyEngineConfig::default(), custody.clone());
    let id = engine.create_strategy(bounded_strategy(1, 10_000), START).unwrap();
    engine.activate(id).unwrap();
    engine
        .update_config(
            id,
            StrategyConfig {
                emergency_withdraw_enabled: false,
                ..StrategyConfig::default()
            },
        )
        .unwrap();
    custody.mint("alice", ASSET, 500);
    engine.deposit("alice", id, 500, START).await.unwrap();
    engine.enter_emergency(id).unwrap();

    let err = engine.emergency_withdraw("alice", id, START).await.unwrap_err();
    assert!(matches!(err, RouterError::EmergencyWithdrawDisabled(_)));
    // The regular path still works in emergency.
    assert_eq!(engine.withdraw("alice", id, 500, START).await.unwrap(), 500);
}

// ── Accounting properties ───────────────────────────────────────────

#[tokio::test]
async fn test_shares_stay_conserved_across_operations() {
    let (router, custody, a, _b) = two_source_router().await;
    let keeper = operator();
    for (user, amount) in [("alice", 1_000), ("bob", 3_000), ("carol", 250)] {
        custody.mint(user, ASSET, amount);
        router.deposit(&Caller::user(user), amount).await.unwrap();
    }
    a.accrue(420);
    router.harvest_all(&keeper).await.unwrap();
    router.withdraw(&Caller::user("bob"), 1_234).await.unwrap();
    custody.mint("dave", ASSET, 777);
    router.deposit(&Caller::user("dave"), 777).await.unwrap();
    router.withdraw(&Caller::user("alice"), 1_000).await.unwrap();

    let snapshot = router.snapshot().await;
    let held: u128 = snapshot.ledger.positions.values().map(|p| p.shares).sum();
    assert_eq!(held, snapshot.ledger.total_shares);
    assert!(router.is_conserved().await);
    let totals = router.totals().await;
    assert_eq!(totals.total_assets, totals.idle + totals.deployed);
}

#[tokio::test]
async fn test_aggregate_allocation_never_exceeds_full() {
    let (router, custody, _a, _b) = two_source_router().await;
    let admin = operator();
    let (venue, _) = MockVenue::new("c", custody.clone());
    let err = router
        .add_source(&admin, spec("c", 1, 400, 2), Box::new(venue))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::AllocationExceeded { total: 10_001 }));
    assert!(router.update_allocation(&admin, "b", 4_001).await.is_err());

    router.update_allocation(&admin, "b", 3_000).await.unwrap();
    let total: u32 = router
        .sources()
        .await
        .iter()
        .filter(|s| s.is_active())
        .map(|s| s.target_allocation)
        .sum();
    assert!(total <= 10_000);
}

#[tokio::test]
async fn test_withdrawal_is_proportional_to_shares() {
    let (router, custody, a, _b) = two_source_router().await;
    for user in ["alice", "bob"] {
        custody.mint(user, ASSET, 1_000);
        router.deposit(&Caller::user(user), 1_000).await.unwrap();
    }
    a.accrue(100);
    router.harvest_all(&operator()).await.unwrap();
    assert_eq!(router.totals().await.total_assets, 2_090);

    let paid = router.withdraw(&Caller::user("alice"), 500).await.unwrap();
    assert_eq!(paid, 522);
    assert_eq!(router.position("alice").await.unwrap().shares, 500);
    assert!(router.is_conserved().await);
}

// ── Simulation ──────────────────────────────────────────────────────

fn sim_config(days: u64, state_file: Option<PathBuf>) -> SimulateConfig {
    SimulateConfig {
        scenario_path: PathBuf::new(),
        days,
        step_hours: 24,
        seed: 7,
        state_file,
        verbose: false,
    }
}

#[tokio::test]
async fn test_example_scenario_simulates() {
    let scenario = example::example_scenario();
    let result = simulate::execute(&scenario, &sim_config(3, None)).await.unwrap();

    assert_eq!(result.ticks, 4);
    assert_eq!(result.strategy_harvests, 3);
    assert_eq!(result.failed_harvests, 0);
    assert!(result.harvested > 0.0);
    assert!(result.share_price > 0.99);
    assert_eq!(result.label, scenario.name);
}

#[test]
fn test_simulation_from_file_writes_state() {
    let dir = tempfile::tempdir().unwrap();
    let scenario_path = dir.path().join("scenario.json");
    let state_path = dir.path().join("state.json");
    let json = serde_json::to_string_pretty(&example::example_scenario()).unwrap();
    std::fs::write(&scenario_path, json).unwrap();

    let config = SimulateConfig {
        scenario_path,
        ..sim_config(2, Some(state_path.clone()))
    };
    let result = simulate::run_simulation(&config).unwrap();
    assert_eq!(result.ticks, 3);

    let snapshot = Snapshot::load(&state_path).unwrap().unwrap();
    assert_eq!(snapshot.ledger.sources.len(), 3);
    assert_eq!(snapshot.strategies.books.len(), 1);
}

#[test]
fn test_scenario_file_with_strategy_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");
    let scenario = example::example_scenario();
    assert!(!scenario.strategies.is_empty());
    std::fs::write(&path, serde_json::to_string_pretty(&scenario).unwrap()).unwrap();

    let loaded = yield_router::validate::load_and_validate(&path).unwrap();
    assert_eq!(loaded, scenario);
    assert_eq!(
        loaded.strategies[0].spec.max_deposit,
        scenario.strategies[0].spec.max_deposit
    );
    yield_router::validate::run(&path).unwrap();
}

#[test]
fn test_invalid_scenario_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scenario_path = dir.path().join("bad.json");
    let mut scenario = example::example_scenario();
    scenario.sources[0].spec.target_allocation = 9_000;
    std::fs::write(&scenario_path, serde_json::to_string(&scenario).unwrap()).unwrap();

    let config = SimulateConfig {
        scenario_path,
        ..sim_config(1, None)
    };
    let err = simulate::run_simulation(&config).unwrap_err();
    assert!(err.to_string().contains("Scenario validation failed"));
}
