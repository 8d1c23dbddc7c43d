use yield_router::RouterError;
use yield_router::config::{AllocatorKind, OptimizerConfig};
use yield_router::model::amount::SECS_PER_YEAR;
use yield_router::model::{MarketReport, RiskProfile, SourceSpec, SourceStatus, YieldSource};
use yield_router::optimizer::OptimizationEngine;

// ── Helpers ─────────────────────────────────────────────────────────

fn source(id: &str, apy: u32, risk: u8) -> YieldSource {
    YieldSource::from_spec(
        SourceSpec {
            id: id.into(),
            token: "USDC".into(),
            target_allocation: 0,
            min_allocation: 0,
            max_allocation: 10_000,
            apy,
            risk_level: risk,
        },
        0,
        0,
    )
}

fn registry() -> Vec<YieldSource> {
    let mut paused = source("c", 2_000, 2);
    paused.status = SourceStatus::Inactive;
    vec![source("a", 500, 3), source("b", 300, 6), paused]
}

fn market(volatility: u8, phase: u8) -> MarketReport {
    MarketReport {
        volatility_index: volatility,
        liquidity_index: 60,
        risk_sentiment: 50,
        yield_curve_slope: 25,
        correlation_index: 40,
        bullish: false,
        bearish: false,
        market_phase: phase,
    }
}

fn profile(tolerance: u8) -> RiskProfile {
    RiskProfile {
        risk_tolerance: tolerance,
        ..RiskProfile::default()
    }
}

// ── Optimization ────────────────────────────────────────────────────

#[test]
fn test_optimize_filters_by_risk_and_activity() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    let sources = registry();

    // Default tolerance 5 admits only `a`; `c` is inactive.
    let result = engine.optimize("alice", 1_000, &sources, 100).unwrap();
    assert_eq!(result.sources, vec!["a".to_string()]);
    assert_eq!(result.allocations, vec![10_000]);

    engine.set_risk_profile("bob", profile(8)).unwrap();
    let result = engine.optimize("bob", 1_000, &sources, 100).unwrap();
    assert_eq!(result.sources, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(result.allocations, vec![5_000, 5_000]);
    assert_eq!(result.expected_apy, 400);
    assert_eq!(result.risk_score, 4_500);
    assert_eq!(result.time_horizon_days, 90);
    assert_eq!(engine.last_result("bob"), Some(&result));
}

#[test]
fn test_optimize_enforces_cooldown() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    let sources = registry();

    engine.optimize("alice", 1_000, &sources, 1_000).unwrap();
    let err = engine.optimize("alice", 1_000, &sources, 1_500).unwrap_err();
    assert!(matches!(err, RouterError::CooldownActive { ready_at: 4_600, .. }));

    // Other users are unaffected.
    engine.optimize("bob", 1_000, &sources, 1_500).unwrap();
    // Eligible again once the window passes.
    engine.optimize("alice", 1_000, &sources, 4_600).unwrap();
}

#[test]
fn test_optimize_rejects_zero_and_empty_pool() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    let err = engine.optimize("alice", 0, &registry(), 0).unwrap_err();
    assert!(matches!(err, RouterError::ZeroAmount));

    engine.set_risk_profile("carol", profile(1)).unwrap();
    let err = engine.optimize("carol", 1_000, &registry(), 0).unwrap_err();
    assert!(matches!(err, RouterError::NoEligibleSources { tolerance: 1 }));
    // A rejected call does not start the cooldown.
    engine.set_risk_profile("carol", profile(5)).unwrap();
    engine.optimize("carol", 1_000, &registry(), 1).unwrap();
}

#[test]
fn test_risk_adjusted_allocator_prefers_safer_yield() {
    let mut engine = OptimizationEngine::new(OptimizerConfig {
        allocator: AllocatorKind::RiskAdjustedYield,
        ..OptimizerConfig::default()
    });
    engine.set_risk_profile("alice", profile(10)).unwrap();
    let result = engine.optimize("alice", 1_000, &registry(), 0).unwrap();
    assert_eq!(result.allocations.iter().sum::<u32>(), 10_000);
    assert!(result.allocations[0] > result.allocations[1]);
    assert!(result.rationale.contains("risk_adjusted_yield"));
}

#[test]
fn test_confidence_tracks_market_volatility() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    let sources = registry();

    let neutral = engine.optimize("a1", 1_000, &sources, 0).unwrap().confidence;
    assert_eq!(neutral, 5_000);

    engine.record_market_condition(&market(90, 1), 0).unwrap();
    let volatile = engine.optimize("a2", 1_000, &sources, 0).unwrap().confidence;
    assert_eq!(volatile, 4_000);

    engine.record_market_condition(&market(10, 1), 0).unwrap();
    let calm = engine.optimize("a3", 1_000, &sources, 0).unwrap().confidence;
    assert_eq!(calm, 5_500);
}

// ── Risk profiles ───────────────────────────────────────────────────

#[test]
fn test_risk_profile_defaults_and_validation() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());
    assert_eq!(engine.risk_profile("nobody"), RiskProfile::default());

    let err = engine.set_risk_profile("alice", profile(0)).unwrap_err();
    assert!(matches!(err, RouterError::OutOfRange { field: "risk_tolerance", .. }));
    let mut wide = profile(5);
    wide.diversification = 11;
    assert!(engine.set_risk_profile("alice", wide).is_err());

    engine.set_risk_profile("alice", profile(9)).unwrap();
    assert_eq!(engine.risk_profile("alice").risk_tolerance, 9);
}

// ── Models ──────────────────────────────────────────────────────────

#[test]
fn test_model_lifecycle() {
    let mut engine = OptimizationEngine::new(OptimizerConfig::default());

    let err = engine
        .register_model("mv", "1", vec!["lambda".into()], vec![])
        .unwrap_err();
    assert!(matches!(err, RouterError::LengthMismatch { .. }));

    let id = engine
        .register_model("mean-variance", "1.0", vec!["lambda".into()], vec![3])
        .unwrap();
    assert_eq!(engine.model(id).unwrap().accuracy, 5_000);
    assert_eq!(engine.model(id).unwrap().parameters.get("lambda"), Some(&3));

    let err = engine.set_active_model(id).unwrap_err();
    assert!(matches!(err, RouterError::ModelInactive(_)));
    assert!(matches!(engine.set_active_model(99), Err(RouterError::UnknownModel(99))));

    engine.enable_model(id).unwrap();
    engine.set_active_model(id).unwrap();
    engine.update_model_accuracy(id, 9_000).unwrap();
    assert_eq!(engine.active_model().unwrap().accuracy, 9_000);
    assert!(engine.update_model_accuracy(id, 10_001).is_err());

    let result = engine.optimize("alice", 1_000, &registry(), 0).unwrap();
    assert_eq!(result.confidence, 9_000);

    engine.deactivate_model(id).unwrap();
    assert!(engine.active_model().is_none());
}

// ── Market data ─────────────────────────────────────────────────────

#[test]
fn test_market_reports_are_validated_and_bounded() {
    let mut engine = OptimizationEngine::new(OptimizerConfig {
        market_history: 2,
        ..OptimizerConfig::default()
    });

    let err = engine.record_market_condition(&market(50, 5), 1).unwrap_err();
    assert!(matches!(err, RouterError::OutOfRange { field: "market_phase", .. }));
    let err = engine.record_market_condition(&market(101, 1), 1).unwrap_err();
    assert!(matches!(err, RouterError::OutOfRange { field: "volatility_index", .. }));
    assert!(engine.latest_market().is_none());

    for ts in 1..=3 {
        engine.record_market_condition(&market(40, 2), ts).unwrap();
    }
    let history = engine.market_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].timestamp, 2);
    assert_eq!(engine.latest_market().unwrap().timestamp, 3);
}

// ── Prediction ──────────────────────────────────────────────────────

#[test]
fn test_predict_yield_applies_phase_and_stores_history() {
    let mut engine = OptimizationEngine::new(OptimizerConfig {
        prediction_history: 2,
        ..OptimizerConfig::default()
    });
    let a = source("a", 1_000, 3);

    let plain = engine.predict_yield(&a, 7, 1).unwrap();
    assert_eq!(plain.predicted_apy, 1_000);
    assert_eq!(plain.confidence, 5_000);
    assert_eq!(plain.risk_score, 3);

    engine.record_market_condition(&market(50, 4), 2).unwrap();
    let markdown = engine.predict_yield(&a, 7, 2).unwrap();
    assert_eq!(markdown.predicted_apy, 900);
    assert!(markdown.factors.iter().any(|f| f == "markdown phase"));

    engine.predict_yield(&a, 14, 3).unwrap();
    let stored = engine.predictions("a");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].timeframe_days, 14);
    assert!(engine.predictions("b").is_empty());

    let err = engine.predict_yield(&a, 0, 4).unwrap_err();
    assert!(matches!(err, RouterError::OutOfRange { field: "timeframe_days", .. }));
}

// ── Backtest ────────────────────────────────────────────────────────

#[test]
fn test_backtest_weighted_estimate() {
    let engine = OptimizationEngine::new(OptimizerConfig::default());
    let sources = registry();
    let ids = vec!["a".to_string(), "b".to_string()];
    let half_year = SECS_PER_YEAR / 2;

    let estimate = engine
        .backtest(&sources, &ids, &[6_000, 4_000], 0, half_year, half_year)
        .unwrap();
    assert_eq!(estimate.weighted_return, 420);
    assert_eq!(estimate.weighted_risk, 4_200);
    assert_eq!(estimate.max_drawdown, 2_100);
    assert_eq!(estimate.period_return, 210);
    assert!((estimate.sharpe_ratio - 0.1).abs() < 1e-9);
}

#[test]
fn test_backtest_rejects_bad_input() {
    let engine = OptimizationEngine::new(OptimizerConfig::default());
    let sources = registry();
    let ids = vec!["a".to_string(), "b".to_string()];

    assert!(matches!(
        engine.backtest(&sources, &ids, &[10_000], 0, 10, 10),
        Err(RouterError::LengthMismatch { .. })
    ));
    assert!(matches!(
        engine.backtest(&sources, &ids, &[5_000, 5_000], 10, 10, 10),
        Err(RouterError::InvalidWindow { .. })
    ));
    assert!(matches!(
        engine.backtest(&sources, &ids, &[5_000, 5_000], 0, 20, 10),
        Err(RouterError::WindowInFuture { end: 20, now: 10 })
    ));
    assert!(matches!(
        engine.backtest(&sources, &["zz".to_string()], &[10_000], 0, 10, 10),
        Err(RouterError::UnknownSource(_))
    ));
}
