use super::ValidationError;
use crate::config::RouterConfig;
use crate::model::{AllocationPolicy, BPS_SCALE, RiskProfile, StrategyConfig};

pub fn check(config: &RouterConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let ledger = &config.ledger;
    let optimizer = &config.optimizer;
    let strategies = &config.strategies;

    for (field, value) in [
        ("ledger.max_sources", ledger.max_sources),
        ("ledger.harvest_history", ledger.harvest_history),
        ("optimizer.market_history", optimizer.market_history),
        ("optimizer.prediction_history", optimizer.prediction_history),
        ("strategies.harvest_history", strategies.harvest_history),
        ("strategies.max_strategies_per_user", strategies.max_strategies_per_user),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue { field: field.into() });
        }
    }

    for (field, value) in [
        ("ledger.performance_fee", ledger.performance_fee),
        ("optimizer.min_confidence", optimizer.min_confidence),
        ("strategies.max_performance_fee", strategies.max_performance_fee),
        ("strategies.max_management_fee", strategies.max_management_fee),
        ("strategies.max_flow_fee", strategies.max_flow_fee),
    ] {
        check_bps(&mut errors, field, value);
    }

    if optimizer.low_volatility >= optimizer.high_volatility || optimizer.high_volatility > 100 {
        errors.push(ValidationError::VolatilityThresholds {
            low: optimizer.low_volatility,
            high: optimizer.high_volatility,
        });
    }

    for (field, value) in [
        ("ledger.asset", &ledger.asset),
        ("ledger.account", &ledger.account),
        ("ledger.fee_recipient", &ledger.fee_recipient),
        ("strategies.asset", &strategies.asset),
        ("strategies.account_prefix", &strategies.account_prefix),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty { what: field.into() });
        }
    }

    check_policy(&mut errors, &ledger.policy);
    check_profile(&mut errors, "optimizer.default_profile", &optimizer.default_profile);
    check_strategy_config(
        &mut errors,
        "strategies.default_config",
        &strategies.default_config,
        strategies.max_flow_fee,
    );
    errors
}

pub(super) fn check_bps(errors: &mut Vec<ValidationError>, field: &str, value: u32) {
    if value > BPS_SCALE {
        errors.push(ValidationError::BpsOutOfRange {
            field: field.into(),
            value,
        });
    }
}

pub(super) fn check_risk(errors: &mut Vec<ValidationError>, field: &str, value: u8) {
    if !(1..=10).contains(&value) {
        errors.push(ValidationError::RiskOutOfRange {
            field: field.into(),
            value,
        });
    }
}

fn check_policy(errors: &mut Vec<ValidationError>, policy: &AllocationPolicy) {
    check_risk(errors, "ledger.policy.risk_tolerance", policy.risk_tolerance);
    check_bps(errors, "ledger.policy.max_single_source", policy.max_single_source);
    check_bps(errors, "ledger.policy.rebalance_threshold", policy.rebalance_threshold);
}

pub(super) fn check_profile(errors: &mut Vec<ValidationError>, prefix: &str, profile: &RiskProfile) {
    check_risk(errors, &format!("{prefix}.risk_tolerance"), profile.risk_tolerance);
    check_risk(errors, &format!("{prefix}.diversification"), profile.diversification);
    check_bps(errors, &format!("{prefix}.max_drawdown"), profile.max_drawdown);
}

pub(super) fn check_strategy_config(
    errors: &mut Vec<ValidationError>,
    prefix: &str,
    config: &StrategyConfig,
    max_flow_fee: u32,
) {
    check_bps(errors, &format!("{prefix}.rebalance_threshold"), config.rebalance_threshold);
    check_bps(errors, &format!("{prefix}.slippage_tolerance"), config.slippage_tolerance);
    for (field, value) in [
        ("deposit_fee", config.deposit_fee),
        ("withdrawal_fee", config.withdrawal_fee),
    ] {
        if value > max_flow_fee {
            errors.push(ValidationError::FeeAboveCap {
                field: format!("{prefix}.{field}"),
                value,
                cap: max_flow_fee,
            });
        }
    }
}
