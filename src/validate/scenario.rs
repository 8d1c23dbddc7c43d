use std::collections::HashSet;

use super::ValidationError;
use super::config::{check_bps, check_profile, check_risk, check_strategy_config};
use crate::simulate::scenario::Scenario;

pub fn check_sources(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let ledger = &scenario.config.ledger;
    if scenario.sources.is_empty() {
        errors.push(ValidationError::Empty { what: "sources".into() });
    }
    if scenario.sources.len() > ledger.max_sources {
        errors.push(ValidationError::TooManySources {
            count: scenario.sources.len(),
            capacity: ledger.max_sources,
        });
    }

    let mut seen = HashSet::new();
    let mut total: u64 = 0;
    for source in &scenario.sources {
        let spec = &source.spec;
        if !seen.insert(spec.id.as_str()) {
            errors.push(ValidationError::DuplicateSource { id: spec.id.clone() });
        }
        if spec.token != ledger.asset {
            errors.push(ValidationError::TokenMismatch {
                id: spec.id.clone(),
                token: spec.token.clone(),
                asset: ledger.asset.clone(),
            });
        }
        check_risk(&mut errors, &format!("sources.{}.risk_level", spec.id), spec.risk_level);
        check_bps(&mut errors, &format!("sources.{}.apy_jitter", spec.id), source.apy_jitter);
        check_bps(
            &mut errors,
            &format!("sources.{}.withdraw_slippage", spec.id),
            source.withdraw_slippage,
        );
        let max = spec.max_allocation.min(ledger.policy.max_single_source);
        if spec.target_allocation < spec.min_allocation || spec.target_allocation > max {
            errors.push(ValidationError::AllocationBounds {
                id: spec.id.clone(),
                target: spec.target_allocation,
                min: spec.min_allocation,
                max,
            });
        }
        total += spec.target_allocation as u64;
    }
    if total > 10_000 {
        errors.push(ValidationError::AllocationExceeded { total });
    }
    errors
}

pub fn check_depositors(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for depositor in &scenario.depositors {
        if depositor.amount == 0 {
            errors.push(ValidationError::ZeroValue {
                field: format!("depositors.{}.amount", depositor.user),
            });
        }
        if let Some(profile) = &depositor.risk_profile {
            check_profile(&mut errors, &format!("depositors.{}.risk_profile", depositor.user), profile);
        }
    }
    errors
}

pub fn check_strategies(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let caps = &scenario.config.strategies;
    let sources: HashSet<&str> = scenario.sources.iter().map(|s| s.spec.id.as_str()).collect();
    for strategy in &scenario.strategies {
        let spec = &strategy.spec;
        if spec.name.trim().is_empty() {
            errors.push(ValidationError::Empty { what: "strategy name".into() });
        }
        if spec.min_deposit > spec.max_deposit {
            errors.push(ValidationError::DepositBounds {
                name: spec.name.clone(),
                min: spec.min_deposit,
                max: spec.max_deposit,
            });
        }
        if spec.harvest_interval == 0 {
            errors.push(ValidationError::ZeroValue {
                field: format!("strategies.{}.harvest_interval", spec.name),
            });
        }
        check_risk(&mut errors, &format!("strategies.{}.risk_level", spec.name), spec.risk_level);
        for (field, value, cap) in [
            ("performance_fee", spec.performance_fee, caps.max_performance_fee),
            ("management_fee", spec.management_fee, caps.max_management_fee),
        ] {
            if value > cap {
                errors.push(ValidationError::FeeAboveCap {
                    field: format!("strategies.{}.{field}", spec.name),
                    value,
                    cap,
                });
            }
        }
        for venue in &spec.venues {
            if !sources.contains(venue.as_str()) {
                errors.push(ValidationError::UnknownVenue {
                    name: spec.name.clone(),
                    venue: venue.clone(),
                });
            }
        }
        if let Some(config) = &strategy.config {
            check_strategy_config(
                &mut errors,
                &format!("strategies.{}.config", spec.name),
                config,
                caps.max_flow_fee,
            );
        }
    }
    errors
}
