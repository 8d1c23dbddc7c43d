mod config;
mod scenario;

use std::path::Path;

use thiserror::Error;

use crate::config::RouterConfig;
use crate::simulate::scenario::Scenario;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{field}` = {value} bps exceeds 10000")]
    BpsOutOfRange { field: String, value: u32 },

    #[error("`{field}` = {value} outside risk range 1..=10")]
    RiskOutOfRange { field: String, value: u8 },

    #[error("`{field}` must be greater than zero")]
    ZeroValue { field: String },

    #[error("volatility thresholds out of order: low {low} must be below high {high} (both ≤ 100)")]
    VolatilityThresholds { low: u8, high: u8 },

    #[error("`{field}` = {value} bps exceeds its cap of {cap} bps")]
    FeeAboveCap { field: String, value: u32, cap: u32 },

    #[error("duplicate source id `{id}`")]
    DuplicateSource { id: String },

    #[error("source `{id}` settles in `{token}` but the ledger asset is `{asset}`")]
    TokenMismatch { id: String, token: String, asset: String },

    #[error("source `{id}` target {target} bps outside its bounds {min}..={max}")]
    AllocationBounds { id: String, target: u32, min: u32, max: u32 },

    #[error("aggregate target allocation {total} bps exceeds 10000")]
    AllocationExceeded { total: u64 },

    #[error("{count} sources exceed registry capacity {capacity}")]
    TooManySources { count: usize, capacity: usize },

    #[error("strategy `{name}` has min_deposit {min} above max_deposit {max}")]
    DepositBounds { name: String, min: u128, max: u128 },

    #[error("strategy `{name}` venue `{venue}` is not a declared source")]
    UnknownVenue { name: String, venue: String },

    #[error("{what} is empty")]
    Empty { what: String },
}

/// Load and fully validate a scenario from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<Scenario, Vec<ValidationError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ValidationError::Io(e)])?;
    let scenario: Scenario =
        serde_json::from_str(&contents).map_err(|e| vec![ValidationError::Json(e)])?;
    validate(&scenario)?;
    Ok(scenario)
}

/// Validate a router config, collecting all errors.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    collect(config::check(config))
}

/// Validate a scenario and its embedded config, collecting all errors.
pub fn validate(scenario: &Scenario) -> Result<(), Vec<ValidationError>> {
    let mut errors = config::check(&scenario.config);
    errors.extend(scenario::check_sources(scenario));
    errors.extend(scenario::check_depositors(scenario));
    errors.extend(scenario::check_strategies(scenario));
    collect(errors)
}

fn collect(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(scenario) => {
            println!(
                "Scenario '{}' is valid. {} sources, {} depositors, {} strategies.",
                scenario.name,
                scenario.sources.len(),
                scenario.depositors.len(),
                scenario.strategies.len()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}
