use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::{Amount, Bps};
use super::source::SourceId;

pub type ModelId = u32;

/// Accuracy every newly registered model starts from.
pub const NEUTRAL_ACCURACY: Bps = 5_000;

/// A registered forecasting/optimization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptimizationModel {
    pub id: ModelId,
    pub name: String,
    pub version: String,
    pub accuracy: Bps,
    pub parameters: BTreeMap<String, i64>,
    pub active: bool,
}

/// Latest recommendation computed for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptimizationResult {
    pub sources: Vec<SourceId>,
    /// Parallel to `sources`; sums to 10000.
    pub allocations: Vec<Bps>,
    pub amount: Amount,
    pub expected_apy: Bps,
    /// Allocation-weighted risk level ×1000 (10000 = every source at level 10).
    pub risk_score: Bps,
    pub confidence: Bps,
    pub time_horizon_days: u32,
    pub rationale: String,
    pub timestamp: u64,
}

/// A single APY forecast for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YieldPrediction {
    pub source: SourceId,
    pub predicted_apy: Bps,
    pub confidence: Bps,
    pub timeframe_days: u32,
    pub risk_score: u8,
    pub factors: Vec<String>,
    pub timestamp: u64,
}

/// Output of the weighted-estimate backtest. This is an approximation from
/// current APY/risk fields, not a replay of historical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BacktestEstimate {
    pub weighted_return: Bps,
    pub weighted_risk: Bps,
    pub sharpe_ratio: f64,
    /// Approximated as half the weighted risk.
    pub max_drawdown: Bps,
    /// `weighted_return` pro-rated over the window length.
    pub period_return: Bps,
    pub start: u64,
    pub end: u64,
}
