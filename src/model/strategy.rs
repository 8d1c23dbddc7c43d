use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::{Amount, Bps};
use super::source::SourceId;

pub type StrategyId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SingleAsset,
    DualAsset,
    MultiAsset,
    Leveraged,
    DeltaNeutral,
    Arbitrage,
    YieldFarming,
    LiquidityMining,
}

/// `Inactive → Active ⇄ Paused`, `Active/Paused → Deprecated`,
/// `Active → Emergency`, and `Emergency → Paused` once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Inactive,
    Active,
    Paused,
    Deprecated,
    Emergency,
}

impl StrategyStatus {
    pub fn can_transition_to(self, next: StrategyStatus) -> bool {
        use StrategyStatus::*;
        matches!(
            (self, next),
            (Inactive, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Deprecated)
                | (Paused, Deprecated)
                | (Active, Emergency)
                | (Emergency, Paused)
        )
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyStatus::Inactive => "inactive",
            StrategyStatus::Active => "active",
            StrategyStatus::Paused => "paused",
            StrategyStatus::Deprecated => "deprecated",
            StrategyStatus::Emergency => "in emergency",
        };
        f.write_str(s)
    }
}

/// Admin request to create a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub strategy_type: StrategyType,
    pub input_tokens: Vec<String>,
    #[serde(default)]
    pub output_tokens: Vec<String>,
    /// Venues (ledger source ids) the strategy routes through.
    #[serde(default)]
    pub venues: Vec<SourceId>,
    pub min_deposit: Amount,
    pub max_deposit: Amount,
    /// Seconds between harvests.
    pub harvest_interval: u64,
    pub performance_fee: Bps,
    #[serde(default)]
    pub management_fee: Bps,
    pub risk_level: u8,
    pub expected_apy: Bps,
}

/// A user's stake in one strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserStake {
    pub shares: Amount,
    /// Deposit basis, reduced pro-rata on withdrawal.
    pub deposited: Amount,
    pub last_deposit: u64,
    /// Net rewards credited while auto-compound is off.
    pub rewards: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    pub description: String,
    pub strategy_type: StrategyType,
    pub status: StrategyStatus,
    pub input_tokens: Vec<String>,
    pub output_tokens: Vec<String>,
    pub venues: Vec<SourceId>,
    pub min_deposit: Amount,
    pub max_deposit: Amount,
    pub total_deposited: Amount,
    pub total_shares: Amount,
    pub last_harvest: u64,
    pub harvest_interval: u64,
    pub performance_fee: Bps,
    pub management_fee: Bps,
    pub risk_level: u8,
    pub expected_apy: Bps,
    pub actual_apy: Bps,
    /// Cumulative fees sent to the fee sink.
    pub accrued_fees: Amount,
    pub users: BTreeMap<String, UserStake>,
}

impl Strategy {
    pub fn from_spec(id: StrategyId, spec: StrategySpec, now: u64) -> Self {
        Self {
            id,
            name: spec.name,
            description: spec.description,
            strategy_type: spec.strategy_type,
            status: StrategyStatus::Inactive,
            input_tokens: spec.input_tokens,
            output_tokens: spec.output_tokens,
            venues: spec.venues,
            min_deposit: spec.min_deposit,
            max_deposit: spec.max_deposit,
            total_deposited: 0,
            total_shares: 0,
            last_harvest: now,
            harvest_interval: spec.harvest_interval,
            performance_fee: spec.performance_fee,
            management_fee: spec.management_fee,
            risk_level: spec.risk_level,
            expected_apy: spec.expected_apy,
            actual_apy: 0,
            accrued_fees: 0,
            users: BTreeMap::new(),
        }
    }

    pub fn stake(&self, user: &str) -> Option<&UserStake> {
        self.users.get(user)
    }
}

/// Per-strategy execution knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StrategyConfig {
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Bps,
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: Bps,
    #[serde(default)]
    pub min_profit_to_harvest: Amount,
    #[serde(default = "default_true")]
    pub auto_compound: bool,
    #[serde(default = "default_true")]
    pub auto_rebalance: bool,
    #[serde(default = "default_true")]
    pub emergency_withdraw_enabled: bool,
    #[serde(default)]
    pub withdrawal_fee: Bps,
    #[serde(default)]
    pub deposit_fee: Bps,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rebalance_threshold: default_rebalance_threshold(),
            slippage_tolerance: default_slippage_tolerance(),
            min_profit_to_harvest: 0,
            auto_compound: true,
            auto_rebalance: true,
            emergency_withdraw_enabled: true,
            withdrawal_fee: 0,
            deposit_fee: 0,
        }
    }
}

fn default_rebalance_threshold() -> Bps {
    500
}
fn default_slippage_tolerance() -> Bps {
    100
}
fn default_true() -> bool {
    true
}

/// Parameters for a keeper-triggered strategy rebalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RebalanceParams {
    /// Unix timestamp after which the request is stale.
    pub deadline: u64,
    /// Desired weights across the strategy's venues; empty keeps the current ones.
    #[serde(default)]
    pub target_weights: Vec<Bps>,
    pub max_slippage: Bps,
}

/// Rolling performance of a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceMetrics {
    /// Cumulative net return in bps of deposits at each harvest.
    pub total_return: i64,
    /// Last harvest period's return extrapolated to a year.
    pub annualized_return: i64,
    pub max_drawdown: Bps,
    pub sharpe_ratio: f64,
    /// Standard deviation of per-harvest returns (bps).
    pub volatility: f64,
    pub win_rate: Bps,
    pub total_trades: u64,
    pub profitable_trades: u64,
    pub last_update: u64,
}
