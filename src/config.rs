use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{AllocationPolicy, Amount, Bps, RiskProfile, StrategyConfig};

/// Top-level configuration of a `YieldRouter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouterConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub strategies: StrategyEngineConfig,
}

// ── Ledger ──────────────────────────────────────────────────────────

/// Order in which sources are drained when a withdrawal exceeds the idle buffer.
///
/// A policy choice, not a safety ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalOrder {
    /// Most recently registered source first.
    #[default]
    ReverseRegistration,
    Registration,
    LowestApyFirst,
    HighestRiskFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerConfig {
    /// Settlement token every source must accept.
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Custody account holding the idle buffer.
    #[serde(default = "default_ledger_account")]
    pub account: String,
    /// Custody account receiving performance fees.
    #[serde(default = "default_fee_recipient")]
    pub fee_recipient: String,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_history")]
    pub harvest_history: usize,
    /// Harvests below this are credited without a fee or a record.
    #[serde(default = "default_dust")]
    pub min_harvest: Amount,
    #[serde(default = "default_performance_fee")]
    pub performance_fee: Bps,
    #[serde(default)]
    pub withdrawal_order: WithdrawalOrder,
    #[serde(default)]
    pub policy: AllocationPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            account: default_ledger_account(),
            fee_recipient: default_fee_recipient(),
            max_sources: default_max_sources(),
            harvest_history: default_history(),
            min_harvest: default_dust(),
            performance_fee: default_performance_fee(),
            withdrawal_order: WithdrawalOrder::default(),
            policy: AllocationPolicy::default(),
        }
    }
}

// ── Optimizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorKind {
    /// Equal split; the last source absorbs the rounding remainder.
    #[default]
    EqualWeight,
    /// Weight by APY / risk², Kelly-style.
    RiskAdjustedYield,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptimizerConfig {
    /// Minimum seconds between two optimizations for the same user.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    #[serde(default = "default_history")]
    pub market_history: usize,
    #[serde(default = "default_prediction_history")]
    pub prediction_history: usize,
    /// Predictions never report less confidence than this.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Bps,
    /// Volatility index (0–100) at or above which markets count as volatile.
    #[serde(default = "default_high_volatility")]
    pub high_volatility: u8,
    /// Volatility index (0–100) at or below which markets count as calm.
    #[serde(default = "default_low_volatility")]
    pub low_volatility: u8,
    #[serde(default)]
    pub allocator: AllocatorKind,
    /// Applied to users who never set a profile.
    #[serde(default)]
    pub default_profile: RiskProfile,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            market_history: default_history(),
            prediction_history: default_prediction_history(),
            min_confidence: default_min_confidence(),
            high_volatility: default_high_volatility(),
            low_volatility: default_low_volatility(),
            allocator: AllocatorKind::default(),
            default_profile: RiskProfile::default(),
        }
    }
}

// ── Strategies ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StrategyEngineConfig {
    /// Settlement token for strategy deposits.
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Strategy custody accounts are `<prefix>:<id>`.
    #[serde(default = "default_strategy_prefix")]
    pub account_prefix: String,
    #[serde(default = "default_fee_recipient")]
    pub fee_recipient: String,
    /// Reserve account that funds accrued strategy rewards at harvest.
    #[serde(default = "default_rewards_account")]
    pub rewards_account: String,
    /// Distinct strategies a single user may hold at once.
    #[serde(default = "default_max_strategies")]
    pub max_strategies_per_user: usize,
    #[serde(default = "default_history")]
    pub harvest_history: usize,
    #[serde(default = "default_max_performance_fee")]
    pub max_performance_fee: Bps,
    #[serde(default = "default_max_management_fee")]
    pub max_management_fee: Bps,
    /// Cap on deposit and withdrawal fees.
    #[serde(default = "default_max_flow_fee")]
    pub max_flow_fee: Bps,
    /// Seeded into every new strategy.
    #[serde(default)]
    pub default_config: StrategyConfig,
}

impl Default for StrategyEngineConfig {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            account_prefix: default_strategy_prefix(),
            fee_recipient: default_fee_recipient(),
            rewards_account: default_rewards_account(),
            max_strategies_per_user: default_max_strategies(),
            harvest_history: default_history(),
            max_performance_fee: default_max_performance_fee(),
            max_management_fee: default_max_management_fee(),
            max_flow_fee: default_max_flow_fee(),
            default_config: StrategyConfig::default(),
        }
    }
}

fn default_asset() -> String {
    "USDC".to_string()
}
fn default_ledger_account() -> String {
    "ledger".to_string()
}
fn default_fee_recipient() -> String {
    "treasury".to_string()
}
fn default_rewards_account() -> String {
    "rewards".to_string()
}
fn default_strategy_prefix() -> String {
    "strategy".to_string()
}
fn default_max_sources() -> usize {
    20
}
fn default_history() -> usize {
    100
}
fn default_prediction_history() -> usize {
    50
}
fn default_dust() -> Amount {
    1_000
}
fn default_performance_fee() -> Bps {
    1_000
}
fn default_cooldown() -> u64 {
    3_600
}
fn default_min_confidence() -> Bps {
    1_000
}
fn default_high_volatility() -> u8 {
    70
}
fn default_low_volatility() -> u8 {
    30
}
fn default_max_strategies() -> usize {
    10
}
fn default_max_performance_fee() -> Bps {
    2_000
}
fn default_max_management_fee() -> Bps {
    500
}
fn default_max_flow_fee() -> Bps {
    500
}
