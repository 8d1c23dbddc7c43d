use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::model::{Amount, Bps, MarketReport, RiskProfile, SourceSpec, StrategyConfig, StrategySpec};

/// A self-contained simulation: router config, simulated venues, depositors,
/// strategies and a keeper schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: RouterConfig,
    pub sources: Vec<SimSource>,
    #[serde(default)]
    pub depositors: Vec<Depositor>,
    #[serde(default)]
    pub strategies: Vec<SimStrategy>,
    /// Recorded once before the first tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketReport>,
    /// Tokens minted into the strategy rewards reserve.
    #[serde(default)]
    pub rewards_reserve: Amount,
    #[serde(default)]
    pub keeper: KeeperSchedule,
}

/// A source backed by a simulated venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimSource {
    pub spec: SourceSpec,
    /// Max ± APY deviation per tick, bps.
    #[serde(default)]
    pub apy_jitter: Bps,
    /// Fraction lost on every withdrawal from the venue, bps.
    #[serde(default)]
    pub withdraw_slippage: Bps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Depositor {
    pub user: String,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<RiskProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimStrategy {
    pub spec: StrategySpec,
    /// Overrides the engine default config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StrategyConfig>,
    #[serde(default)]
    pub deposits: Vec<Depositor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeeperSchedule {
    #[serde(default = "default_every_hours")]
    pub harvest_every_hours: u64,
    #[serde(default = "default_every_hours")]
    pub rebalance_every_hours: u64,
    /// Re-optimize target allocations once per rebalance.
    #[serde(default)]
    pub optimize: bool,
}

impl Default for KeeperSchedule {
    fn default() -> Self {
        Self {
            harvest_every_hours: default_every_hours(),
            rebalance_every_hours: default_every_hours(),
            optimize: false,
        }
    }
}

fn default_every_hours() -> u64 {
    24
}
