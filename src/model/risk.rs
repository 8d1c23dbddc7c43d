use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Bps;
use crate::error::{Result, RouterError};

/// A user's declared investment preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskProfile {
    /// 1–10; sources riskier than this are filtered out.
    pub risk_tolerance: u8,
    pub max_drawdown: Bps,
    pub target_apy: Bps,
    /// Investment horizon in days.
    pub time_horizon_days: u32,
    pub stablecoin_only: bool,
    pub leverage_allowed: bool,
    /// 1–10.
    pub diversification: u8,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            risk_tolerance: 5,
            max_drawdown: 1_000,
            target_apy: 800,
            time_horizon_days: 90,
            stablecoin_only: false,
            leverage_allowed: false,
            diversification: 5,
        }
    }
}

impl RiskProfile {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.risk_tolerance) {
            return Err(RouterError::range("risk_tolerance", self.risk_tolerance, 1, 10));
        }
        if !(1..=10).contains(&self.diversification) {
            return Err(RouterError::range("diversification", self.diversification, 1, 10));
        }
        if self.max_drawdown > 10_000 {
            return Err(RouterError::range("max_drawdown", self.max_drawdown, 0, 10_000));
        }
        Ok(())
    }
}
