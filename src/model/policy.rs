use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Bps;

/// Global allocation policy. One per ledger, replaced by admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AllocationPolicy {
    /// 1–10.
    #[serde(default = "default_risk_tolerance")]
    pub risk_tolerance: u8,
    #[serde(default = "default_yield_target")]
    pub yield_target: Bps,
    /// Cap on any single source's target allocation.
    #[serde(default = "default_max_single_source")]
    pub max_single_source: Bps,
    /// Relative deviation from target that triggers a rebalance.
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Bps,
    #[serde(default = "default_true")]
    pub auto_rebalance: bool,
    #[serde(default)]
    pub emergency_mode: bool,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            risk_tolerance: default_risk_tolerance(),
            yield_target: default_yield_target(),
            max_single_source: default_max_single_source(),
            rebalance_threshold: default_rebalance_threshold(),
            auto_rebalance: true,
            emergency_mode: false,
        }
    }
}

fn default_risk_tolerance() -> u8 {
    5
}
fn default_yield_target() -> Bps {
    800
}
fn default_max_single_source() -> Bps {
    10_000
}
fn default_rebalance_threshold() -> Bps {
    500
}
fn default_true() -> bool {
    true
}
