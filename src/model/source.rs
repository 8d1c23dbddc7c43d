use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::{Amount, Bps};

/// Stable handle of an external yield venue.
pub type SourceId = String;

/// Lifecycle of a registered source.
///
/// `Active ⇄ Inactive`, `Active → EmergencyExit` (terminal), and any drained
/// source may become `Removed`. Exited and removed sources keep their totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Inactive,
    EmergencyExit,
    Removed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceStatus::Active => "active",
            SourceStatus::Inactive => "inactive",
            SourceStatus::EmergencyExit => "emergency-exited",
            SourceStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Registration request for a new source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceSpec {
    pub id: SourceId,
    /// Settlement token symbol; must match the ledger asset.
    pub token: String,
    pub target_allocation: Bps,
    #[serde(default)]
    pub min_allocation: Bps,
    #[serde(default = "default_max_allocation")]
    pub max_allocation: Bps,
    /// Current APY estimate in bps.
    #[serde(default)]
    pub apy: Bps,
    /// 1 (safest) to 10.
    pub risk_level: u8,
}

fn default_max_allocation() -> Bps {
    10_000
}

/// A registered yield venue and its running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YieldSource {
    pub id: SourceId,
    pub token: String,
    pub target_allocation: Bps,
    pub min_allocation: Bps,
    pub max_allocation: Bps,
    /// Capital the ledger currently holds at this venue.
    pub balance: Amount,
    pub total_deposited: Amount,
    pub total_harvested: Amount,
    pub last_harvest: u64,
    pub apy: Bps,
    pub risk_level: u8,
    pub status: SourceStatus,
    /// Position in the registry; drives registration-order withdrawal policies.
    pub registration_index: usize,
}

impl YieldSource {
    pub fn from_spec(spec: SourceSpec, registration_index: usize, now: u64) -> Self {
        Self {
            id: spec.id,
            token: spec.token,
            target_allocation: spec.target_allocation,
            min_allocation: spec.min_allocation,
            max_allocation: spec.max_allocation,
            balance: 0,
            total_deposited: 0,
            total_harvested: 0,
            last_harvest: now,
            apy: spec.apy,
            risk_level: spec.risk_level,
            status: SourceStatus::Active,
            registration_index,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SourceStatus::Active
    }

    /// Emergency-exited sources are skipped by allocation and rebalancing forever.
    pub fn is_exited(&self) -> bool {
        self.status == SourceStatus::EmergencyExit
    }
}
