use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Amount;

/// One harvest attempt against a source (ledger) or a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HarvestRecord {
    pub timestamp: u64,
    /// Source id for ledger harvests, `strategy:<id>` for strategy harvests.
    pub source: String,
    pub harvested: Amount,
    /// Net of performance (and, for strategies, management) fees.
    pub profit: Amount,
    pub success: bool,
}
