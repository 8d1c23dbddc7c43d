use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::source::SourceId;

/// A depositor's book in the pooled ledger. Created on first deposit and
/// never deleted; a zero balance is a valid resting state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerPosition {
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    pub yield_earned: Amount,
    pub shares: Amount,
    /// Deposited capital not yet returned, reduced pro-rata on withdrawal.
    pub cost_basis: Amount,
    pub last_deposit: u64,
    pub last_withdraw: u64,
    /// Deposited capital still attributed to each source it was routed to.
    pub allocations: BTreeMap<SourceId, Amount>,
}
