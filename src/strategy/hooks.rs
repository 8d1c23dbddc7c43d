use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Amount, Bps, RebalanceParams, Strategy, StrategyConfig, StrategyId};

/// Type-specific execution policy a strategy dispatches to.
///
/// Hooks see the strategy as committed before the call. Amounts they return
/// are what actually came back to the strategy's custody account.
#[async_trait]
pub trait ExecutionHook: Send + Sync {
    /// Put freshly deposited capital to work.
    async fn deploy(&mut self, strategy: &Strategy, amount: Amount) -> Result<()>;

    /// Unwind `amount`. May return less than requested.
    async fn withdraw(&mut self, strategy: &Strategy, amount: Amount) -> Result<Amount>;

    /// Unwind `amount` as fast as possible, ignoring slippage limits.
    async fn emergency_exit(&mut self, strategy: &Strategy, amount: Amount) -> Result<Amount> {
        self.withdraw(strategy, amount).await
    }

    fn needs_rebalance(&self, strategy: &Strategy, config: &StrategyConfig, params: &RebalanceParams) -> bool;

    /// Move toward `params.target_weights`. Returns realized slippage in bps.
    async fn rebalance(&mut self, strategy: &Strategy, params: &RebalanceParams) -> Result<Bps>;
}

/// Baseline hook that only keeps books: capital stays in the strategy's
/// custody account, withdrawals return exactly what was asked, and venue
/// weights are tracked so rebalance requests can be judged.
#[derive(Debug, Default)]
pub struct AccountingHook {
    weights: HashMap<StrategyId, Vec<Bps>>,
}

impl AccountingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self, id: StrategyId) -> Option<&[Bps]> {
        self.weights.get(&id).map(|w| w.as_slice())
    }
}

#[async_trait]
impl ExecutionHook for AccountingHook {
    async fn deploy(&mut self, strategy: &Strategy, _amount: Amount) -> Result<()> {
        self.weights
            .entry(strategy.id)
            .or_insert_with(|| even_weights(strategy.venues.len()));
        Ok(())
    }

    async fn withdraw(&mut self, _strategy: &Strategy, amount: Amount) -> Result<Amount> {
        Ok(amount)
    }

    fn needs_rebalance(&self, strategy: &Strategy, config: &StrategyConfig, params: &RebalanceParams) -> bool {
        if params.target_weights.is_empty() {
            return false;
        }
        let current = self
            .weights
            .get(&strategy.id)
            .cloned()
            .unwrap_or_else(|| even_weights(params.target_weights.len()));
        current.len() != params.target_weights.len()
            || current
                .iter()
                .zip(&params.target_weights)
                .any(|(c, t)| c.abs_diff(*t) >= config.rebalance_threshold)
    }

    async fn rebalance(&mut self, strategy: &Strategy, params: &RebalanceParams) -> Result<Bps> {
        self.weights.insert(strategy.id, params.target_weights.clone());
        Ok(0)
    }
}

fn even_weights(n: usize) -> Vec<Bps> {
    crate::optimizer::allocator::normalize(&vec![1 as Amount; n])
}
