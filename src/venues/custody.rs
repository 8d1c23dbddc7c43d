use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::TokenCustody;
use crate::model::Amount;

/// Per-account token balances kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    inner: Mutex<HashMap<String, HashMap<String, Amount>>>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &str, token: &str) -> Amount {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .get(account)
            .and_then(|m| m.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Credit tokens from outside the system (faucet for tests and simulations).
    pub fn mint(&self, account: &str, token: &str, amount: Amount) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner
            .entry(account.to_string())
            .or_default()
            .entry(token.to_string())
            .or_insert(0) += amount;
    }

    /// Sum of one token across every account.
    pub fn total_supply(&self, token: &str) -> Amount {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.values().filter_map(|m| m.get(token)).sum()
    }
}

#[async_trait]
impl TokenCustody for InMemoryCustody {
    async fn transfer(&self, token: &str, from: &str, to: &str, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let available = inner
            .get(from)
            .and_then(|m| m.get(token))
            .copied()
            .unwrap_or(0);
        if available < amount {
            bail!("{from} holds {available} {token}, cannot transfer {amount} to {to}");
        }
        *inner
            .entry(from.to_string())
            .or_default()
            .entry(token.to_string())
            .or_insert(0) -= amount;
        *inner
            .entry(to.to_string())
            .or_default()
            .entry(token.to_string())
            .or_insert(0) += amount;
        Ok(())
    }

    async fn balance_of(&self, token: &str, account: &str) -> Result<Amount> {
        Ok(self.get(account, token))
    }
}
