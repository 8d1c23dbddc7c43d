use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rand::prelude::*;

use super::custody::InMemoryCustody;
use super::{TokenCustody, VenueAdapter};
use crate::model::amount::{accrue, apply_bps};
use crate::model::{Amount, Bps};

/// Venue simulator: APY accrual with optional per-tick jitter and withdrawal slippage.
///
/// Tokens really move through custody: principal sits in the venue's own
/// account, accrued yield is minted into it on each tick, and harvests and
/// withdrawals transfer back to the ledger account.
pub struct SimulatedVenue {
    account: String,
    ledger_account: String,
    token: String,
    custody: Arc<InMemoryCustody>,
    apy: Bps,
    /// Max ± deviation applied to `apy` on each tick.
    apy_jitter: Bps,
    withdraw_slippage: Bps,
    current_apy: Bps,
    rng: StdRng,
    pub principal: Amount,
    pub accrued: Amount,
}

impl SimulatedVenue {
    pub fn new(
        source_id: &str,
        ledger_account: &str,
        token: &str,
        custody: Arc<InMemoryCustody>,
        apy: Bps,
    ) -> Self {
        Self {
            account: format!("venue:{source_id}"),
            ledger_account: ledger_account.to_string(),
            token: token.to_string(),
            custody,
            apy,
            apy_jitter: 0,
            withdraw_slippage: 0,
            current_apy: apy,
            rng: StdRng::seed_from_u64(0),
            principal: 0,
            accrued: 0,
        }
    }

    pub fn with_jitter(mut self, jitter: Bps, seed: u64) -> Self {
        self.apy_jitter = jitter;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_withdraw_slippage(mut self, slippage: Bps) -> Self {
        self.withdraw_slippage = slippage;
        self
    }

    fn sample_apy(&mut self) -> Bps {
        if self.apy_jitter == 0 {
            return self.apy;
        }
        let jitter = self.apy_jitter as i64;
        let delta = self.rng.random_range(-jitter..=jitter);
        (self.apy as i64 + delta).max(0) as Bps
    }
}

#[async_trait]
impl VenueAdapter for SimulatedVenue {
    async fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.custody
            .transfer(&self.token, &self.ledger_account, &self.account, amount)
            .await?;
        self.principal += amount;
        Ok(())
    }

    async fn withdraw(&mut self, amount: Amount) -> Result<Amount> {
        let take = amount.min(self.principal);
        let lost = apply_bps(take, self.withdraw_slippage)?;
        let actual = take - lost;
        self.custody
            .transfer(&self.token, &self.account, &self.ledger_account, actual)
            .await?;
        self.principal -= take;
        Ok(actual)
    }

    async fn harvest(&mut self) -> Result<Amount> {
        let harvested = self.accrued;
        self.custody
            .transfer(&self.token, &self.account, &self.ledger_account, harvested)
            .await?;
        self.accrued = 0;
        Ok(harvested)
    }

    async fn balance(&self) -> Result<Amount> {
        Ok(self.principal)
    }

    fn current_apy(&self) -> Option<Bps> {
        Some(self.current_apy)
    }

    async fn tick(&mut self, _now: u64, dt_secs: u64) -> Result<()> {
        if dt_secs == 0 || self.principal == 0 {
            return Ok(());
        }
        self.current_apy = self.sample_apy();
        let interest = accrue(self.principal, self.current_apy, dt_secs)?;
        if interest > 0 {
            self.custody.mint(&self.account, &self.token, interest);
            self.accrued += interest;
        }
        Ok(())
    }
}
