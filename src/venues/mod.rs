pub mod custody;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Amount, Bps};

pub use custody::InMemoryCustody;
pub use simulated::SimulatedVenue;

// ── Venue adapter ───────────────────────────────────────────────────

/// Opaque deposit/withdraw/harvest capability of one external yield venue.
///
/// The ledger owns one adapter per registered source. Live adapters do real
/// I/O; the simulated adapter accrues yield from an APY on `tick`.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Move `amount` of the settlement token from the ledger into the venue.
    async fn deposit(&mut self, amount: Amount) -> Result<()>;

    /// Pull up to `amount` back out. Returns what actually arrived, which may
    /// be less than requested (slippage, withdrawal caps).
    async fn withdraw(&mut self, amount: Amount) -> Result<Amount>;

    /// Realize accrued yield and send it to the ledger. Returns the amount harvested.
    async fn harvest(&mut self) -> Result<Amount>;

    /// Principal currently held at the venue, excluding unharvested yield.
    async fn balance(&self) -> Result<Amount>;

    /// Live APY estimate, if the venue exposes one.
    fn current_apy(&self) -> Option<Bps> {
        None
    }

    /// Advance internal state by one tick. `now` is a unix timestamp.
    async fn tick(&mut self, _now: u64, _dt_secs: u64) -> Result<()> {
        Ok(())
    }
}

// ── Token custody ───────────────────────────────────────────────────

/// Moves settlement tokens between external owners, the ledger, strategies
/// and the fee sink. Shared by every engine, so it uses interior mutability.
#[async_trait]
pub trait TokenCustody: Send + Sync {
    async fn transfer(&self, token: &str, from: &str, to: &str, amount: Amount) -> Result<()>;

    async fn balance_of(&self, token: &str, account: &str) -> Result<Amount>;
}
