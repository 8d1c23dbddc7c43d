//! Primitives shared by the ledger, optimizer and strategy engines.

pub mod clock;
pub mod ring;
pub mod sync;

pub use clock::{Clock, ManualClock, SimClock, SystemClock};
pub use ring::RingHistory;
pub use sync::{Section, Serialized};
