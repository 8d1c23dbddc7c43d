//! Multi-source yield router.
//!
//! An allocation ledger that pools one settlement asset across registered
//! yield venues, an optimization engine that recommends allocations and
//! predicts yield, and a strategy engine running managed pooled strategies.
//! `YieldRouter` composes the three behind serialized sections.

pub mod access;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod example;
pub mod ledger;
pub mod model;
pub mod optimizer;
pub mod router;
pub mod schema;
pub mod simulate;
pub mod store;
pub mod strategy;
pub mod validate;
pub mod venues;

pub use access::{Caller, Role};
pub use error::{ErrorClass, Result, RouterError};
pub use router::YieldRouter;
