use thiserror::Error;

use crate::access::Role;

/// Failure class of a core operation. None of them leave partial state behind;
/// callers decide whether and when to re-attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input, rejected before any state change.
    Validation,
    /// The operation would break a ledger/strategy invariant.
    Invariant,
    /// Temporal or status gate not met (cooldown, interval, deadline, emergency).
    Eligibility,
    /// Caller lacks the capability for a privileged operation.
    Authorization,
    /// Re-entrant invocation for an account/target already in flight.
    Concurrency,
    /// Venue adapter or custody collaborator failed.
    External,
}

#[derive(Debug, Error)]
pub enum RouterError {
    // ── Validation ──────────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("{field} = {value} outside valid range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("length mismatch: {left} has {left_len} entries, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("invalid time window: start {start} must precede end {end}")]
    InvalidWindow { start: u64, end: u64 },

    #[error("time window end {end} is in the future (now {now})")]
    WindowInFuture { end: u64, now: u64 },

    #[error("source `{source_id}` settles in `{token}` but the ledger holds `{expected}`")]
    TokenMismatch {
        source_id: String,
        token: String,
        expected: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown source `{0}`")]
    UnknownSource(String),

    #[error("unknown optimization model #{0}")]
    UnknownModel(u32),

    #[error("unknown strategy #{0}")]
    UnknownStrategy(u64),

    // ── Invariants ──────────────────────────────────────────────────
    #[error("source `{0}` is already registered")]
    DuplicateSource(String),

    #[error("source registry is full ({capacity} sources)")]
    RegistryFull { capacity: usize },

    #[error("aggregate target allocation {total} bps would exceed 10000 bps")]
    AllocationExceeded { total: u64 },

    #[error("allocation {allocation} bps for `{source_id}` outside bounds {min}..={max}")]
    AllocationOutOfBounds {
        source_id: String,
        allocation: u32,
        min: u32,
        max: u32,
    },

    #[error("insufficient shares: requested {requested}, held {available}")]
    InsufficientShares { requested: u128, available: u128 },

    #[error("insufficient liquidity: need {requested}, reachable {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("deposit {amount} below strategy minimum {min}")]
    DepositBelowMinimum { amount: u128, min: u128 },

    #[error("deposit would bring strategy total to {total}, above maximum {max}")]
    DepositAboveMaximum { total: u128, max: u128 },

    #[error("user `{user}` already holds the maximum of {limit} strategies")]
    StrategyLimitReached { user: String, limit: usize },

    #[error("optimization model #{0} is inactive")]
    ModelInactive(u32),

    #[error("source `{source_id}` is {status} and cannot take this action")]
    SourceUnavailable { source_id: String, status: String },

    #[error("no active source matches risk tolerance {tolerance}")]
    NoEligibleSources { tolerance: u8 },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("arithmetic overflow in {op}")]
    Overflow { op: &'static str },

    // ── Eligibility ─────────────────────────────────────────────────
    #[error("optimization cooldown active for `{user}` until {ready_at}")]
    CooldownActive { user: String, ready_at: u64 },

    #[error("strategy #{strategy_id} harvest not ready until {ready_at}")]
    HarvestNotReady { strategy_id: u64, ready_at: u64 },

    #[error("harvest profit {profit} below configured minimum {min}")]
    BelowMinimumProfit { profit: u128, min: u128 },

    #[error("deadline {deadline} has passed (now {now})")]
    DeadlinePassed { deadline: u64, now: u64 },

    #[error("auto-rebalance is disabled for strategy #{0}")]
    AutoRebalanceDisabled(u64),

    #[error("ledger is in emergency mode")]
    EmergencyMode,

    #[error("strategy #{strategy_id} is {status}")]
    StrategyUnavailable { strategy_id: u64, status: String },

    #[error("emergency withdrawal is disabled for strategy #{0}")]
    EmergencyWithdrawDisabled(u64),

    // ── Authorization ───────────────────────────────────────────────
    #[error("caller `{caller}` lacks the {required:?} capability")]
    Unauthorized { caller: String, required: Role },

    // ── Concurrency ─────────────────────────────────────────────────
    #[error("operation already in progress for `{key}`")]
    Reentrant { key: String },

    // ── External collaborators ──────────────────────────────────────
    #[error("venue `{source_id}` failed: {error:#}")]
    Venue { source_id: String, error: anyhow::Error },

    #[error("custody transfer failed: {0:#}")]
    Custody(anyhow::Error),
}

impl RouterError {
    pub fn class(&self) -> ErrorClass {
        use RouterError::*;
        match self {
            ZeroAmount
            | OutOfRange { .. }
            | LengthMismatch { .. }
            | InvalidWindow { .. }
            | WindowInFuture { .. }
            | TokenMismatch { .. }
            | InvalidInput(_)
            | UnknownSource(_)
            | UnknownModel(_)
            | UnknownStrategy(_) => ErrorClass::Validation,

            DuplicateSource(_)
            | RegistryFull { .. }
            | AllocationExceeded { .. }
            | AllocationOutOfBounds { .. }
            | InsufficientShares { .. }
            | InsufficientLiquidity { .. }
            | DepositBelowMinimum { .. }
            | DepositAboveMaximum { .. }
            | StrategyLimitReached { .. }
            | ModelInactive(_)
            | SourceUnavailable { .. }
            | NoEligibleSources { .. }
            | InvalidTransition { .. }
            | Overflow { .. } => ErrorClass::Invariant,

            CooldownActive { .. }
            | HarvestNotReady { .. }
            | BelowMinimumProfit { .. }
            | DeadlinePassed { .. }
            | AutoRebalanceDisabled(_)
            | EmergencyMode
            | StrategyUnavailable { .. }
            | EmergencyWithdrawDisabled(_) => ErrorClass::Eligibility,

            Unauthorized { .. } => ErrorClass::Authorization,
            Reentrant { .. } => ErrorClass::Concurrency,
            Venue { .. } | Custody(_) => ErrorClass::External,
        }
    }

    pub(crate) fn venue(source_id: &str, error: anyhow::Error) -> Self {
        RouterError::Venue {
            source_id: source_id.to_string(),
            error,
        }
    }

    pub(crate) fn range(field: &'static str, value: impl Into<u64>, min: u64, max: u64) -> Self {
        RouterError::OutOfRange {
            field,
            value: value.into(),
            min,
            max,
        }
    }
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
