pub mod amount;
pub mod harvest;
pub mod market;
pub mod optimization;
pub mod policy;
pub mod position;
pub mod risk;
pub mod source;
pub mod strategy;

pub use amount::{Amount, Bps, BPS_SCALE};
pub use harvest::HarvestRecord;
pub use market::{MarketCondition, MarketPhase, MarketReport};
pub use optimization::{BacktestEstimate, ModelId, OptimizationModel, OptimizationResult, YieldPrediction};
pub use policy::AllocationPolicy;
pub use position::LedgerPosition;
pub use risk::RiskProfile;
pub use source::{SourceId, SourceSpec, SourceStatus, YieldSource};
pub use strategy::{
    PerformanceMetrics, RebalanceParams, Strategy, StrategyConfig, StrategyId, StrategySpec,
    StrategyStatus, StrategyType, UserStake,
};
