//! Risk-filtered allocation recommendations, yield forecasts and a weighted
//! backtest estimate, driven by registered models and oracle market snapshots.

pub mod allocator;
pub mod backtest;
pub mod predict;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OptimizerConfig;
use crate::engine::RingHistory;
use crate::error::{Result, RouterError};
use crate::model::market::MarketBias;
use crate::model::optimization::NEUTRAL_ACCURACY;
use crate::model::{
    Amount, BPS_SCALE, BacktestEstimate, Bps, MarketCondition, MarketReport, ModelId,
    OptimizationModel, OptimizationResult, RiskProfile, SourceId, YieldPrediction, YieldSource,
};

pub use allocator::{AllocationStrategy, EqualWeight, RiskAdjustedYield};

/// Persistent optimizer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub models: BTreeMap<ModelId, OptimizationModel>,
    pub next_model_id: ModelId,
    pub active_model: Option<ModelId>,
    pub markets: RingHistory<MarketCondition>,
    pub predictions: BTreeMap<SourceId, RingHistory<YieldPrediction>>,
    pub profiles: BTreeMap<String, RiskProfile>,
    pub last_optimization: BTreeMap<String, u64>,
    pub results: BTreeMap<String, OptimizationResult>,
}

impl OptimizerState {
    pub fn new(market_history: usize) -> Self {
        Self {
            models: BTreeMap::new(),
            next_model_id: 1,
            active_model: None,
            markets: RingHistory::new(market_history),
            predictions: BTreeMap::new(),
            profiles: BTreeMap::new(),
            last_optimization: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }
}

pub struct OptimizationEngine {
    config: OptimizerConfig,
    state: OptimizerState,
    allocator: Box<dyn AllocationStrategy>,
}

impl OptimizationEngine {
    pub fn new(config: OptimizerConfig) -> Self {
        let state = OptimizerState::new(config.market_history);
        let allocator = config.allocator.strategy();
        Self {
            config,
            state,
            allocator,
        }
    }

    /// Swap in a custom allocation strategy.
    pub fn with_allocator(mut self, allocator: Box<dyn AllocationStrategy>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    pub fn restore(&mut self, state: OptimizerState) {
        self.state = state;
    }

    // ── Models ──────────────────────────────────────────────────────

    /// Register an inactive model at neutral accuracy. `keys` and `values`
    /// are parallel parameter arrays.
    pub fn register_model(
        &mut self,
        name: &str,
        version: &str,
        keys: Vec<String>,
        values: Vec<i64>,
    ) -> Result<ModelId> {
        if keys.len() != values.len() {
            return Err(RouterError::LengthMismatch {
                left: "parameter keys",
                left_len: keys.len(),
                right: "parameter values",
                right_len: values.len(),
            });
        }
        if name.trim().is_empty() {
            return Err(RouterError::InvalidInput("model name is empty".to_string()));
        }
        let id = self.state.next_model_id;
        let model = OptimizationModel {
            id,
            name: name.to_string(),
            version: version.to_string(),
            accuracy: NEUTRAL_ACCURACY,
            parameters: keys.into_iter().zip(values).collect(),
            active: false,
        };
        self.state.models.insert(id, model);
        self.state.next_model_id += 1;
        info!(model = id, name, version, "model registered");
        Ok(id)
    }

    /// Mark a model usable without selecting it.
    pub fn enable_model(&mut self, id: ModelId) -> Result<()> {
        self.model_mut(id)?.active = true;
        Ok(())
    }

    pub fn set_active_model(&mut self, id: ModelId) -> Result<()> {
        let model = self.state.models.get(&id).ok_or(RouterError::UnknownModel(id))?;
        if !model.active {
            return Err(RouterError::ModelInactive(id));
        }
        self.state.active_model = Some(id);
        info!(model = id, "active model selected");
        Ok(())
    }

    pub fn deactivate_model(&mut self, id: ModelId) -> Result<()> {
        self.model_mut(id)?.active = false;
        if self.state.active_model == Some(id) {
            self.state.active_model = None;
        }
        info!(model = id, "model deactivated");
        Ok(())
    }

    pub fn update_model_accuracy(&mut self, id: ModelId, accuracy: Bps) -> Result<()> {
        if accuracy > BPS_SCALE {
            return Err(RouterError::range("accuracy", accuracy, 0, BPS_SCALE as u64));
        }
        self.model_mut(id)?.accuracy = accuracy;
        debug!(model = id, accuracy_bps = accuracy, "model accuracy updated");
        Ok(())
    }

    pub fn model(&self, id: ModelId) -> Option<&OptimizationModel> {
        self.state.models.get(&id)
    }

    pub fn active_model(&self) -> Option<&OptimizationModel> {
        self.state.active_model.and_then(|id| self.state.models.get(&id))
    }

    fn model_mut(&mut self, id: ModelId) -> Result<&mut OptimizationModel> {
        self.state.models.get_mut(&id).ok_or(RouterError::UnknownModel(id))
    }

    /// Accuracy of the selected model, or neutral when none is selected.
    fn accuracy(&self) -> Bps {
        self.active_model().map(|m| m.accuracy).unwrap_or(NEUTRAL_ACCURACY)
    }

    // ── Market data ─────────────────────────────────────────────────

    pub fn record_market_condition(&mut self, report: &MarketReport, now: u64) -> Result<()> {
        let condition = MarketCondition::from_report(report, now)?;
        debug!(
            volatility = condition.volatility_index,
            sentiment = condition.risk_sentiment,
            phase = ?condition.phase,
            "market condition recorded"
        );
        self.state.markets.push(condition);
        Ok(())
    }

    pub fn latest_market(&self) -> Option<&MarketCondition> {
        self.state.markets.latest()
    }

    pub fn market_history(&self) -> Vec<MarketCondition> {
        self.state.markets.to_vec()
    }

    // ── Risk profiles ───────────────────────────────────────────────

    pub fn set_risk_profile(&mut self, user: &str, profile: RiskProfile) -> Result<()> {
        profile.validate()?;
        info!(user, tolerance = profile.risk_tolerance, "risk profile set");
        self.state.profiles.insert(user.to_string(), profile);
        Ok(())
    }

    /// The user's profile, or the configured default if they never set one.
    pub fn risk_profile(&self, user: &str) -> RiskProfile {
        self.state
            .profiles
            .get(user)
            .cloned()
            .unwrap_or_else(|| self.config.default_profile.clone())
    }

    // ── Optimization ────────────────────────────────────────────────

    /// Recommend an allocation of `amount` for `user` over the active sources
    /// their risk tolerance admits, then start the user's cooldown and cache
    /// the result.
    pub fn optimize(
        &mut self,
        user: &str,
        amount: Amount,
        sources: &[YieldSource],
        now: u64,
    ) -> Result<OptimizationResult> {
        let result = self.recommend(user, amount, sources, now)?;
        self.commit_result(user, result.clone());
        Ok(result)
    }

    /// Compute a recommendation without touching the cooldown or the cache.
    /// The cooldown is still checked.
    pub fn recommend(
        &self,
        user: &str,
        amount: Amount,
        sources: &[YieldSource],
        now: u64,
    ) -> Result<OptimizationResult> {
        if amount == 0 {
            return Err(RouterError::ZeroAmount);
        }
        if let Some(&last) = self.state.last_optimization.get(user) {
            let ready_at = last.saturating_add(self.config.cooldown_secs);
            if now < ready_at {
                return Err(RouterError::CooldownActive {
                    user: user.to_string(),
                    ready_at,
                });
            }
        }

        let profile = self.risk_profile(user);
        let eligible: Vec<&YieldSource> = sources
            .iter()
            .filter(|s| s.is_active() && s.risk_level <= profile.risk_tolerance)
            .collect();
        if eligible.is_empty() {
            return Err(RouterError::NoEligibleSources {
                tolerance: profile.risk_tolerance,
            });
        }

        let allocations = self.allocator.allocate(&eligible);
        let mut expected_apy: u64 = 0;
        let mut risk_score: u64 = 0;
        for (source, &alloc) in eligible.iter().zip(&allocations) {
            expected_apy += source.apy as u64 * alloc as u64 / BPS_SCALE as u64;
            risk_score += source.risk_level as u64 * 1_000 * alloc as u64 / BPS_SCALE as u64;
        }

        let market = self.state.markets.latest();
        let confidence = predict::optimization_confidence(self.accuracy(), market, &self.config);
        let rationale = rationale(market.map(|m| m.bias()), eligible.len(), self.allocator.name());

        let result = OptimizationResult {
            sources: eligible.iter().map(|s| s.id.clone()).collect(),
            allocations,
            amount,
            expected_apy: expected_apy as Bps,
            risk_score: risk_score as Bps,
            confidence,
            time_horizon_days: profile.time_horizon_days,
            rationale,
            timestamp: now,
        };
        info!(
            user,
            amount = %amount,
            sources = result.sources.len(),
            expected_apy_bps = result.expected_apy,
            confidence_bps = confidence,
            "optimization computed"
        );
        Ok(result)
    }

    /// Start `user`'s cooldown at the result's timestamp and cache it.
    pub fn commit_result(&mut self, user: &str, result: OptimizationResult) {
        self.state.last_optimization.insert(user.to_string(), result.timestamp);
        self.state.results.insert(user.to_string(), result);
    }

    pub fn last_result(&self, user: &str) -> Option<&OptimizationResult> {
        self.state.results.get(user)
    }

    // ── Prediction ──────────────────────────────────────────────────

    pub fn predict_yield(&mut self, source: &YieldSource, timeframe_days: u32, now: u64) -> Result<YieldPrediction> {
        if timeframe_days == 0 {
            return Err(RouterError::range("timeframe_days", timeframe_days, 1, u32::MAX as u64));
        }
        let market = self.state.markets.latest();
        let (predicted_apy, factors) = predict::predicted_apy(source, market);
        let confidence = predict::prediction_confidence(self.accuracy(), timeframe_days, market, &self.config);

        let prediction = YieldPrediction {
            source: source.id.clone(),
            predicted_apy,
            confidence,
            timeframe_days,
            risk_score: source.risk_level,
            factors,
            timestamp: now,
        };
        debug!(
            source = %source.id,
            predicted_apy_bps = predicted_apy,
            confidence_bps = confidence,
            timeframe_days,
            "yield predicted"
        );
        let capacity = self.config.prediction_history;
        self.state
            .predictions
            .entry(source.id.clone())
            .or_insert_with(|| RingHistory::new(capacity))
            .push(prediction.clone());
        Ok(prediction)
    }

    pub fn predictions(&self, source: &str) -> Vec<YieldPrediction> {
        self.state
            .predictions
            .get(source)
            .map(|r| r.to_vec())
            .unwrap_or_default()
    }

    // ── Backtest ────────────────────────────────────────────────────

    pub fn backtest(
        &self,
        registry: &[YieldSource],
        sources: &[SourceId],
        allocations: &[Bps],
        start: u64,
        end: u64,
        now: u64,
    ) -> Result<BacktestEstimate> {
        backtest::estimate(registry, sources, allocations, start, end, now)
    }
}

fn rationale(bias: Option<MarketBias>, count: usize, allocator: &str) -> String {
    let stance = match bias {
        Some(MarketBias::Bullish) => "bullish market, leaning into yield",
        Some(MarketBias::Bearish) => "bearish market, preserving capital",
        Some(MarketBias::Neutral) => "neutral market, balanced exposure",
        None => "no market data, balanced exposure",
    };
    format!("{stance} across {count} sources ({allocator})")
}
