use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};

/// Wyckoff-style market cycle phase, encoded 1–4 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    Accumulation = 1,
    Markup = 2,
    Distribution = 3,
    Markdown = 4,
}

impl TryFrom<u8> for MarketPhase {
    type Error = RouterError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MarketPhase::Accumulation),
            2 => Ok(MarketPhase::Markup),
            3 => Ok(MarketPhase::Distribution),
            4 => Ok(MarketPhase::Markdown),
            other => Err(RouterError::range("market_phase", other, 1, 4)),
        }
    }
}

/// Directional read of the market, derived from the bullish/bearish flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Raw oracle snapshot before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarketReport {
    /// 0–100.
    pub volatility_index: u8,
    /// 0–100.
    pub liquidity_index: u8,
    /// Risk appetite, 0–100.
    pub risk_sentiment: u8,
    /// Long minus short yields, bps.
    pub yield_curve_slope: i32,
    /// 0–100.
    pub correlation_index: u8,
    pub bullish: bool,
    pub bearish: bool,
    /// 1=accumulation, 2=markup, 3=distribution, 4=markdown.
    pub market_phase: u8,
}

/// A validated market snapshot as stored in the history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarketCondition {
    pub volatility_index: u8,
    pub liquidity_index: u8,
    pub risk_sentiment: u8,
    pub yield_curve_slope: i32,
    pub correlation_index: u8,
    pub bullish: bool,
    pub bearish: bool,
    pub phase: MarketPhase,
    pub timestamp: u64,
}

impl MarketCondition {
    pub fn from_report(report: &MarketReport, timestamp: u64) -> Result<Self> {
        for (field, value) in [
            ("volatility_index", report.volatility_index),
            ("liquidity_index", report.liquidity_index),
            ("risk_sentiment", report.risk_sentiment),
            ("correlation_index", report.correlation_index),
        ] {
            if value > 100 {
                return Err(RouterError::range(field, value, 0, 100));
            }
        }
        Ok(Self {
            volatility_index: report.volatility_index,
            liquidity_index: report.liquidity_index,
            risk_sentiment: report.risk_sentiment,
            yield_curve_slope: report.yield_curve_slope,
            correlation_index: report.correlation_index,
            bullish: report.bullish,
            bearish: report.bearish,
            phase: MarketPhase::try_from(report.market_phase)?,
            timestamp,
        })
    }

    /// Both flags set reads as neutral.
    pub fn bias(&self) -> MarketBias {
        match (self.bullish, self.bearish) {
            (true, false) => MarketBias::Bullish,
            (false, true) => MarketBias::Bearish,
            _ => MarketBias::Neutral,
        }
    }
}
