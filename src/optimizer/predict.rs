use crate::config::OptimizerConfig;
use crate::model::amount::scale_bps;
use crate::model::{BPS_SCALE, Bps, MarketCondition, MarketPhase, YieldSource};

// Multipliers in bps of the base value.
const MARKUP_BOOST: Bps = 11_000;
const MARKDOWN_PENALTY: Bps = 9_000;
const APPETITE_MATCH: Bps = 10_500;
const APPETITE_MISMATCH: Bps = 9_500;

const LONG_HORIZON_DAYS: u32 = 30;
const MEDIUM_HORIZON_DAYS: u32 = 7;
const LONG_HORIZON_DECAY: Bps = 7_000;
const MEDIUM_HORIZON_DECAY: Bps = 8_500;
const VOLATILE_DECAY: Bps = 8_000;
const CALM_BOOST: Bps = 11_000;

const HIGH_SENTIMENT: u8 = 70;
const LOW_SENTIMENT: u8 = 30;
const HIGH_RISK_SOURCE: u8 = 7;
const LOW_RISK_SOURCE: u8 = 3;

/// Predicted APY for `source` under `market`, with the factors that moved it.
///
/// Phase scales the base APY up in markup and down in markdown. Risk appetite
/// earns a boost only when it matches the source: high sentiment with a risky
/// source, or low sentiment with a safe one. The opposite pairing is penalized.
pub fn predicted_apy(source: &YieldSource, market: Option<&MarketCondition>) -> (Bps, Vec<String>) {
    let mut apy = source.apy;
    let mut factors = vec![format!("base apy {} bps", source.apy)];
    let Some(market) = market else {
        factors.push("no market data".to_string());
        return (apy, factors);
    };

    match market.phase {
        MarketPhase::Markup => {
            apy = scale_bps(apy, MARKUP_BOOST);
            factors.push("markup phase".to_string());
        }
        MarketPhase::Markdown => {
            apy = scale_bps(apy, MARKDOWN_PENALTY);
            factors.push("markdown phase".to_string());
        }
        MarketPhase::Accumulation | MarketPhase::Distribution => {}
    }

    let sentiment = market.risk_sentiment;
    let risk = source.risk_level;
    let greedy = sentiment > HIGH_SENTIMENT;
    let fearful = sentiment < LOW_SENTIMENT;
    if (greedy && risk >= HIGH_RISK_SOURCE) || (fearful && risk <= LOW_RISK_SOURCE) {
        apy = scale_bps(apy, APPETITE_MATCH);
        factors.push("risk appetite matches source".to_string());
    } else if (greedy && risk <= LOW_RISK_SOURCE) || (fearful && risk >= HIGH_RISK_SOURCE) {
        apy = scale_bps(apy, APPETITE_MISMATCH);
        factors.push("risk appetite opposes source".to_string());
    }
    (apy, factors)
}

/// Model accuracy degraded by horizon and volatility, floored at the configured minimum.
pub fn prediction_confidence(
    accuracy: Bps,
    timeframe_days: u32,
    market: Option<&MarketCondition>,
    config: &OptimizerConfig,
) -> Bps {
    let mut confidence = accuracy;
    if timeframe_days > LONG_HORIZON_DAYS {
        confidence = scale_bps(confidence, LONG_HORIZON_DECAY);
    } else if timeframe_days > MEDIUM_HORIZON_DAYS {
        confidence = scale_bps(confidence, MEDIUM_HORIZON_DECAY);
    }
    if market.is_some_and(|m| m.volatility_index >= config.high_volatility) {
        confidence = scale_bps(confidence, VOLATILE_DECAY);
    }
    confidence.max(config.min_confidence).min(BPS_SCALE)
}

/// Optimization confidence: volatile markets scale accuracy down, calm ones up.
pub fn optimization_confidence(accuracy: Bps, market: Option<&MarketCondition>, config: &OptimizerConfig) -> Bps {
    let confidence = match market {
        Some(m) if m.volatility_index >= config.high_volatility => scale_bps(accuracy, VOLATILE_DECAY),
        Some(m) if m.volatility_index <= config.low_volatility => scale_bps(accuracy, CALM_BOOST),
        _ => accuracy,
    };
    confidence.min(BPS_SCALE)
}
