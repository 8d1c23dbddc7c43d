use crate::config::RouterConfig;
use crate::model::{MarketReport, RiskProfile, SourceSpec, StrategyConfig, StrategySpec, StrategyType};
use crate::simulate::scenario::{Depositor, KeeperSchedule, Scenario, SimSource, SimStrategy};

/// One USDC in base units.
const USDC: u128 = 1_000_000;

fn source(id: &str, target: u32, apy: u32, risk: u8, jitter: u32, slippage: u32) -> SimSource {
    SimSource {
        spec: SourceSpec {
            id: id.into(),
            token: "USDC".into(),
            target_allocation: target,
            min_allocation: 0,
            max_allocation: 6_000,
            apy,
            risk_level: risk,
        },
        apy_jitter: jitter,
        withdraw_slippage: slippage,
    }
}

pub fn example_scenario() -> Scenario {
    Scenario {
        name: "Three-venue USDC router".to_string(),
        description: Some(
            "Pool USDC across a lending market, a curated vault and an LP venue at 40/35/25, \
             harvest daily with a 10% performance fee and rebalance on 5% drift. \
             A single-asset strategy compounds on top of the lending venue."
                .to_string(),
        ),
        config: RouterConfig::default(),
        sources: vec![
            source("aave-usdc", 4_000, 450, 2, 20, 0),
            source("morpho-usdc", 3_500, 650, 4, 40, 5),
            source("aerodrome-usdc", 2_500, 1_400, 7, 150, 30),
        ],
        depositors: vec![
            Depositor {
                user: "alice".into(),
                amount: 250_000 * USDC,
                risk_profile: Some(RiskProfile {
                    risk_tolerance: 8,
                    ..RiskProfile::default()
                }),
            },
            Depositor {
                user: "bob".into(),
                amount: 100_000 * USDC,
                risk_profile: None,
            },
        ],
        strategies: vec![SimStrategy {
            spec: StrategySpec {
                name: "USDC lending compounder".into(),
                description: "Auto-compounding single-asset lending".into(),
                strategy_type: StrategyType::SingleAsset,
                input_tokens: vec!["USDC".into()],
                output_tokens: vec!["USDC".into()],
                venues: vec!["aave-usdc".into()],
                min_deposit: 100 * USDC,
                max_deposit: 5_000_000 * USDC,
                harvest_interval: 86_400,
                performance_fee: 1_000,
                management_fee: 200,
                risk_level: 2,
                expected_apy: 500,
            },
            config: Some(StrategyConfig {
                deposit_fee: 10,
                ..StrategyConfig::default()
            }),
            deposits: vec![Depositor {
                user: "carol".into(),
                amount: 50_000 * USDC,
                risk_profile: None,
            }],
        }],
        market: Some(MarketReport {
            volatility_index: 45,
            liquidity_index: 70,
            risk_sentiment: 55,
            yield_curve_slope: 120,
            correlation_index: 40,
            bullish: true,
            bearish: false,
            market_phase: 2,
        }),
        rewards_reserve: 100_000 * USDC,
        keeper: KeeperSchedule::default(),
    }
}

/// Print an example scenario JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&example_scenario())?;
    println!("{json}");
    Ok(())
}
