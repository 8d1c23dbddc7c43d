pub mod result;
pub mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::access::{Caller, Role};
use crate::engine::{ManualClock, SimClock};
use crate::error::ErrorClass;
use crate::model::StrategyId;
use crate::router::YieldRouter;
use crate::validate;
use crate::venues::{InMemoryCustody, SimulatedVenue};

use result::{PriceMetrics, SimulationResult};
use scenario::Scenario;

/// 2024-01-01T00:00:00Z.
const SIM_START: u64 = 1_704_067_200;

/// Configuration for a simulation run.
pub struct SimulateConfig {
    pub scenario_path: PathBuf,
    pub days: u64,
    pub step_hours: u64,
    pub seed: u64,
    pub state_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Run a simulation from the CLI.
pub fn run(config: &SimulateConfig) -> Result<()> {
    let result = run_simulation(config)?;
    SimulationResult::print_table(&[result]);
    Ok(())
}

pub fn run_simulation(config: &SimulateConfig) -> Result<SimulationResult> {
    let scenario = validate::load_and_validate(&config.scenario_path).map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("Scenario validation failed:\n  {}", msgs.join("\n  "))
    })?;
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(execute(&scenario, config))
}

/// Keeper identity used by the simulation; holds every capability.
fn operator() -> Caller {
    Caller::with_roles("operator", [Role::Admin, Role::Keeper, Role::Oracle])
}

pub async fn execute(scenario: &Scenario, config: &SimulateConfig) -> Result<SimulationResult> {
    let step = config.step_hours.max(1) * 3_600;
    let mut clock = SimClock::uniform(SIM_START, SIM_START + config.days * 86_400, step);
    let manual = Arc::new(ManualClock::new(SIM_START));
    let custody = Arc::new(InMemoryCustody::new());
    let router = YieldRouter::new(scenario.config.clone(), custody.clone(), manual.clone());
    let operator = operator();
    let asset = scenario.config.ledger.asset.clone();

    // 1. Sources
    for (i, source) in scenario.sources.iter().enumerate() {
        let venue = SimulatedVenue::new(
            &source.spec.id,
            &scenario.config.ledger.account,
            &asset,
            custody.clone(),
            source.spec.apy,
        )
        .with_jitter(source.apy_jitter, config.seed.wrapping_add(i as u64))
        .with_withdraw_slippage(source.withdraw_slippage);
        router
            .add_source(&operator, source.spec.clone(), Box::new(venue))
            .await
            .with_context(|| format!("registering source `{}`", source.spec.id))?;
    }
    if let Some(report) = &scenario.market {
        router.record_market_condition(&operator, report).await?;
    }

    // 2. Depositors
    for depositor in &scenario.depositors {
        let caller = Caller::user(&depositor.user);
        if let Some(profile) = &depositor.risk_profile {
            router.set_risk_profile(&caller, &depositor.user, profile.clone()).await?;
        }
        custody.mint(&depositor.user, &asset, depositor.amount);
        router
            .deposit(&caller, depositor.amount)
            .await
            .with_context(|| format!("deposit for `{}`", depositor.user))?;
    }

    // 3. Strategies
    let strategy_asset = scenario.config.strategies.asset.clone();
    custody.mint(&scenario.config.strategies.rewards_account, &strategy_asset, scenario.rewards_reserve);
    let mut strategy_ids: Vec<StrategyId> = Vec::new();
    for strategy in &scenario.strategies {
        let id = router.create_strategy(&operator, strategy.spec.clone()).await?;
        if let Some(cfg) = &strategy.config {
            router.update_strategy_config(&operator, id, cfg.clone()).await?;
        }
        router
            .set_strategy_status(&operator, id, crate::model::StrategyStatus::Active)
            .await?;
        for deposit in &strategy.deposits {
            custody.mint(&deposit.user, &strategy_asset, deposit.amount);
            router
                .strategy_deposit(&Caller::user(&deposit.user), id, deposit.amount)
                .await
                .with_context(|| format!("strategy `{}` deposit for `{}`", strategy.spec.name, deposit.user))?;
        }
        strategy_ids.push(id);
    }

    let initial_tvl = router.totals().await.total_assets as f64;
    let periods_per_year = 365.0 * 86_400.0 / step as f64;
    let mut metrics = PriceMetrics::new(router.share_price().await, periods_per_year);
    if config.verbose {
        println!("[start] TVL = {initial_tvl:.0}, {} sources", scenario.sources.len());
    }

    // 4. Keeper loop
    let harvest_every = scenario.keeper.harvest_every_hours.max(1) * 3_600;
    let rebalance_every = scenario.keeper.rebalance_every_hours.max(1) * 3_600;
    let mut last_harvest = SIM_START;
    let mut last_rebalance = SIM_START;
    let mut harvested: u128 = 0;
    let mut fees: u128 = 0;
    let mut failed_harvests = 0u64;
    let mut strategy_harvests = 0u64;

    while clock.advance() {
        let now = clock.current_timestamp();
        manual.set(now);
        router.tick_venues(&operator, clock.dt_seconds()).await?;

        if now - last_harvest >= harvest_every {
            last_harvest = now;
            let report = router.harvest_all(&operator).await?;
            harvested += report.harvested;
            fees += report.fees;
            failed_harvests += report.records.iter().filter(|r| !r.success).count() as u64;

            for &id in &strategy_ids {
                match router.harvest_strategy(&operator, id).await {
                    Ok(record) => {
                        strategy_harvests += 1;
                        harvested += record.harvested;
                        fees += record.harvested - record.profit;
                    }
                    Err(err) if err.class() == ErrorClass::Eligibility => {
                        debug!(strategy = id, error = %err, "strategy harvest skipped");
                    }
                    Err(err) => return Err(err).context("strategy harvest"),
                }
            }
        }

        if now - last_rebalance >= rebalance_every {
            last_rebalance = now;
            if scenario.keeper.optimize {
                let tvl = router.totals().await.total_assets;
                if let Err(err) = router.optimize_and_apply(&operator, tvl).await {
                    warn!(error = %err, "optimization skipped");
                }
            }
            let moves = router.rebalance(&operator).await?;
            if config.verbose && !moves.is_empty() {
                println!("[tick {}] rebalanced {} sources", clock.tick_index(), moves.moves.len());
            }
        }

        let price = router.share_price().await;
        metrics.record_tick(price);
        if config.verbose {
            let totals = router.totals().await;
            println!(
                "[tick {}] TVL = {}, idle = {}, price = {price:.6}",
                clock.tick_index(),
                totals.total_assets,
                totals.idle
            );
        }
    }

    if !router.is_conserved().await {
        warn!("ledger conservation check failed at end of simulation");
    }
    if let Some(path) = &config.state_file {
        router.snapshot().await.save(path)?;
        println!("State saved to {}", path.display());
    }

    let final_tvl = router.totals().await.total_assets as f64;
    let (total, annualized) = metrics.returns();
    Ok(SimulationResult {
        label: scenario.name.clone(),
        initial_tvl,
        final_tvl,
        share_price: router.share_price().await,
        return_pct: total * 100.0,
        annualized_pct: annualized * 100.0,
        max_drawdown_pct: metrics.max_drawdown() * 100.0,
        sharpe: metrics.sharpe(),
        harvested: harvested as f64,
        fees: fees as f64,
        rebalances: router.snapshot().await.ledger.rebalances,
        strategy_harvests,
        failed_harvests,
        ticks: metrics.ticks(),
    })
}
