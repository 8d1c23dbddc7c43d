use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub label: String,
    pub initial_tvl: f64,
    pub final_tvl: f64,
    pub share_price: f64,
    pub return_pct: f64,
    pub annualized_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
    pub harvested: f64,
    pub fees: f64,
    pub rebalances: u64,
    pub strategy_harvests: u64,
    pub failed_harvests: u64,
    pub ticks: usize,
}

impl SimulationResult {
    pub fn print_table(results: &[Self]) {
        println!("\n{}", "═".repeat(118));
        println!("  Simulation Results");
        println!("{}", "═".repeat(118));
        println!(
            "  {:<28} {:>12} {:>12} {:>8} {:>7} {:>7} {:>7} {:>7} {:>10} {:>9} {:>6}",
            "Scenario",
            "TVL start",
            "TVL end",
            "Price",
            "Ret%",
            "Ann.%",
            "MxDD%",
            "Sharpe",
            "Harvested",
            "Fees",
            "Rebal",
        );
        println!("  {}", "-".repeat(112));
        for r in results {
            println!(
                "  {:<28} {:>12.0} {:>12.0} {:>8.4} {:>+7.2} {:>+7.2} {:>7.2} {:>7.3} {:>10.0} {:>9.0} {:>6}",
                r.label,
                r.initial_tvl,
                r.final_tvl,
                r.share_price,
                r.return_pct,
                r.annualized_pct,
                r.max_drawdown_pct,
                r.sharpe,
                r.harvested,
                r.fees,
                r.rebalances,
            );
        }
        println!("{}", "═".repeat(118));
        if let Some(r) = results.first() {
            println!(
                "  {} ticks, {} strategy harvests, {} failed source harvests",
                r.ticks, r.strategy_harvests, r.failed_harvests
            );
        }
    }
}

/// Share-price series collector: drawdown from peak and a Sharpe ratio over
/// per-tick returns, annualized by `periods_per_year`.
pub struct PriceMetrics {
    periods_per_year: f64,
    peak: f64,
    max_drawdown: f64,
    history: Vec<f64>,
}

impl PriceMetrics {
    pub fn new(initial_price: f64, periods_per_year: f64) -> Self {
        Self {
            periods_per_year,
            peak: initial_price,
            max_drawdown: 0.0,
            history: vec![initial_price],
        }
    }

    pub fn record_tick(&mut self, price: f64) {
        if price > self.peak {
            self.peak = price;
        }
        if self.peak > 0.0 {
            let drawdown = (self.peak - price) / self.peak;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.history.push(price);
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Total return over the series and its annualized equivalent.
    pub fn returns(&self) -> (f64, f64) {
        let first = self.history.first().copied().unwrap_or(1.0);
        let last = self.history.last().copied().unwrap_or(first);
        if first <= 0.0 {
            return (0.0, 0.0);
        }
        let total = last / first - 1.0;
        let periods = (self.history.len() - 1) as f64;
        let annualized = if periods > 0.0 {
            (1.0 + total).powf(self.periods_per_year / periods) - 1.0
        } else {
            0.0
        };
        (total, annualized)
    }

    pub fn sharpe(&self) -> f64 {
        let returns: Vec<f64> = self
            .history
            .windows(2)
            .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        let std = var.sqrt();
        if std > 0.0 {
            mean / std * self.periods_per_year.sqrt()
        } else {
            0.0
        }
    }

    pub fn ticks(&self) -> usize {
        self.history.len()
    }
}
