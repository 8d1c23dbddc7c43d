use serde::{Deserialize, Serialize};

use crate::engine::RingHistory;
use crate::model::amount::SECS_PER_YEAR;
use crate::model::{Amount, BPS_SCALE, PerformanceMetrics};

/// Per-harvest return series and share-price peak behind `PerformanceMetrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsTracker {
    /// Net return of each harvest period, bps of deposits.
    returns: RingHistory<i64>,
    peak_price: f64,
    max_drawdown: f64,
}

impl ReturnsTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            returns: RingHistory::new(capacity),
            peak_price: 0.0,
            max_drawdown: 0.0,
        }
    }

    /// Track share price (assets per share) for drawdown.
    pub fn record_price(&mut self, total_deposited: Amount, total_shares: Amount) {
        if total_shares == 0 {
            return;
        }
        let price = total_deposited as f64 / total_shares as f64;
        if price > self.peak_price {
            self.peak_price = price;
        }
        if self.peak_price > 0.0 {
            let drawdown = (self.peak_price - price) / self.peak_price;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    /// Fold one harvest into `metrics`.
    ///
    /// `base` is the deposit total the rewards accrued on, `elapsed` the
    /// seconds since the previous harvest.
    pub fn record_harvest(
        &mut self,
        metrics: &mut PerformanceMetrics,
        net: Amount,
        base: Amount,
        elapsed: u64,
        now: u64,
    ) {
        let period = if base == 0 {
            0
        } else {
            (net.saturating_mul(BPS_SCALE as Amount) / base).min(i64::MAX as Amount) as i64
        };
        self.returns.push(period);

        metrics.total_trades += 1;
        if net > 0 {
            metrics.profitable_trades += 1;
        }
        metrics.total_return = metrics.total_return.saturating_add(period);
        metrics.annualized_return = if elapsed == 0 {
            0
        } else {
            period.saturating_mul(SECS_PER_YEAR as i64) / elapsed as i64
        };
        metrics.win_rate = (metrics.profitable_trades * BPS_SCALE as u64 / metrics.total_trades) as u32;

        let (mean, std) = self.moments();
        metrics.volatility = std;
        metrics.sharpe_ratio = if std > 0.0 { mean / std } else { 0.0 };
        metrics.max_drawdown = (self.max_drawdown * BPS_SCALE as f64).round() as u32;
        metrics.last_update = now;
    }

    fn moments(&self) -> (f64, f64) {
        let n = self.returns.len();
        if n < 2 {
            let mean = self.returns.latest().copied().unwrap_or(0) as f64;
            return (mean, 0.0);
        }
        let values: Vec<f64> = self.returns.iter().map(|&r| r as f64).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        (mean, variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_and_total_return_accumulate() {
        let mut tracker = ReturnsTracker::new(10);
        let mut metrics = PerformanceMetrics::default();
        tracker.record_harvest(&mut metrics, 100, 10_000, 86_400, 1);
        tracker.record_harvest(&mut metrics, 0, 10_000, 86_400, 2);
        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.profitable_trades, 1);
        assert_eq!(metrics.win_rate, 5_000);
        assert_eq!(metrics.total_return, 100);
        assert!(metrics.volatility > 0.0);
        assert_eq!(metrics.last_update, 2);
    }

    #[test]
    fn drawdown_tracks_share_price_peak() {
        let mut tracker = ReturnsTracker::new(10);
        tracker.record_price(1_200, 1_000);
        tracker.record_price(900, 1_000);
        tracker.record_price(1_300, 1_000);
        let mut metrics = PerformanceMetrics::default();
        tracker.record_harvest(&mut metrics, 0, 1_000, 1, 1);
        assert_eq!(metrics.max_drawdown, 2_500);
    }
}
