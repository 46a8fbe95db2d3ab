//! Distribution statistics over a batch of run summaries.
//!
//! Aggregation is a pure function of the stored summaries: re-aggregating the
//! same batch yields an identical result without re-simulating.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean_f64, percentile_sorted, std_dev};
use crate::simulator::{RunFailure, SimulationSummary};

/// Percentile table at the reported levels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentileTable {
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl PercentileTable {
    /// Build from an ascending slice.
    pub fn from_sorted(sorted: &[f64]) -> Self {
        let p = |level| percentile_sorted(sorted, level);
        Self {
            p1: p(1.0),
            p5: p(5.0),
            p10: p(10.0),
            p25: p(25.0),
            p50: p(50.0),
            p75: p(75.0),
            p90: p(90.0),
            p95: p(95.0),
            p99: p(99.0),
        }
    }

    /// Values in ascending level order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.p1, self.p5, self.p10, self.p25, self.p50, self.p75, self.p90, self.p95, self.p99,
        ]
    }

    pub fn is_monotonic(&self) -> bool {
        self.values().windows(2).all(|w| w[0] <= w[1])
    }
}

/// Location and spread of one metric across runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: PercentileTable,
}

impl DistributionStats {
    /// All zeros for an empty input.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let percentiles = PercentileTable::from_sorted(&sorted);
        Self {
            count: sorted.len(),
            mean: mean_f64(&sorted),
            median: percentiles.p50,
            std: std_dev(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            percentiles,
        }
    }
}

/// Equity curve kept from a sampled run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCurve {
    pub run_index: usize,
    pub equity_curve: Vec<f64>,
}

/// Everything a batch produced, in run-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunBatch {
    pub runs_requested: usize,
    pub summaries: Vec<SimulationSummary>,
    pub failures: Vec<RunFailure>,
    pub sample_curves: Vec<SampleCurve>,
}

/// Batch-level statistics. Computed once, read-only thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub runs_halted: usize,
    pub runs_failed: usize,

    pub final_capital: DistributionStats,
    pub total_pnl: DistributionStats,
    pub roi: DistributionStats,
    pub max_drawdown: DistributionStats,
    pub max_drawdown_abs: DistributionStats,
    pub max_loss_streak: DistributionStats,
    pub win_rate: DistributionStats,
    pub sharpe_ratio: DistributionStats,
    /// Over runs with at least one loss.
    pub profit_factor: DistributionStats,

    /// Fraction of summaries with positive total PnL.
    pub probability_of_profit: f64,
    /// Fraction of summaries that halted on the ruin floor.
    pub probability_of_ruin: f64,

    pub sample_curves: Vec<SampleCurve>,
}

impl AggregateResult {
    /// Aggregate the successful runs of a batch; failures are only counted.
    pub fn from_batch(batch: &RunBatch) -> Self {
        let mut result = Self::from_summaries(&batch.summaries);
        result.runs_requested = batch.runs_requested;
        result.runs_failed = batch.failures.len();
        result.sample_curves = batch.sample_curves.clone();
        result
    }

    /// Aggregate a set of stored summaries.
    pub fn from_summaries(summaries: &[SimulationSummary]) -> Self {
        let n = summaries.len();
        let collect = |f: fn(&SimulationSummary) -> f64| -> Vec<f64> {
            summaries.iter().map(f).collect()
        };

        let runs_halted = summaries.iter().filter(|s| s.ruined()).count();
        let profitable = summaries.iter().filter(|s| s.profitable()).count();
        let fraction = |count: usize| if n > 0 { count as f64 / n as f64 } else { 0.0 };

        let profit_factors: Vec<f64> = summaries.iter().filter_map(|s| s.profit_factor).collect();

        Self {
            runs_requested: n,
            runs_completed: n,
            runs_halted,
            runs_failed: 0,
            final_capital: DistributionStats::from_values(&collect(|s| s.final_capital)),
            total_pnl: DistributionStats::from_values(&collect(|s| s.total_pnl)),
            roi: DistributionStats::from_values(&collect(|s| s.roi)),
            max_drawdown: DistributionStats::from_values(&collect(|s| s.max_drawdown)),
            max_drawdown_abs: DistributionStats::from_values(&collect(|s| s.max_drawdown_abs)),
            max_loss_streak: DistributionStats::from_values(&collect(|s| s.max_loss_streak as f64)),
            win_rate: DistributionStats::from_values(&collect(|s| s.win_rate)),
            sharpe_ratio: DistributionStats::from_values(&collect(|s| s.sharpe_ratio)),
            profit_factor: DistributionStats::from_values(&profit_factors),
            probability_of_profit: fraction(profitable),
            probability_of_ruin: fraction(runs_halted),
            sample_curves: Vec::new(),
        }
    }
}
