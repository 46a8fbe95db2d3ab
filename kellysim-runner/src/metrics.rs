//! Run metrics — pure functions over an equity curve.
//!
//! The simulator tracks drawdown and streaks incrementally; the functions here
//! cover what needs the whole curve (Sharpe) and the summary statistics shared
//! with aggregation.

/// Trades per year used to annualize per-trade Sharpe.
pub const TRADES_PER_YEAR: f64 = 365.0;

// ─── Individual metric functions ────────────────────────────────────

/// Annualized Sharpe ratio from per-trade returns.
///
/// Sharpe = mean(trade returns) / std(trade returns) * sqrt(periods_per_year).
/// Returns 0.0 if variance is zero or fewer than 2 trades.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = trade_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Profit factor: gross profit / gross loss. `None` when there are no losses.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> Option<f64> {
    if gross_loss < 1e-10 {
        None
    } else {
        Some(gross_profit / gross_loss)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-trade returns from an equity curve.
pub fn trade_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Percentile of a sorted slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
