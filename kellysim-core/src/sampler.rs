//! Synthetic trade sampling.
//!
//! One trade is three draws: a categorical tier draw from the selection
//! probabilities, a Bernoulli win/loss draw from that tier's win rate, and a
//! log-normal magnitude whose median is the tier's average win or loss.

use rand::distributions::{Bernoulli, Distribution, WeightedError, WeightedIndex};
use rand::rngs::StdRng;
use rand_distr::LogNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::{ModelError, TradeStatsModel};
use crate::tier::{ConfidenceTier, PerTier};

/// Default log-normal sigma for winning magnitudes.
pub const DEFAULT_WIN_SIGMA: f64 = 0.5;
/// Default log-normal sigma for losing magnitudes.
pub const DEFAULT_LOSS_SIGMA: f64 = 0.4;

/// A per-trade sampling failure. Aborts the run that hit it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("non-finite {side} magnitude {value} sampled for {tier} tier")]
    NonFinite {
        tier: ConfidenceTier,
        side: &'static str,
        value: f64,
    },
}

/// Unscaled outcome of one synthetic trade.
///
/// `magnitude` is unsigned and has not been scaled by position size or
/// reduced by costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledTrade {
    pub tier: ConfidenceTier,
    pub is_win: bool,
    pub magnitude: f64,
}

impl SampledTrade {
    /// Magnitude with the loss sign applied.
    pub fn signed_magnitude(&self) -> f64 {
        if self.is_win {
            self.magnitude
        } else {
            -self.magnitude
        }
    }
}

/// Source of synthetic trades for the equity simulator.
///
/// Implementations must be shareable across worker threads; all per-run
/// randomness comes from the `rng` argument.
pub trait OutcomeSampler: Send + Sync {
    /// Draw the confidence tier of the next trade.
    fn sample_tier(&self, rng: &mut StdRng) -> ConfidenceTier;

    /// Draw the win/loss flag and magnitude for a trade in `tier`.
    fn sample_outcome(
        &self,
        tier: ConfidenceTier,
        rng: &mut StdRng,
    ) -> Result<SampledTrade, SampleError>;
}

#[derive(Debug, Clone)]
struct TierDistributions {
    outcome: Bernoulli,
    win: LogNormal<f64>,
    loss: LogNormal<f64>,
}

/// Log-normal trade sampler built from the statistics model.
#[derive(Debug, Clone)]
pub struct TradeSampler {
    selection: WeightedIndex<f64>,
    tiers: PerTier<TierDistributions>,
    loss_cap: Option<f64>,
}

impl TradeSampler {
    /// Build the per-tier distributions.
    ///
    /// Fails when a selection weight, win rate or sigma cannot parameterize
    /// its distribution.
    pub fn new(
        stats: &TradeStatsModel,
        selection: &PerTier<f64>,
        win_sigma: f64,
        loss_sigma: f64,
    ) -> Result<Self, ModelError> {
        let weights = ConfidenceTier::ALL.map(|t| *selection.get(t));
        let selection = WeightedIndex::new(weights).map_err(|e| selection_error(selection, e))?;

        let tiers = stats.tiers().try_map(|tier, s| {
            let outcome = Bernoulli::new(s.win_rate).map_err(|e| ModelError::InvalidParameter {
                tier,
                field: "win_rate",
                reason: e.to_string(),
            })?;
            let win = log_normal(tier, "win_sigma", s.avg_win, win_sigma)?;
            let loss = log_normal(tier, "loss_sigma", s.avg_loss, loss_sigma)?;
            Ok(TierDistributions { outcome, win, loss })
        })?;

        Ok(Self {
            selection,
            tiers,
            loss_cap: None,
        })
    }

    /// Bound every loss magnitude at `cap`.
    pub fn with_loss_cap(mut self, cap: f64) -> Self {
        self.loss_cap = Some(cap);
        self
    }

    pub fn loss_cap(&self) -> Option<f64> {
        self.loss_cap
    }
}

impl OutcomeSampler for TradeSampler {
    fn sample_tier(&self, rng: &mut StdRng) -> ConfidenceTier {
        ConfidenceTier::ALL[self.selection.sample(rng)]
    }

    fn sample_outcome(
        &self,
        tier: ConfidenceTier,
        rng: &mut StdRng,
    ) -> Result<SampledTrade, SampleError> {
        let dists = self.tiers.get(tier);
        let is_win = dists.outcome.sample(rng);
        let (side, raw) = if is_win {
            ("win", dists.win.sample(rng))
        } else {
            ("loss", dists.loss.sample(rng))
        };

        if !raw.is_finite() {
            return Err(SampleError::NonFinite {
                tier,
                side,
                value: raw,
            });
        }

        let magnitude = match self.loss_cap {
            Some(cap) if !is_win => raw.min(cap),
            _ => raw,
        };

        Ok(SampledTrade {
            tier,
            is_win,
            magnitude,
        })
    }
}

/// Blame the first tier with an unusable weight, else the weights as a whole.
fn selection_error(selection: &PerTier<f64>, err: WeightedError) -> ModelError {
    match selection.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
        Some((tier, w)) => ModelError::InvalidParameter {
            tier,
            field: "selection_probability",
            reason: format!("{w} must be non-negative and finite"),
        },
        None => ModelError::InvalidSelection(err.to_string()),
    }
}

fn log_normal(
    tier: ConfidenceTier,
    field: &'static str,
    median: f64,
    sigma: f64,
) -> Result<LogNormal<f64>, ModelError> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(ModelError::InvalidParameter {
            tier,
            field,
            reason: format!("{sigma} must be non-negative and finite"),
        });
    }
    LogNormal::new(median.ln(), sigma).map_err(|e| ModelError::InvalidParameter {
        tier,
        field,
        reason: e.to_string(),
    })
}
