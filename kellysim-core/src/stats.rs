//! Small-sample corrected win rates per confidence tier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tier::{ConfidenceTier, PerTier, TierParams};

/// Errors raised while building the model from a statistics snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("insufficient data for {tier} tier: no historical trades and no win-rate prior")]
    InsufficientData { tier: ConfidenceTier },
    #[error("invalid {field} for {tier} tier: {reason}")]
    InvalidParameter {
        tier: ConfidenceTier,
        field: &'static str,
        reason: String,
    },
    #[error("invalid win-rate override {0}: must lie in [0, 1]")]
    InvalidOverride(f64),
    #[error("invalid tier selection weights: {0}")]
    InvalidSelection(String),
}

/// Laplace rule of succession: `(wins + 1) / (total + 2)`.
pub fn laplace_win_rate(wins: u32, losses: u32) -> f64 {
    let total = wins as f64 + losses as f64;
    (wins as f64 + 1.0) / (total + 2.0)
}

/// Resolved statistics for a single tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub wins: u32,
    pub losses: u32,
    /// Laplace-adjusted (or prior / overridden) win probability.
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl TierStats {
    pub fn total_trades(&self) -> u64 {
        u64::from(self.wins) + u64::from(self.losses)
    }

    pub fn loss_rate(&self) -> f64 {
        1.0 - self.win_rate
    }

    /// Payoff ratio `avg_win / avg_loss`.
    pub fn payoff_ratio(&self) -> f64 {
        self.avg_win / self.avg_loss
    }

    /// Expected magnitude per trade: `p * avg_win - q * avg_loss`.
    pub fn expectancy(&self) -> f64 {
        self.win_rate * self.avg_win - self.loss_rate() * self.avg_loss
    }
}

/// Per-tier trade statistics, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStatsModel {
    tiers: PerTier<TierStats>,
}

impl TradeStatsModel {
    /// Build the model from a historical snapshot.
    ///
    /// Tiers with history get the Laplace-adjusted win rate. A tier with no
    /// history falls back to its `win_rate_prior`, and fails with
    /// [`ModelError::InsufficientData`] when none is configured.
    pub fn new(params: &PerTier<TierParams>) -> Result<Self, ModelError> {
        let tiers = params.try_map(resolve_tier)?;
        Ok(Self { tiers })
    }

    /// Replace every tier's win rate with `win_rate`.
    pub fn with_win_rate_override(mut self, win_rate: f64) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&win_rate) {
            return Err(ModelError::InvalidOverride(win_rate));
        }
        for tier in ConfidenceTier::ALL {
            self.tiers.get_mut(tier).win_rate = win_rate;
        }
        Ok(self)
    }

    pub fn tier(&self, tier: ConfidenceTier) -> &TierStats {
        self.tiers.get(tier)
    }

    pub fn tiers(&self) -> &PerTier<TierStats> {
        &self.tiers
    }

    pub fn win_rate(&self, tier: ConfidenceTier) -> f64 {
        self.tiers.get(tier).win_rate
    }

    pub fn avg_win(&self, tier: ConfidenceTier) -> f64 {
        self.tiers.get(tier).avg_win
    }

    pub fn avg_loss(&self, tier: ConfidenceTier) -> f64 {
        self.tiers.get(tier).avg_loss
    }
}

fn resolve_tier(tier: ConfidenceTier, p: &TierParams) -> Result<TierStats, ModelError> {
    check_magnitude(tier, "avg_win", p.avg_win)?;
    check_magnitude(tier, "avg_loss", p.avg_loss)?;

    let win_rate = if p.total_trades() > 0 {
        laplace_win_rate(p.wins, p.losses)
    } else {
        match p.win_rate_prior {
            Some(prior) if (0.0..=1.0).contains(&prior) => prior,
            Some(prior) => {
                return Err(ModelError::InvalidParameter {
                    tier,
                    field: "win_rate_prior",
                    reason: format!("{prior} is outside [0, 1]"),
                })
            }
            None => return Err(ModelError::InsufficientData { tier }),
        }
    };

    Ok(TierStats {
        wins: p.wins,
        losses: p.losses,
        win_rate,
        avg_win: p.avg_win,
        avg_loss: p.avg_loss,
    })
}

fn check_magnitude(tier: ConfidenceTier, field: &'static str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter {
            tier,
            field,
            reason: format!("{value} must be positive and finite"),
        })
    }
}
