//! Confidence tiers and per-tier parameter records.
//!
//! Tier behavior differs only by parameters, so a tier is a closed enum and
//! every per-tier quantity lives in a [`PerTier`] table indexed by it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal confidence tier attached to every trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// All tiers in selection order.
    pub const ALL: [ConfidenceTier; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Position of this tier in [`ConfidenceTier::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerTier<T> {
    pub high: T,
    pub medium: T,
    pub low: T,
}

impl<T> PerTier<T> {
    pub fn new(high: T, medium: T, low: T) -> Self {
        Self { high, medium, low }
    }

    pub fn get(&self, tier: ConfidenceTier) -> &T {
        match tier {
            ConfidenceTier::High => &self.high,
            ConfidenceTier::Medium => &self.medium,
            ConfidenceTier::Low => &self.low,
        }
    }

    pub fn get_mut(&mut self, tier: ConfidenceTier) -> &mut T {
        match tier {
            ConfidenceTier::High => &mut self.high,
            ConfidenceTier::Medium => &mut self.medium,
            ConfidenceTier::Low => &mut self.low,
        }
    }

    /// Iterate `(tier, value)` pairs in [`ConfidenceTier::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (ConfidenceTier, &T)> {
        ConfidenceTier::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(ConfidenceTier, &T) -> U) -> PerTier<U> {
        PerTier {
            high: f(ConfidenceTier::High, &self.high),
            medium: f(ConfidenceTier::Medium, &self.medium),
            low: f(ConfidenceTier::Low, &self.low),
        }
    }

    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(ConfidenceTier, &T) -> Result<U, E>,
    ) -> Result<PerTier<U>, E> {
        Ok(PerTier {
            high: f(ConfidenceTier::High, &self.high)?,
            medium: f(ConfidenceTier::Medium, &self.medium)?,
            low: f(ConfidenceTier::Low, &self.low)?,
        })
    }
}

/// Historical statistics and sizing parameters for one tier.
///
/// This is the externally supplied snapshot of the trade log: the engine
/// never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierParams {
    /// Historical winning trades.
    pub wins: u32,
    /// Historical losing trades.
    pub losses: u32,
    /// Average winning trade magnitude.
    pub avg_win: f64,
    /// Average losing trade magnitude (positive).
    pub avg_loss: f64,
    /// Win rate used when the tier has no history.
    #[serde(default)]
    pub win_rate_prior: Option<f64>,
    /// Fraction of full Kelly to bet (e.g. 1/3).
    pub kelly_multiplier: f64,
    /// Probability that a trade belongs to this tier.
    pub selection_probability: f64,
}

impl TierParams {
    /// Parameters from the 35-trade reference history (19 wins, 16 losses).
    ///
    /// All tiers share the pooled win/loss record; they differ in Kelly
    /// multiplier (1/3, 1/4, 1/8) and selection share (67/31/2 %).
    pub fn reported(tier: ConfidenceTier) -> Self {
        let (kelly_multiplier, selection_probability) = match tier {
            ConfidenceTier::High => (1.0 / 3.0, 0.67),
            ConfidenceTier::Medium => (0.25, 0.31),
            ConfidenceTier::Low => (0.125, 0.02),
        };
        Self {
            wins: 19,
            losses: 16,
            avg_win: 6.88,
            avg_loss: 1.57,
            win_rate_prior: None,
            kelly_multiplier,
            selection_probability,
        }
    }

    pub fn total_trades(&self) -> u64 {
        u64::from(self.wins) + u64::from(self.losses)
    }
}

impl Default for PerTier<TierParams> {
    fn default() -> Self {
        PerTier {
            high: TierParams::reported(ConfidenceTier::High),
            medium: TierParams::reported(ConfidenceTier::Medium),
            low: TierParams::reported(ConfidenceTier::Low),
        }
    }
}
