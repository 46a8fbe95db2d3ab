//! Fractional Kelly sizing per confidence tier.
//!
//! Full Kelly: `f* = p - q / b` with `b = avg_win / avg_loss`. Each tier bets
//! a configured fraction of f*, capped at the maximum position fraction.
//! A negative edge sizes to zero.

use serde::{Deserialize, Serialize};

use crate::stats::TradeStatsModel;
use crate::tier::{ConfidenceTier, PerTier};

/// Full Kelly fraction for a win probability and average win/loss magnitudes.
///
/// Returns 0.0 when either magnitude is not positive.
pub fn full_kelly(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if avg_win <= 0.0 || avg_loss <= 0.0 {
        return 0.0;
    }
    let payoff = avg_win / avg_loss;
    win_rate - (1.0 - win_rate) / payoff
}

/// Static position-size fractions, computed once from the statistics model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellySizer {
    raw: PerTier<f64>,
    fractions: PerTier<f64>,
    max_position_pct: f64,
}

impl KellySizer {
    pub fn new(stats: &TradeStatsModel, multipliers: &PerTier<f64>, max_position_pct: f64) -> Self {
        let raw = stats
            .tiers()
            .map(|_, s| full_kelly(s.win_rate, s.avg_win, s.avg_loss));
        let fractions = raw.map(|tier, &kelly| {
            if kelly <= 0.0 {
                return 0.0;
            }
            (kelly * multipliers.get(tier)).clamp(0.0, max_position_pct)
        });
        Self {
            raw,
            fractions,
            max_position_pct,
        }
    }

    /// Fraction of capital to commit for a tier, in `[0, max_position_pct]`.
    pub fn fraction(&self, tier: ConfidenceTier) -> f64 {
        *self.fractions.get(tier)
    }

    /// Unscaled full Kelly for a tier (may be negative).
    pub fn raw_kelly(&self, tier: ConfidenceTier) -> f64 {
        *self.raw.get(tier)
    }

    pub fn fractions(&self) -> &PerTier<f64> {
        &self.fractions
    }

    pub fn max_position_pct(&self) -> f64 {
        self.max_position_pct
    }

    /// Position notional for a tier on the given capital base.
    pub fn position_size(&self, tier: ConfidenceTier, capital: f64) -> f64 {
        if capital <= 0.0 {
            return 0.0;
        }
        capital * self.fraction(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierParams;

    fn reference_sizer(max_position_pct: f64) -> KellySizer {
        let params = PerTier::<TierParams>::default();
        let stats = TradeStatsModel::new(&params).unwrap();
        let multipliers = params.map(|_, p| p.kelly_multiplier);
        KellySizer::new(&stats, &multipliers, max_position_pct)
    }

    #[test]
    fn full_kelly_matches_expectancy_form() {
        // p - q/b == (p*W - q*L) / W
        let (p, w, l) = (0.5405, 6.88, 1.57);
        let a = full_kelly(p, w, l);
        let b = (p * w - (1.0 - p) * l) / w;
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn high_tier_one_third_kelly_near_146_on_1000() {
        let sizer = reference_sizer(0.20);
        let high = sizer.fraction(ConfidenceTier::High);
        assert!((high - 0.146).abs() < 1e-3, "HIGH fraction {high}");
        let dollars = sizer.position_size(ConfidenceTier::High, 1_000.0);
        assert!((dollars - 146.0).abs() < 1.0, "HIGH size ${dollars}");
    }

    #[test]
    fn medium_and_low_scale_with_multiplier() {
        let sizer = reference_sizer(0.20);
        assert!((sizer.fraction(ConfidenceTier::Medium) - 0.110).abs() < 2e-3);
        assert!((sizer.fraction(ConfidenceTier::Low) - 0.055).abs() < 1e-3);
    }

    #[test]
    fn cap_applies_to_full_kelly() {
        let params = PerTier::<TierParams>::default();
        let stats = TradeStatsModel::new(&params).unwrap();
        let sizer = KellySizer::new(&stats, &PerTier::new(1.0, 1.0, 1.0), 0.20);
        for tier in ConfidenceTier::ALL {
            assert!(sizer.raw_kelly(tier) > 0.4);
            assert_eq!(sizer.fraction(tier), 0.20);
        }
    }

    #[test]
    fn negative_edge_sizes_to_zero() {
        let stats = TradeStatsModel::new(&PerTier::default())
            .unwrap()
            .with_win_rate_override(0.10)
            .unwrap();
        let sizer = KellySizer::new(&stats, &PerTier::new(1.0, 0.5, 0.25), 0.20);
        for tier in ConfidenceTier::ALL {
            assert!(sizer.raw_kelly(tier) < 0.0);
            assert_eq!(sizer.fraction(tier), 0.0);
            assert_eq!(sizer.position_size(tier, 1_000.0), 0.0);
        }
    }

    #[test]
    fn zero_capital_sizes_to_zero() {
        let sizer = reference_sizer(0.20);
        assert_eq!(sizer.position_size(ConfidenceTier::High, 0.0), 0.0);
    }
}
