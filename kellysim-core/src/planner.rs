//! Position planning — risk overlays on top of the Kelly fractions.
//!
//! The planner turns a tier's Kelly fraction into a dollar notional subject
//! to the per-trade cap and the total-exposure ceiling, and can produce a
//! full plan (correlation haircut, leverage, margin, stop-loss risk) for a
//! prospective trade.

use serde::{Deserialize, Serialize};

use crate::kelly::KellySizer;
use crate::tier::{ConfidenceTier, PerTier};

/// Risk limits applied by the planner. All values are fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerLimits {
    /// Maximum single position as a fraction of capital.
    pub max_position_pct: f64,
    /// Maximum total open exposure as a multiple of capital.
    pub max_total_exposure_pct: f64,
    /// Size reduction for trades correlated with open positions.
    pub correlation_reduction_pct: f64,
    /// Initial margin as a fraction of notional at 1x leverage.
    pub margin_requirement_pct: f64,
    /// Stop-loss distance as a fraction of entry.
    pub stop_loss_pct: f64,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 0.20,
            max_total_exposure_pct: 1.50,
            correlation_reduction_pct: 0.30,
            margin_requirement_pct: 0.05,
            stop_loss_pct: 0.02,
        }
    }
}

/// A prospective trade to plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub tier: ConfidenceTier,
    pub capital: f64,
    /// Notional already open across all positions.
    pub current_exposure: f64,
    pub correlated: bool,
    pub leverage: f64,
}

impl PositionRequest {
    pub fn new(tier: ConfidenceTier, capital: f64) -> Self {
        Self {
            tier,
            capital,
            current_exposure: 0.0,
            correlated: false,
            leverage: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ExposureLimitReached,
    InsufficientMargin,
    InvalidLeverage,
}

/// Outcome of planning a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionPlan {
    Allowed {
        tier: ConfidenceTier,
        base_kelly_size: f64,
        position_size: f64,
        margin_required: f64,
        leverage: f64,
        stop_loss_pct: f64,
        risk_amount: f64,
        risk_pct_of_capital: f64,
        correlation_adjusted: bool,
    },
    Rejected {
        tier: ConfidenceTier,
        reason: RejectReason,
        position_size: f64,
        margin_required: f64,
        leverage: f64,
    },
}

impl PositionPlan {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn position_size(&self) -> f64 {
        match self {
            Self::Allowed { position_size, .. } | Self::Rejected { position_size, .. } => {
                *position_size
            }
        }
    }
}

/// Expected deployment for one tier over a batch of trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub count: usize,
    pub share: f64,
    pub position_size: f64,
    pub capital_deployed: f64,
}

/// Deterministic projection of how capital is deployed across tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedAllocation {
    pub total_trades: usize,
    pub tiers: PerTier<TierAllocation>,
    pub avg_position_size: f64,
    pub total_capital_deployed: f64,
    /// Capital deployed / capital.
    pub turnover: f64,
}

/// Applies [`PlannerLimits`] to the sizes produced by a [`KellySizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPlanner {
    sizer: KellySizer,
    limits: PlannerLimits,
}

impl PositionPlanner {
    pub fn new(sizer: KellySizer, limits: PlannerLimits) -> Self {
        Self { sizer, limits }
    }

    pub fn sizer(&self) -> &KellySizer {
        &self.sizer
    }

    pub fn limits(&self) -> &PlannerLimits {
        &self.limits
    }

    /// Remaining notional before the total-exposure ceiling is hit.
    pub fn exposure_room(&self, capital: f64, current_exposure: f64) -> f64 {
        (capital * self.limits.max_total_exposure_pct - current_exposure).max(0.0)
    }

    /// Kelly notional on `base`, capped by the per-trade limit on `capital`
    /// and by the remaining exposure room.
    pub fn sized_notional(
        &self,
        tier: ConfidenceTier,
        base: f64,
        capital: f64,
        current_exposure: f64,
    ) -> f64 {
        if capital <= 0.0 {
            return 0.0;
        }
        self.sizer
            .position_size(tier, base)
            .min(capital * self.limits.max_position_pct)
            .min(self.exposure_room(capital, current_exposure))
    }

    /// Plan a trade with every overlay applied.
    pub fn plan(&self, request: &PositionRequest) -> PositionPlan {
        let tier = request.tier;
        let capital = request.capital;
        let leverage = request.leverage;

        let base_kelly_size = self
            .sizer
            .position_size(tier, capital)
            .min(capital.max(0.0) * self.limits.max_position_pct);
        let adjusted = if request.correlated {
            base_kelly_size * (1.0 - self.limits.correlation_reduction_pct)
        } else {
            base_kelly_size
        };

        if !leverage.is_finite() || leverage <= 0.0 {
            return PositionPlan::Rejected {
                tier,
                reason: RejectReason::InvalidLeverage,
                position_size: 0.0,
                margin_required: 0.0,
                leverage,
            };
        }

        let room = capital * self.limits.max_total_exposure_pct - request.current_exposure;
        if room <= 0.0 {
            return PositionPlan::Rejected {
                tier,
                reason: RejectReason::ExposureLimitReached,
                position_size: 0.0,
                margin_required: 0.0,
                leverage,
            };
        }

        let position_size = adjusted.min(room);
        let margin_required = position_size * self.limits.margin_requirement_pct / leverage;
        if margin_required > capital {
            return PositionPlan::Rejected {
                tier,
                reason: RejectReason::InsufficientMargin,
                position_size,
                margin_required,
                leverage,
            };
        }

        let risk_amount = position_size * self.limits.stop_loss_pct;
        let risk_pct_of_capital = if capital > 0.0 {
            risk_amount / capital
        } else {
            0.0
        };

        PositionPlan::Allowed {
            tier,
            base_kelly_size,
            position_size,
            margin_required,
            leverage,
            stop_loss_pct: self.limits.stop_loss_pct,
            risk_amount,
            risk_pct_of_capital,
            correlation_adjusted: request.correlated,
        }
    }

    /// Project per-tier trade counts and deployed capital over `num_trades`.
    ///
    /// Counts are floored for every tier but the last, which takes the
    /// remainder so the counts sum to `num_trades`.
    pub fn expected_allocation(
        &self,
        selection: &PerTier<f64>,
        capital: f64,
        num_trades: usize,
    ) -> ExpectedAllocation {
        let mut assigned = 0usize;
        let tiers = selection.map(|tier, &share| {
            let count = if tier == ConfidenceTier::Low {
                num_trades.saturating_sub(assigned)
            } else {
                let c = (num_trades as f64 * share).floor() as usize;
                assigned += c;
                c
            };
            let position_size = self
                .sizer
                .position_size(tier, capital)
                .min(capital.max(0.0) * self.limits.max_position_pct);
            TierAllocation {
                count,
                share,
                position_size,
                capital_deployed: count as f64 * position_size,
            }
        });

        let total_capital_deployed: f64 = tiers.iter().map(|(_, a)| a.capital_deployed).sum();
        let avg_position_size = if num_trades > 0 {
            total_capital_deployed / num_trades as f64
        } else {
            0.0
        };
        let turnover = if capital > 0.0 {
            total_capital_deployed / capital
        } else {
            0.0
        };

        ExpectedAllocation {
            total_trades: num_trades,
            tiers,
            avg_position_size,
            total_capital_deployed,
            turnover,
        }
    }
}
