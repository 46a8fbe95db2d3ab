//! Slippage and commission deductions on a trade's notional.
//!
//! Slippage is charged once on entry as a fraction of position notional.
//! Commission is a per-side fraction of notional, charged on both sides.

use serde::{Deserialize, Serialize};

/// Execution friction as fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage as a fraction of notional (0.005 = 0.5%).
    pub slippage_pct: f64,
    /// Commission per side as a fraction of notional.
    pub commission_pct: f64,
}

/// Gross-to-net decomposition of a single trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub gross_pnl: f64,
    pub slippage: f64,
    pub commission: f64,
    pub net_pnl: f64,
}

impl CostBreakdown {
    pub fn total_cost(&self) -> f64 {
        self.slippage + self.commission
    }
}

impl CostModel {
    pub fn new(slippage_pct: f64, commission_pct: f64) -> Self {
        Self {
            slippage_pct,
            commission_pct,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn slippage_cost(&self, notional: f64) -> f64 {
        notional.abs() * self.slippage_pct
    }

    /// Round-trip commission: both sides at `commission_pct`.
    pub fn commission_cost(&self, notional: f64) -> f64 {
        notional.abs() * self.commission_pct * 2.0
    }

    /// Total friction per unit of notional.
    pub fn round_trip_rate(&self) -> f64 {
        self.slippage_pct + 2.0 * self.commission_pct
    }

    /// Net PnL = gross − slippage − commission.
    pub fn apply(&self, gross_pnl: f64, notional: f64) -> CostBreakdown {
        let slippage = self.slippage_cost(notional);
        let commission = self.commission_cost(notional);
        CostBreakdown {
            gross_pnl,
            slippage,
            commission,
            net_pnl: gross_pnl - slippage - commission,
        }
    }
}
