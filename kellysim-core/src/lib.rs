//! KellySim Core — trade statistics, Kelly sizing, costs, sampling, planning.
//!
//! This crate holds the pure model of the sizing system:
//! - Confidence tiers and per-tier parameter tables
//! - Laplace-adjusted win rates from a small historical sample
//! - Fractional Kelly position fractions with a hard cap
//! - Slippage and commission deductions
//! - Log-normal synthetic trade sampling
//! - Position planning with exposure, correlation and margin overlays
//! - Deterministic RNG hierarchy for parallel simulation

pub mod cost;
pub mod kelly;
pub mod planner;
pub mod rng;
pub mod sampler;
pub mod stats;
pub mod tier;

pub use cost::{CostBreakdown, CostModel};
pub use kelly::{full_kelly, KellySizer};
pub use planner::{
    ExpectedAllocation, PlannerLimits, PositionPlan, PositionPlanner, PositionRequest,
    RejectReason, TierAllocation,
};
pub use rng::{RngHierarchy, EQUITY_STREAM};
pub use sampler::{
    OutcomeSampler, SampleError, SampledTrade, TradeSampler, DEFAULT_LOSS_SIGMA,
    DEFAULT_WIN_SIGMA,
};
pub use stats::{laplace_win_rate, ModelError, TierStats, TradeStatsModel};
pub use tier::{ConfidenceTier, PerTier, TierParams};
