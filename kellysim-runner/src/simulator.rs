//! Equity simulator — one run of synthetic trades as a state machine.
//!
//! A run starts `Running` and ends `Complete` after the configured number of
//! trades, or `HaltedRuin` as soon as capital drops below the ruin floor.
//! Each step draws a tier, sizes the position, draws the outcome, deducts
//! costs and updates the run's portfolio.
//!
//! Capital stays non-negative by sizing: a loss is bounded by the notional
//! and the notional leaves room for the round-trip costs.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kellysim_core::{
    ConfidenceTier, CostModel, KellySizer, ModelError, OutcomeSampler, PositionPlanner,
    SampleError, TradeStatsModel,
};

use crate::config::SimulationConfig;
use crate::metrics::{self, TRADES_PER_YEAR};

// ─── State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    HaltedRuin,
    Complete,
}

/// Mutable per-run portfolio. Owned by exactly one simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub capital: f64,
    pub peak_capital: f64,
    pub wins: usize,
    pub losses: usize,
    pub current_win_streak: usize,
    pub max_win_streak: usize,
    pub current_loss_streak: usize,
    pub max_loss_streak: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_costs: f64,
    /// Largest decline from peak as a fraction of that peak.
    pub max_drawdown: f64,
    /// Largest decline from peak in currency.
    pub max_drawdown_abs: f64,
    /// Capital after every step, starting with the starting capital.
    pub equity_curve: Vec<f64>,
}

impl PortfolioState {
    pub fn new(starting_capital: f64, expected_steps: usize) -> Self {
        let mut equity_curve = Vec::with_capacity(expected_steps + 1);
        equity_curve.push(starting_capital);
        Self {
            capital: starting_capital,
            peak_capital: starting_capital,
            wins: 0,
            losses: 0,
            current_win_streak: 0,
            max_win_streak: 0,
            current_loss_streak: 0,
            max_loss_streak: 0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            total_costs: 0.0,
            max_drawdown: 0.0,
            max_drawdown_abs: 0.0,
            equity_curve,
        }
    }

    /// Current decline from peak as a fraction of peak.
    pub fn drawdown(&self) -> f64 {
        if self.peak_capital > 0.0 {
            (self.peak_capital - self.capital) / self.peak_capital
        } else {
            0.0
        }
    }

    fn record(&mut self, outcome: &TradeOutcome) {
        if outcome.is_win {
            self.wins += 1;
            self.current_win_streak += 1;
            self.current_loss_streak = 0;
            self.max_win_streak = self.max_win_streak.max(self.current_win_streak);
        } else {
            self.losses += 1;
            self.current_loss_streak += 1;
            self.current_win_streak = 0;
            self.max_loss_streak = self.max_loss_streak.max(self.current_loss_streak);
        }

        if outcome.net_pnl >= 0.0 {
            self.gross_profit += outcome.net_pnl;
        } else {
            self.gross_loss -= outcome.net_pnl;
        }
        self.total_costs += outcome.slippage + outcome.commission;

        self.capital = outcome.capital_after;
        self.peak_capital = self.peak_capital.max(self.capital);
        self.max_drawdown = self.max_drawdown.max(self.drawdown());
        self.max_drawdown_abs = self.max_drawdown_abs.max(self.peak_capital - self.capital);
        self.equity_curve.push(self.capital);
    }
}

/// Result of one simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub tier: ConfidenceTier,
    pub is_win: bool,
    pub notional: f64,
    pub gross_pnl: f64,
    pub slippage: f64,
    pub commission: f64,
    pub net_pnl: f64,
    pub capital_after: f64,
}

/// Per-run statistics extracted when a run terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub final_capital: f64,
    pub total_pnl: f64,
    /// Total PnL / starting capital.
    pub roi: f64,
    pub max_drawdown: f64,
    pub max_drawdown_abs: f64,
    pub max_loss_streak: usize,
    pub max_win_streak: usize,
    pub wins: usize,
    pub losses: usize,
    /// Realised win rate over executed trades.
    pub win_rate: f64,
    pub sharpe_ratio: f64,
    /// `None` when the run had no losing trades.
    pub profit_factor: Option<f64>,
    pub total_costs: f64,
    pub trades_executed: usize,
    pub terminal_state: RunState,
}

impl SimulationSummary {
    pub fn ruined(&self) -> bool {
        self.terminal_state == RunState::HaltedRuin
    }

    pub fn profitable(&self) -> bool {
        self.total_pnl > 0.0
    }

    fn from_portfolio(
        portfolio: &PortfolioState,
        starting_capital: f64,
        trades_executed: usize,
        terminal_state: RunState,
    ) -> Self {
        let total_pnl = portfolio.capital - starting_capital;
        let trades = portfolio.wins + portfolio.losses;
        Self {
            final_capital: portfolio.capital,
            total_pnl,
            roi: total_pnl / starting_capital,
            max_drawdown: portfolio.max_drawdown,
            max_drawdown_abs: portfolio.max_drawdown_abs,
            max_loss_streak: portfolio.max_loss_streak,
            max_win_streak: portfolio.max_win_streak,
            wins: portfolio.wins,
            losses: portfolio.losses,
            win_rate: if trades > 0 {
                portfolio.wins as f64 / trades as f64
            } else {
                0.0
            },
            sharpe_ratio: metrics::sharpe_ratio(&portfolio.equity_curve, TRADES_PER_YEAR),
            profit_factor: metrics::profit_factor(portfolio.gross_profit, portfolio.gross_loss),
            total_costs: portfolio.total_costs,
            trades_executed,
            terminal_state,
        }
    }
}

/// A finished run: its summary plus the full equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedRun {
    pub summary: SimulationSummary,
    pub equity_curve: Vec<f64>,
}

/// A run aborted by a sampling failure. Excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("run {run_index} aborted after {trades_executed} trades: {source}")]
pub struct RunFailure {
    pub run_index: usize,
    pub trades_executed: usize,
    #[source]
    pub source: SampleError,
}

// ─── Parameters ──────────────────────────────────────────────────────

/// Read-only model shared by every run of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub starting_capital: f64,
    pub trades_per_simulation: usize,
    pub use_compounding: bool,
    pub ruin_floor: f64,
    pub magnitude_basis: f64,
    pub planner: PositionPlanner,
    pub cost_model: CostModel,
}

impl SimulationParams {
    pub fn new(config: &SimulationConfig, stats: &TradeStatsModel) -> Self {
        let sizer = KellySizer::new(stats, &config.multipliers(), config.max_position_pct);
        Self {
            starting_capital: config.starting_capital,
            trades_per_simulation: config.trades_per_simulation,
            use_compounding: config.use_compounding,
            ruin_floor: config.ruin_floor(),
            magnitude_basis: config.magnitude_basis,
            planner: PositionPlanner::new(sizer, config.planner_limits()),
            cost_model: config.cost_model(),
        }
    }

    /// Build the statistics model and parameters from a configuration.
    pub fn from_config(config: &SimulationConfig) -> Result<(TradeStatsModel, Self), ModelError> {
        let mut stats = TradeStatsModel::new(&config.tiers)?;
        if let Some(rate) = config.win_rate_override {
            stats = stats.with_win_rate_override(rate)?;
        }
        let params = Self::new(config, &stats);
        Ok((stats, params))
    }

    /// Position notional for `tier` given the run's current capital.
    ///
    /// Bounded by the Kelly size on the sizing base, the per-trade cap on
    /// both current and starting capital, and the capital left after
    /// round-trip costs.
    pub fn notional(&self, tier: ConfidenceTier, capital: f64) -> f64 {
        let base = if self.use_compounding {
            capital
        } else {
            self.starting_capital
        };
        let max_pct = self.planner.limits().max_position_pct;
        self.planner
            .sized_notional(tier, base, capital, 0.0)
            .min(max_pct * self.starting_capital)
            .min(capital / (1.0 + self.cost_model.round_trip_rate()))
            .max(0.0)
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

/// One run. Owns its portfolio and random stream.
pub struct EquitySimulator<'a, S: OutcomeSampler + ?Sized> {
    params: &'a SimulationParams,
    sampler: &'a S,
    rng: StdRng,
    portfolio: PortfolioState,
    state: RunState,
    steps: usize,
}

impl<'a, S: OutcomeSampler + ?Sized> EquitySimulator<'a, S> {
    pub fn new(params: &'a SimulationParams, sampler: &'a S, rng: StdRng) -> Self {
        Self {
            params,
            sampler,
            rng,
            portfolio: PortfolioState::new(params.starting_capital, params.trades_per_simulation),
            state: RunState::Running,
            steps: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Execute one trade. Returns `None` once the run has terminated.
    pub fn step(&mut self) -> Result<Option<TradeOutcome>, SampleError> {
        if self.state != RunState::Running {
            return Ok(None);
        }

        let tier = self.sampler.sample_tier(&mut self.rng);
        let capital = self.portfolio.capital;
        let notional = self.params.notional(tier, capital);

        let trade = self.sampler.sample_outcome(tier, &mut self.rng)?;
        let gross = (trade.signed_magnitude() * notional / self.params.magnitude_basis).max(-notional);
        let costs = self.params.cost_model.apply(gross, notional);

        let outcome = TradeOutcome {
            tier,
            is_win: trade.is_win,
            notional,
            gross_pnl: costs.gross_pnl,
            slippage: costs.slippage,
            commission: costs.commission,
            net_pnl: costs.net_pnl,
            capital_after: capital + costs.net_pnl,
        };
        self.portfolio.record(&outcome);
        self.steps += 1;

        if self.portfolio.capital < self.params.ruin_floor {
            self.state = RunState::HaltedRuin;
        } else if self.steps >= self.params.trades_per_simulation {
            self.state = RunState::Complete;
        }

        Ok(Some(outcome))
    }

    /// Step until the run terminates.
    pub fn run_to_end(&mut self) -> Result<(), SampleError> {
        while self.state == RunState::Running {
            self.step()?;
        }
        Ok(())
    }

    /// Extract the summary and equity curve.
    pub fn finish(self) -> CompletedRun {
        let summary = SimulationSummary::from_portfolio(
            &self.portfolio,
            self.params.starting_capital,
            self.steps,
            self.state,
        );
        CompletedRun {
            summary,
            equity_curve: self.portfolio.equity_curve,
        }
    }

    pub fn run(mut self) -> Result<CompletedRun, SampleError> {
        self.run_to_end()?;
        Ok(self.finish())
    }
}
