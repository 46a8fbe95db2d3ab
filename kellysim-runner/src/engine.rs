//! Monte Carlo engine — many independent equity runs in parallel.
//!
//! Each run owns its portfolio and a `StdRng` derived from the master seed and
//! the run index through the BLAKE3 hierarchy, so a batch is reproducible
//! regardless of thread count or scheduling. Results are collected in run-index
//! order and only summaries (plus a handful of sampled equity curves) are kept.

use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use kellysim_core::{
    KellySizer, ModelError, OutcomeSampler, RngHierarchy, TradeSampler, TradeStatsModel,
    EQUITY_STREAM,
};

use crate::aggregate::{AggregateResult, RunBatch, SampleCurve};
use crate::config::{ConfigError, SimulationConfig};
use crate::simulator::{
    CompletedRun, EquitySimulator, RunFailure, SimulationParams, SimulationSummary,
};

/// Errors raised before any run starts.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("build trade model: {0}")]
    Model(#[from] ModelError),
}

/// Run indices whose equity curves are kept: first, quartiles and last.
pub fn sample_run_indices(num_runs: usize) -> Vec<usize> {
    if num_runs == 0 {
        return Vec::new();
    }
    let mut indices = vec![
        0,
        num_runs / 4,
        num_runs / 2,
        3 * num_runs / 4,
        num_runs - 1,
    ];
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Parallel batch runner over a shared read-only model.
pub struct MonteCarloEngine<S: OutcomeSampler = TradeSampler> {
    config: SimulationConfig,
    config_hash: String,
    stats: TradeStatsModel,
    params: SimulationParams,
    sampler: S,
    rng: RngHierarchy,
}

impl MonteCarloEngine<TradeSampler> {
    /// Validate the configuration and build the log-normal trade model.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let (stats, params) = SimulationParams::from_config(&config)?;
        let sampler = TradeSampler::new(
            &stats,
            &config.selection(),
            config.win_sigma,
            config.loss_sigma,
        )?
        .with_loss_cap(config.magnitude_basis);
        Self::assemble(config, stats, params, sampler)
    }
}

impl<S: OutcomeSampler> MonteCarloEngine<S> {
    /// Build an engine that draws trades from `sampler`.
    pub fn with_sampler(config: SimulationConfig, sampler: S) -> Result<Self, SimError> {
        config.validate()?;
        let (stats, params) = SimulationParams::from_config(&config)?;
        Self::assemble(config, stats, params, sampler)
    }

    fn assemble(
        config: SimulationConfig,
        stats: TradeStatsModel,
        params: SimulationParams,
        sampler: S,
    ) -> Result<Self, SimError> {
        let config_hash = config.config_hash()?;
        let rng = RngHierarchy::new(config.seed);
        Ok(Self {
            config,
            config_hash,
            stats,
            params,
            sampler,
            rng,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// BLAKE3 hash of the validated configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn stats(&self) -> &TradeStatsModel {
        &self.stats
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn sizer(&self) -> &KellySizer {
        self.params.planner.sizer()
    }

    /// Simulate a single run with its own derived random stream.
    pub fn simulate_run(&self, run_index: usize) -> Result<CompletedRun, RunFailure> {
        let rng = self.rng.rng_for(EQUITY_STREAM, run_index as u64);
        let mut sim = EquitySimulator::new(&self.params, &self.sampler, rng);
        match sim.run_to_end() {
            Ok(()) => Ok(sim.finish()),
            Err(source) => Err(RunFailure {
                run_index,
                trades_executed: sim.steps(),
                source,
            }),
        }
    }

    /// Simulate every run of the batch in parallel.
    pub fn simulate(&self) -> RunBatch {
        let n = self.config.num_simulations;
        let sampled = sample_run_indices(n);
        let started = Instant::now();

        info!(
            runs = n,
            trades_per_run = self.config.trades_per_simulation,
            seed = self.config.seed,
            config_hash = %self.config_hash,
            "Starting Monte Carlo batch"
        );

        // Curves are dropped inside the worker unless the run is sampled.
        let results: Vec<Result<(SimulationSummary, Option<Vec<f64>>), RunFailure>> = (0..n)
            .into_par_iter()
            .map(|i| {
                self.simulate_run(i).map(|run| {
                    let curve = sampled
                        .binary_search(&i)
                        .is_ok()
                        .then_some(run.equity_curve);
                    (run.summary, curve)
                })
            })
            .collect();

        let mut summaries = Vec::with_capacity(n);
        let mut failures = Vec::new();
        let mut sample_curves = Vec::with_capacity(sampled.len());

        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok((summary, curve)) => {
                    if summary.ruined() {
                        debug!(
                            run = i,
                            trades = summary.trades_executed,
                            capital = summary.final_capital,
                            "Run halted at ruin floor"
                        );
                    }
                    if let Some(equity_curve) = curve {
                        sample_curves.push(SampleCurve {
                            run_index: i,
                            equity_curve,
                        });
                    }
                    summaries.push(summary);
                }
                Err(failure) => {
                    warn!(run = failure.run_index, error = %failure, "Run aborted");
                    failures.push(failure);
                }
            }
        }

        info!(
            completed = summaries.len(),
            halted = summaries.iter().filter(|s| s.ruined()).count(),
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monte Carlo batch finished"
        );

        RunBatch {
            runs_requested: n,
            summaries,
            failures,
            sample_curves,
        }
    }

    /// Simulate the batch and aggregate it.
    pub fn run(&self) -> AggregateResult {
        AggregateResult::from_batch(&self.simulate())
    }
}

/// Validate `config`, simulate every run and aggregate the results.
pub fn run(config: SimulationConfig) -> Result<AggregateResult, SimError> {
    Ok(MonteCarloEngine::new(config)?.run())
}
