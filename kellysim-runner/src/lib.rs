//! KellySim Runner — equity simulation, Monte Carlo orchestration, aggregation.
//!
//! This crate builds on `kellysim-core` to provide:
//! - Serializable, validated simulation configuration (TOML / JSON)
//! - Per-run equity simulator with ruin halting
//! - Rayon-parallel Monte Carlo engine with deterministic per-run streams
//! - Percentile and probability aggregation over run summaries
//! - Stress scenario suite
//!
//! The library emits `tracing` events and installs no subscriber.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod scenario;
pub mod simulator;

pub use aggregate::{AggregateResult, DistributionStats, PercentileTable, RunBatch, SampleCurve};
pub use config::{ConfigError, SimulationConfig};
pub use engine::{run, sample_run_indices, MonteCarloEngine, SimError};
pub use scenario::{run_stress_tests, ScenarioReport, StressScenario};
pub use simulator::{
    CompletedRun, EquitySimulator, PortfolioState, RunFailure, RunState, SimulationParams,
    SimulationSummary, TradeOutcome,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<SimulationConfig>();
        assert_sync::<SimulationConfig>();
        assert_send::<SimulationParams>();
        assert_sync::<SimulationParams>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<SimulationSummary>();
        assert_sync::<SimulationSummary>();
        assert_send::<AggregateResult>();
        assert_sync::<AggregateResult>();
        assert_send::<RunBatch>();
        assert_sync::<RunBatch>();
        assert_send::<RunFailure>();
        assert_sync::<RunFailure>();
        assert_send::<ScenarioReport>();
        assert_sync::<ScenarioReport>();
    }

    #[test]
    fn engine_is_send_sync() {
        assert_send::<MonteCarloEngine>();
        assert_sync::<MonteCarloEngine>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<SimError>();
        assert_sync::<SimError>();
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
    }
}
