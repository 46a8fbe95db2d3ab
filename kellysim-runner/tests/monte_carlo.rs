//! Integration tests for the Monte Carlo engine.
//!
//! Covers reproducibility, failure exclusion, exact ruin accounting,
//! configuration loading and the full 10,000 × 1,000 reference batch.

use rand::rngs::StdRng;
use rand::Rng;

use kellysim_core::{
    ConfidenceTier, OutcomeSampler, PerTier, SampleError, SampledTrade, TierParams, TradeSampler,
    TradeStatsModel,
};
use kellysim_runner::{
    run, AggregateResult, ConfigError, MonteCarloEngine, RunState, SimError, SimulationConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(num_simulations: usize, trades_per_simulation: usize) -> SimulationConfig {
    SimulationConfig {
        num_simulations,
        trades_per_simulation,
        ..SimulationConfig::default()
    }
}

/// Log-normal sampler that aborts a trade with a small fixed probability.
struct FlakySampler {
    inner: TradeSampler,
    failure_rate: f64,
}

impl OutcomeSampler for FlakySampler {
    fn sample_tier(&self, rng: &mut StdRng) -> ConfidenceTier {
        self.inner.sample_tier(rng)
    }

    fn sample_outcome(
        &self,
        tier: ConfidenceTier,
        rng: &mut StdRng,
    ) -> Result<SampledTrade, SampleError> {
        if rng.gen_bool(self.failure_rate) {
            return Err(SampleError::NonFinite {
                tier,
                side: "win",
                value: f64::NAN,
            });
        }
        self.inner.sample_outcome(tier, rng)
    }
}

fn flaky_sampler(config: &SimulationConfig, failure_rate: f64) -> FlakySampler {
    let stats = TradeStatsModel::new(&config.tiers).unwrap();
    let inner = TradeSampler::new(&stats, &config.selection(), config.win_sigma, config.loss_sigma)
        .unwrap()
        .with_loss_cap(config.magnitude_basis);
    FlakySampler {
        inner,
        failure_rate,
    }
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn identical_config_yields_identical_aggregate() {
    init_tracing();
    let a = run(config(300, 200)).unwrap();
    let b = run(config(300, 200)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn result_independent_of_thread_count() {
    let engine = MonteCarloEngine::new(config(64, 150)).unwrap();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let single = pool.install(|| engine.run());
    let parallel = engine.run();
    assert_eq!(single, parallel);
}

#[test]
fn different_seeds_differ() {
    let a = run(config(100, 200)).unwrap();
    let b = run(SimulationConfig {
        seed: 7,
        ..config(100, 200)
    })
    .unwrap();
    assert_ne!(a.final_capital, b.final_capital);
}

// ── Aggregation ──────────────────────────────────────────────────────

#[test]
fn reaggregating_stored_summaries_is_identical() {
    let engine = MonteCarloEngine::new(config(200, 100)).unwrap();
    let batch = engine.simulate();
    let first = AggregateResult::from_batch(&batch);
    let second = AggregateResult::from_batch(&batch);
    assert_eq!(first, second);
    assert_eq!(
        first.final_capital,
        AggregateResult::from_summaries(&batch.summaries).final_capital
    );
}

#[test]
fn ruin_probability_is_exact_fraction_of_halted_runs() {
    // A high floor makes halts common.
    let cfg = SimulationConfig {
        ruin_threshold_pct: 0.995,
        ..config(400, 200)
    };
    let engine = MonteCarloEngine::new(cfg).unwrap();
    let batch = engine.simulate();
    let halted = batch
        .summaries
        .iter()
        .filter(|s| s.terminal_state == RunState::HaltedRuin)
        .count();
    assert!(halted > 0, "expected some halted runs");

    let agg = AggregateResult::from_batch(&batch);
    assert_eq!(agg.runs_halted, halted);
    assert_eq!(
        agg.probability_of_ruin,
        halted as f64 / batch.summaries.len() as f64
    );
    for s in batch.summaries.iter().filter(|s| s.ruined()) {
        assert!(s.final_capital < 995.0);
        assert!(s.trades_executed <= 200);
    }
}

#[test]
fn failed_runs_are_counted_and_excluded() {
    init_tracing();
    let cfg = config(200, 100);
    let sampler = flaky_sampler(&cfg, 0.002);
    let engine = MonteCarloEngine::with_sampler(cfg, sampler).unwrap();
    let batch = engine.simulate();

    assert!(!batch.failures.is_empty(), "expected some aborted runs");
    assert_eq!(batch.summaries.len() + batch.failures.len(), 200);

    let agg = AggregateResult::from_batch(&batch);
    assert_eq!(agg.runs_requested, 200);
    assert_eq!(agg.runs_failed, batch.failures.len());
    assert_eq!(agg.runs_completed, batch.summaries.len());
    assert_eq!(agg.final_capital.count, batch.summaries.len());

    let mut indices: Vec<usize> = batch.failures.iter().map(|f| f.run_index).collect();
    let sorted = {
        let mut v = indices.clone();
        v.sort_unstable();
        v
    };
    assert_eq!(indices, sorted, "failures collected in run order");
    indices.dedup();
    assert_eq!(indices.len(), batch.failures.len());
}

#[test]
fn negative_edge_never_trades() {
    let cfg = SimulationConfig {
        win_rate_override: Some(0.05),
        ..config(50, 100)
    };
    let agg = run(cfg).unwrap();
    assert_eq!(agg.final_capital.min, 1_000.0);
    assert_eq!(agg.final_capital.max, 1_000.0);
    assert_eq!(agg.probability_of_profit, 0.0);
    assert_eq!(agg.probability_of_ruin, 0.0);
}

// ── Configuration ────────────────────────────────────────────────────

#[test]
fn invalid_selection_probabilities_rejected() {
    let mut cfg = config(10, 10);
    cfg.tiers = PerTier::new(
        TierParams {
            selection_probability: 0.5,
            ..TierParams::reported(ConfidenceTier::High)
        },
        TierParams::reported(ConfidenceTier::Medium),
        TierParams::reported(ConfidenceTier::Low),
    );
    let err = run(cfg).unwrap_err();
    assert!(matches!(err, SimError::Config(ConfigError::Invalid { .. })));
}

#[test]
fn saturated_history_counts_run_without_overflow() {
    let mut cfg = config(10, 20);
    cfg.tiers.low.wins = u32::MAX;
    cfg.tiers.low.losses = 1;
    let agg = run(cfg).unwrap();
    assert_eq!(agg.runs_completed + agg.runs_failed, 10);
}

#[test]
fn config_loads_from_toml_and_json_files() {
    let dir = tempfile::tempdir().unwrap();

    let toml_path = dir.path().join("batch.toml");
    std::fs::write(
        &toml_path,
        "num_simulations = 25\ntrades_per_simulation = 40\nseed = 9\n",
    )
    .unwrap();
    let from_toml = SimulationConfig::from_file(&toml_path).unwrap();
    assert_eq!(from_toml.num_simulations, 25);
    assert_eq!(from_toml.seed, 9);

    let json_path = dir.path().join("batch.json");
    std::fs::write(&json_path, serde_json::to_string(&from_toml).unwrap()).unwrap();
    let from_json = SimulationConfig::from_file(&json_path).unwrap();
    assert_eq!(from_json, from_toml);

    assert_eq!(run(from_toml).unwrap(), run(from_json).unwrap());
}

#[test]
fn aggregate_serializes_to_json() {
    let agg = run(config(20, 30)).unwrap();
    let json = serde_json::to_value(&agg).unwrap();
    assert!(json["final_capital"]["percentiles"]["p50"].is_number());
    assert!(json["probability_of_profit"].is_number());
    let back: AggregateResult = serde_json::from_value(json).unwrap();
    assert_eq!(back.runs_completed, agg.runs_completed);
}

// ── End-to-end reference batch ───────────────────────────────────────

#[test]
fn reference_batch_10000_runs_of_1000_trades() {
    init_tracing();
    let cfg = SimulationConfig::default();
    assert_eq!(cfg.num_simulations, 10_000);
    assert_eq!(cfg.trades_per_simulation, 1_000);

    let engine = MonteCarloEngine::new(cfg).unwrap();
    let high = engine.sizer().fraction(ConfidenceTier::High);
    assert!((high * 1_000.0 - 146.0).abs() < 1.0);

    let agg = engine.run();
    assert_eq!(agg.runs_requested, 10_000);
    assert_eq!(agg.runs_completed + agg.runs_failed, 10_000);
    assert_eq!(agg.runs_failed, 0);

    assert!((0.0..=1.0).contains(&agg.probability_of_profit));
    assert!((0.0..=1.0).contains(&agg.probability_of_ruin));

    let p = agg.final_capital.percentiles;
    assert!(p.p5 <= p.p25 && p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p95);
    assert!(p.is_monotonic());
    assert!(agg.final_capital.min >= 0.0);
    assert_eq!(agg.final_capital.median, p.p50);

    assert_eq!(agg.sample_curves.len(), 5);
    for curve in &agg.sample_curves {
        assert_eq!(curve.equity_curve[0], 1_000.0);
        assert!(curve.equity_curve.iter().all(|&c| c >= 0.0));
    }
}
