//! Stress scenarios — named configuration transforms run through the engine.
//!
//! Every scenario keeps the base seed, so scenarios are compared on common
//! random numbers and differ only by the parameter they change.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::AggregateResult;
use crate::config::SimulationConfig;
use crate::engine::{MonteCarloEngine, SimError};

/// A parameter transform applied to a base configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StressScenario {
    /// The base configuration unchanged.
    Baseline,
    /// Size every trade from starting capital.
    NoCompounding,
    /// Replace every tier's win rate.
    LowerWinRate { win_rate: f64 },
    /// Raise slippage to `slippage_pct`.
    HigherSlippage { slippage_pct: f64 },
    /// Halve every Kelly multiplier.
    HalfKelly,
    /// Triple every Kelly multiplier (1/3 becomes full Kelly), capped at 1.
    FullKelly,
}

impl StressScenario {
    /// The scenarios of the reported stress test, baseline first.
    pub fn standard_suite() -> Vec<Self> {
        vec![
            Self::Baseline,
            Self::NoCompounding,
            Self::LowerWinRate { win_rate: 0.50 },
            Self::HigherSlippage { slippage_pct: 0.01 },
            Self::HalfKelly,
            Self::FullKelly,
        ]
    }

    pub fn name(&self) -> String {
        match self {
            Self::Baseline => "Baseline".to_string(),
            Self::NoCompounding => "No Compounding".to_string(),
            Self::LowerWinRate { win_rate } => format!("Lower Win Rate ({:.0}%)", win_rate * 100.0),
            Self::HigherSlippage { slippage_pct } => {
                format!("Higher Slippage ({:.1}%)", slippage_pct * 100.0)
            }
            Self::HalfKelly => "Half Kelly".to_string(),
            Self::FullKelly => "Full Kelly".to_string(),
        }
    }

    /// Derive the scenario configuration from `base`.
    pub fn apply(&self, base: &SimulationConfig) -> SimulationConfig {
        let mut config = base.clone();
        match *self {
            Self::Baseline => {}
            Self::NoCompounding => config.use_compounding = false,
            Self::LowerWinRate { win_rate } => config.win_rate_override = Some(win_rate),
            Self::HigherSlippage { slippage_pct } => config.slippage_pct = slippage_pct,
            Self::HalfKelly => scale_multipliers(&mut config, 0.5),
            Self::FullKelly => scale_multipliers(&mut config, 3.0),
        }
        config
    }
}

fn scale_multipliers(config: &mut SimulationConfig, factor: f64) {
    for tier in kellysim_core::ConfidenceTier::ALL {
        let params = config.tiers.get_mut(tier);
        params.kelly_multiplier = (params.kelly_multiplier * factor).min(1.0);
    }
}

/// One scenario's aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: StressScenario,
    pub name: String,
    pub result: AggregateResult,
}

/// Run each scenario against `base`, in order.
///
/// Every scenario configuration is validated before any scenario runs.
pub fn run_stress_tests(
    base: &SimulationConfig,
    scenarios: &[StressScenario],
) -> Result<Vec<ScenarioReport>, SimError> {
    let engines = scenarios
        .iter()
        .map(|s| MonteCarloEngine::new(s.apply(base)).map(|engine| (*s, engine)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(engines
        .into_iter()
        .map(|(scenario, engine)| {
            let name = scenario.name();
            info!(scenario = %name, "Running stress scenario");
            let result = engine.run();
            info!(
                scenario = %name,
                median_final_capital = result.final_capital.median,
                probability_of_profit = result.probability_of_profit,
                probability_of_ruin = result.probability_of_ruin,
                "Stress scenario finished"
            );
            ScenarioReport {
                scenario,
                name,
                result,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kellysim_core::ConfidenceTier;

    #[test]
    fn baseline_leaves_config_unchanged() {
        let base = SimulationConfig::default();
        assert_eq!(StressScenario::Baseline.apply(&base), base);
    }

    #[test]
    fn transforms_touch_one_parameter() {
        let base = SimulationConfig::default();

        let c = StressScenario::NoCompounding.apply(&base);
        assert!(!c.use_compounding);
        assert_eq!(c.seed, base.seed);

        let c = StressScenario::LowerWinRate { win_rate: 0.5 }.apply(&base);
        assert_eq!(c.win_rate_override, Some(0.5));

        let c = StressScenario::HigherSlippage { slippage_pct: 0.01 }.apply(&base);
        assert_eq!(c.slippage_pct, 0.01);
    }

    #[test]
    fn kelly_scaling_respects_unit_cap() {
        let base = SimulationConfig::default();

        let half = StressScenario::HalfKelly.apply(&base);
        assert!((half.tiers.high.kelly_multiplier - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(half.tiers.low.kelly_multiplier, 0.0625);

        let full = StressScenario::FullKelly.apply(&base);
        assert!((full.tiers.get(ConfidenceTier::High).kelly_multiplier - 1.0).abs() < 1e-12);
        assert_eq!(full.tiers.medium.kelly_multiplier, 0.75);
        assert_eq!(full.tiers.low.kelly_multiplier, 0.375);
        full.validate().unwrap();
    }

    #[test]
    fn names_include_parameters() {
        assert_eq!(
            StressScenario::LowerWinRate { win_rate: 0.5 }.name(),
            "Lower Win Rate (50%)"
        );
        assert_eq!(
            StressScenario::HigherSlippage { slippage_pct: 0.01 }.name(),
            "Higher Slippage (1.0%)"
        );
    }

    #[test]
    fn invalid_scenario_fails_before_running() {
        let base = SimulationConfig {
            num_simulations: 5,
            trades_per_simulation: 10,
            ..SimulationConfig::default()
        };
        let scenarios = [
            StressScenario::Baseline,
            StressScenario::HigherSlippage { slippage_pct: 2.0 },
        ];
        assert!(run_stress_tests(&base, &scenarios).is_err());
    }

    #[test]
    fn suite_reports_in_order() {
        let base = SimulationConfig {
            num_simulations: 20,
            trades_per_simulation: 50,
            ..SimulationConfig::default()
        };
        let suite = StressScenario::standard_suite();
        let reports = run_stress_tests(&base, &suite).unwrap();
        assert_eq!(reports.len(), suite.len());
        for (report, scenario) in reports.iter().zip(&suite) {
            assert_eq!(&report.scenario, scenario);
            assert_eq!(report.result.runs_requested, 20);
        }
    }
}
