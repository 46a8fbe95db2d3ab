//! Serializable simulation configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use kellysim_core::{
    CostModel, PerTier, PlannerLimits, TierParams, DEFAULT_LOSS_SIGMA, DEFAULT_WIN_SIGMA,
};

/// Tolerance on the sum of tier selection probabilities.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Full parameter set for a Monte Carlo batch.
///
/// Every field has a default; the defaults reproduce the reported
/// configuration ($1,000 starting capital, 10,000 runs of 1,000 trades,
/// 1/3 · 1/4 · 1/8 Kelly with a 20% cap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Capital at the start of every run.
    pub starting_capital: f64,
    /// Number of independent runs.
    pub num_simulations: usize,
    /// Maximum trades per run.
    pub trades_per_simulation: usize,
    /// Master seed for the per-run RNG hierarchy.
    pub seed: u64,
    /// Size from current capital (true) or from starting capital (false).
    pub use_compounding: bool,

    /// Historical statistics and sizing parameters per tier.
    pub tiers: PerTier<TierParams>,

    pub max_position_pct: f64,
    /// Total open exposure ceiling as a multiple of capital (may exceed 1).
    pub max_total_exposure_pct: f64,
    pub stop_loss_pct: f64,
    pub correlation_reduction_pct: f64,
    pub margin_requirement_pct: f64,

    /// Slippage as a fraction of notional.
    pub slippage_pct: f64,
    /// Commission per side as a fraction of notional.
    pub commission_pct: f64,

    /// A run halts once capital drops below this fraction of starting capital.
    pub ruin_threshold_pct: f64,

    /// Notional that one unit of sampled magnitude is quoted against.
    /// With the default of 100, magnitudes read as percent returns.
    pub magnitude_basis: f64,
    pub win_sigma: f64,
    pub loss_sigma: f64,

    /// Replace every tier's win rate (stress testing).
    pub win_rate_override: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_capital: 1_000.0,
            num_simulations: 10_000,
            trades_per_simulation: 1_000,
            seed: 42,
            use_compounding: true,
            tiers: PerTier::default(),
            max_position_pct: 0.20,
            max_total_exposure_pct: 1.50,
            stop_loss_pct: 0.02,
            correlation_reduction_pct: 0.30,
            margin_requirement_pct: 0.05,
            slippage_pct: 0.005,
            commission_pct: 0.001,
            ruin_threshold_pct: 0.50,
            magnitude_basis: 100.0,
            win_sigma: DEFAULT_WIN_SIGMA,
            loss_sigma: DEFAULT_LOSS_SIGMA,
            win_rate_override: None,
        }
    }
}

impl SimulationConfig {
    /// Load and validate a configuration file (`.json` by extension, TOML otherwise).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// Parse and validate a TOML configuration. Missing fields take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulator cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.starting_capital.is_finite() && self.starting_capital > 0.0) {
            return Err(ConfigError::invalid(
                "starting_capital",
                format!("{} must be positive", self.starting_capital),
            ));
        }
        if self.num_simulations == 0 {
            return Err(ConfigError::invalid("num_simulations", "must be at least 1"));
        }
        if self.trades_per_simulation == 0 {
            return Err(ConfigError::invalid("trades_per_simulation", "must be at least 1"));
        }

        let mut sum = 0.0;
        for (tier, p) in self.tiers.iter() {
            let prefix = format!("tiers.{}", tier.as_str().to_lowercase());
            unit_interval(&format!("{prefix}.selection_probability"), p.selection_probability)?;
            unit_interval(&format!("{prefix}.kelly_multiplier"), p.kelly_multiplier)?;
            sum += p.selection_probability;
        }
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                "tiers.selection_probability",
                format!("selection probabilities sum to {sum}, expected 1"),
            ));
        }

        unit_interval("max_position_pct", self.max_position_pct)?;
        if self.max_position_pct == 0.0 {
            return Err(ConfigError::invalid("max_position_pct", "must be positive"));
        }
        if !(self.max_total_exposure_pct.is_finite() && self.max_total_exposure_pct > 0.0) {
            return Err(ConfigError::invalid(
                "max_total_exposure_pct",
                format!("{} must be positive", self.max_total_exposure_pct),
            ));
        }
        unit_interval("stop_loss_pct", self.stop_loss_pct)?;
        unit_interval("correlation_reduction_pct", self.correlation_reduction_pct)?;
        unit_interval("margin_requirement_pct", self.margin_requirement_pct)?;
        unit_interval("slippage_pct", self.slippage_pct)?;
        unit_interval("commission_pct", self.commission_pct)?;
        unit_interval("ruin_threshold_pct", self.ruin_threshold_pct)?;

        if !(self.magnitude_basis.is_finite() && self.magnitude_basis > 0.0) {
            return Err(ConfigError::invalid(
                "magnitude_basis",
                format!("{} must be positive", self.magnitude_basis),
            ));
        }
        for (field, sigma) in [("win_sigma", self.win_sigma), ("loss_sigma", self.loss_sigma)] {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(ConfigError::invalid(field, format!("{sigma} must be non-negative")));
            }
        }
        if let Some(rate) = self.win_rate_override {
            unit_interval("win_rate_override", rate)?;
        }
        Ok(())
    }

    /// Deterministic content hash of this configuration.
    ///
    /// Two batches with the same hash produce the same aggregate result.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_pct, self.commission_pct)
    }

    pub fn planner_limits(&self) -> PlannerLimits {
        PlannerLimits {
            max_position_pct: self.max_position_pct,
            max_total_exposure_pct: self.max_total_exposure_pct,
            correlation_reduction_pct: self.correlation_reduction_pct,
            margin_requirement_pct: self.margin_requirement_pct,
            stop_loss_pct: self.stop_loss_pct,
        }
    }

    pub fn multipliers(&self) -> PerTier<f64> {
        self.tiers.map(|_, p| p.kelly_multiplier)
    }

    pub fn selection(&self) -> PerTier<f64> {
        self.tiers.map(|_, p| p.selection_probability)
    }

    /// Capital below which a run is halted.
    pub fn ruin_floor(&self) -> f64 {
        self.starting_capital * self.ruin_threshold_pct
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}
