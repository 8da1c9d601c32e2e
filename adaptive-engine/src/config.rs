//! Engine configuration
//!
//! Every numeric here is a calibration parameter, not a constant the
//! algorithms depend on being exactly right. The TOML template flags
//! the ones that need domain-expert review.

use serde::{Deserialize, Serialize};

/// Overall engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Transaction-cost model
    #[serde(default)]
    pub costs: CostModelConfig,

    /// Adaptive threshold behavior
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Portfolio-level veto settings
    #[serde(default)]
    pub portfolio: PortfolioGateConfig,

    /// Online learning / recalibration settings
    #[serde(default)]
    pub learning: LearningConfig,
}

/// Transaction-cost model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModelConfig {
    /// Base spread cost, fraction of notional
    #[serde(default = "default_spread_base")]
    pub spread_base: f64,

    /// Base slippage cost, fraction of notional
    #[serde(default = "default_slippage_base")]
    pub slippage_base: f64,

    /// Market-impact coefficient (power-law model, needs calibration)
    #[serde(default = "default_impact_lambda")]
    pub impact_lambda: f64,

    /// Market-impact exponent on size / depth
    #[serde(default = "default_impact_exponent")]
    pub impact_exponent: f64,

    /// Spread multiplier outside the main session (UTC 06-22)
    #[serde(default = "default_off_session_multiplier")]
    pub off_session_multiplier: f64,

    /// Position notional as a fraction of equity used for impact sizing
    #[serde(default = "default_order_size_fraction")]
    pub order_size_fraction: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            spread_base: default_spread_base(),
            slippage_base: default_slippage_base(),
            impact_lambda: default_impact_lambda(),
            impact_exponent: default_impact_exponent(),
            off_session_multiplier: default_off_session_multiplier(),
            order_size_fraction: default_order_size_fraction(),
        }
    }
}

fn default_spread_base() -> f64 {
    0.0004
}

fn default_slippage_base() -> f64 {
    0.0002
}

fn default_impact_lambda() -> f64 {
    0.0005
}

fn default_impact_exponent() -> f64 {
    0.6
}

fn default_off_session_multiplier() -> f64 {
    1.5
}

fn default_order_size_fraction() -> f64 {
    0.1
}

/// Adaptive threshold behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Hard lower bound for any regime threshold
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,

    /// Hard upper bound for any regime threshold
    #[serde(default = "default_max_threshold")]
    pub max_threshold: f64,

    /// Gradient step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Exponential smoothing momentum on the update velocity
    #[serde(default = "default_momentum")]
    pub momentum: f64,

    /// Trades required in a regime before its threshold may move
    #[serde(default = "default_min_trades")]
    pub min_trades_for_update: usize,

    /// Minimum hours between threshold updates for one regime
    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: i64,

    /// Win-rate the gradient steers toward
    #[serde(default = "default_target_win_rate")]
    pub target_win_rate: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_threshold: default_min_threshold(),
            max_threshold: default_max_threshold(),
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
            min_trades_for_update: default_min_trades(),
            update_interval_hours: default_update_interval_hours(),
            target_win_rate: default_target_win_rate(),
        }
    }
}

fn default_min_threshold() -> f64 {
    0.001
}

fn default_max_threshold() -> f64 {
    0.2
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_momentum() -> f64 {
    0.9
}

fn default_min_trades() -> usize {
    10
}

fn default_update_interval_hours() -> i64 {
    6
}

fn default_target_win_rate() -> f64 {
    0.55
}

/// Portfolio-level veto settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioGateConfig {
    /// Absolute same-pair correlation above which a trade is vetoed
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,

    /// Most negative simulated Sharpe delta the portfolio tolerates
    #[serde(default = "default_max_sharpe_impact")]
    pub max_sharpe_impact: f64,

    /// Maximum candidate-risk to total-portfolio-risk ratio
    #[serde(default = "default_max_risk_ratio")]
    pub max_risk_ratio: f64,

    /// Per-trade risk as a fraction of equity
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade_fraction: f64,
}

impl Default for PortfolioGateConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: default_correlation_threshold(),
            max_sharpe_impact: default_max_sharpe_impact(),
            max_risk_ratio: default_max_risk_ratio(),
            risk_per_trade_fraction: default_risk_per_trade(),
        }
    }
}

fn default_correlation_threshold() -> f64 {
    0.7
}

fn default_max_sharpe_impact() -> f64 {
    -0.05
}

fn default_max_risk_ratio() -> f64 {
    0.3
}

fn default_risk_per_trade() -> f64 {
    0.01
}

/// Online learning / recalibration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Trades between feature-weight recalibrations
    #[serde(default = "default_recalibration_trades")]
    pub recalibration_trades: usize,

    /// Days between recalibrations, whichever comes first
    #[serde(default = "default_recalibration_days")]
    pub recalibration_days: i64,

    /// Lower bound for any feature weight
    #[serde(default = "default_weight_min")]
    pub weight_min: f64,

    /// Upper bound for any feature weight
    #[serde(default = "default_weight_max")]
    pub weight_max: f64,

    /// Exponential decay kept from the old weight at recalibration
    #[serde(default = "default_decay_old")]
    pub decay_old: f64,

    /// Multiplicative nudge toward the calibrated value
    #[serde(default = "default_nudge")]
    pub nudge: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            recalibration_trades: default_recalibration_trades(),
            recalibration_days: default_recalibration_days(),
            weight_min: default_weight_min(),
            weight_max: default_weight_max(),
            decay_old: default_decay_old(),
            nudge: default_nudge(),
        }
    }
}

fn default_recalibration_trades() -> usize {
    20
}

fn default_recalibration_days() -> i64 {
    7
}

fn default_weight_min() -> f64 {
    0.1
}

fn default_weight_max() -> f64 {
    2.0
}

fn default_decay_old() -> f64 {
    0.95
}

fn default_nudge() -> f64 {
    1.02
}

/// Load configuration from a TOML file, with ENGINE_* environment
/// variables layered on top for deployment overrides.
pub fn load_config(path: &str) -> anyhow::Result<EngineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("ENGINE").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Save configuration to a TOML file
pub fn save_config(config: &EngineConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: &str) -> anyhow::Result<()> {
    let template = "# Regime-Adaptive Engine Configuration
# Cost-model and impact numbers below are illustrative defaults and
# should be calibrated against real execution data before live use.

[costs]
# Base spread cost (fraction of notional)
spread_base = 0.0004

# Base slippage cost (fraction of notional)
slippage_base = 0.0002

# Market-impact coefficient - CALIBRATE
impact_lambda = 0.0005

# Market-impact exponent on size/depth
impact_exponent = 0.6

# Spread multiplier outside the main session
off_session_multiplier = 1.5

# Position notional as a fraction of equity for impact sizing
order_size_fraction = 0.1

[thresholds]
# Hard bounds for every regime threshold
min_threshold = 0.001
max_threshold = 0.2

# Gradient step and velocity smoothing
learning_rate = 0.1
momentum = 0.9

# Update gating
min_trades_for_update = 10
update_interval_hours = 6

# Win-rate target for the gradient
target_win_rate = 0.55

[portfolio]
# Absolute same-pair correlation that vetoes a trade
correlation_threshold = 0.7

# Most negative simulated Sharpe delta tolerated
max_sharpe_impact = -0.05

# Candidate-risk to portfolio-risk ratio cap
max_risk_ratio = 0.3

# Per-trade risk as a fraction of equity
risk_per_trade_fraction = 0.01

[learning]
# Recalibrate every N trades or D days, whichever first
recalibration_trades = 20
recalibration_days = 7

# Feature-weight bounds
weight_min = 0.1
weight_max = 2.0

# Exponential decay toward calibrated values
decay_old = 0.95
nudge = 1.02
";

    std::fs::write(path, template)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.min_threshold, 0.001);
        assert_eq!(config.thresholds.max_threshold, 0.2);
        assert_eq!(config.portfolio.correlation_threshold, 0.7);
    }

    #[test]
    fn test_config_round_trip() {
        let config = EngineConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(
            config.costs.impact_lambda,
            deserialized.costs.impact_lambda
        );
        assert_eq!(
            config.learning.recalibration_trades,
            deserialized.learning.recalibration_trades
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("[costs]\nspread_base = 0.001\n").unwrap();
        assert_eq!(config.costs.spread_base, 0.001);
        assert_eq!(config.costs.slippage_base, 0.0002);
        assert_eq!(config.thresholds.momentum, 0.9);
    }
}
