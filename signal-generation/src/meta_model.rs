// Meta Model (Layer 2)
// Risk decomposition and take-profit-first probability for one candidate

use chrono::Timelike;
use common::{MarketSnapshot, NewsImpact, TradeDirection};
use regime::{indicators, BarrierLevels, MarketRegime, RegimeType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::SignalArchive;
use crate::signals::{CandidateSignal, ExpectedOutcome, MetaPrediction};

/// Monte-Carlo interval settings. The seed makes the whole pipeline
/// reproducible; trial count and jitters are calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Probability resample range (+/-)
    #[serde(default = "default_probability_jitter")]
    pub probability_jitter: f64,
    /// R-multiple resample range (+/-)
    #[serde(default = "default_rr_jitter")]
    pub rr_jitter: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            seed: default_seed(),
            probability_jitter: default_probability_jitter(),
            rr_jitter: default_rr_jitter(),
        }
    }
}

fn default_trials() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

fn default_probability_jitter() -> f64 {
    0.10
}

fn default_rr_jitter() -> f64 {
    0.5
}

/// Meta model tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaModelConfig {
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
    /// Risk blend weights: volatility / liquidity / event
    #[serde(default = "default_vol_weight")]
    pub volatility_weight: f64,
    #[serde(default = "default_liq_weight")]
    pub liquidity_weight: f64,
    #[serde(default = "default_event_weight")]
    pub event_weight: f64,
    /// Resolved same-regime signals required before history adjusts p
    #[serde(default = "default_min_history")]
    pub min_history_for_adjustment: usize,
    /// ATR-to-price ratio treated as maximal volatility risk
    #[serde(default = "default_max_risk_atr_ratio")]
    pub max_risk_atr_ratio: f64,
}

impl Default for MetaModelConfig {
    fn default() -> Self {
        Self {
            monte_carlo: MonteCarloConfig::default(),
            volatility_weight: default_vol_weight(),
            liquidity_weight: default_liq_weight(),
            event_weight: default_event_weight(),
            min_history_for_adjustment: default_min_history(),
            max_risk_atr_ratio: default_max_risk_atr_ratio(),
        }
    }
}

fn default_vol_weight() -> f64 {
    0.4
}

fn default_liq_weight() -> f64 {
    0.3
}

fn default_event_weight() -> f64 {
    0.3
}

fn default_min_history() -> usize {
    5
}

fn default_max_risk_atr_ratio() -> f64 {
    0.02
}

/// Layer-2 probability and risk estimator
#[derive(Debug, Clone, Default)]
pub struct MetaModel {
    config: MetaModelConfig,
}

impl MetaModel {
    pub fn new(config: MetaModelConfig) -> Self {
        Self { config }
    }

    pub fn predict(
        &self,
        candidate: &CandidateSignal,
        barriers: &BarrierLevels,
        regime: &MarketRegime,
        snapshot: &MarketSnapshot,
        archive: &SignalArchive,
    ) -> MetaPrediction {
        let volatility_risk = self.volatility_risk(snapshot, regime);
        let liquidity_risk = self.liquidity_risk(snapshot, regime);
        let event_risk = self.event_risk(snapshot);
        let combined_risk = (self.config.volatility_weight * volatility_risk
            + self.config.liquidity_weight * liquidity_risk
            + self.config.event_weight * event_risk)
            .clamp(0.0, 1.0);

        let rr = barriers.risk_reward(candidate.entry_price);
        let base = self.base_probability(candidate, rr, regime, archive);

        // Risk compresses the achievable probability, bounded so a bad
        // environment cannot erase a strong setup entirely.
        let risk_factor = (1.3 - 0.8 * combined_risk).clamp(0.5, 1.3);
        let probability = (base * risk_factor).clamp(0.05, 0.95);

        let confidence_interval = self.monte_carlo_interval(probability, rr);

        let tp_return = barriers.target_distance_pct(candidate.entry_price);
        let sl_return = barriers.stop_distance_pct(candidate.entry_price);
        let expected_return = probability * tp_return - (1.0 - probability) * sl_return;
        let expected_r = probability * rr - (1.0 - probability);

        let expected_outcome = ExpectedOutcome {
            expected_return,
            expected_holding_minutes: regime.regime_type.base_holding_minutes()
                * (1.0 + regime.volatility - 0.5),
            risk_adjusted_return: expected_r / combined_risk.max(0.1),
            max_drawdown_risk: ((1.0 - probability) * (0.5 + combined_risk)).clamp(0.0, 1.0),
        };

        debug!(
            signal_id = %candidate.id,
            probability = format!("{:.3}", probability),
            combined_risk = format!("{:.3}", combined_risk),
            "Meta prediction computed"
        );

        MetaPrediction {
            signal_id: candidate.id,
            probability_tp_first: probability,
            volatility_risk,
            liquidity_risk,
            event_risk,
            combined_risk,
            expected_outcome,
            confidence_interval,
            regime_type: regime.regime_type,
            market_conditions: format!(
                "{} regime, volatility {:.2}, market depth {:.2}",
                regime.regime_type.key(),
                regime.volatility,
                regime.market_depth
            ),
        }
    }

    fn volatility_risk(&self, snapshot: &MarketSnapshot, regime: &MarketRegime) -> f64 {
        let closes: Vec<f64> = snapshot.candles.iter().map(|c| c.close).collect();
        let atr_component = indicators::atr(&snapshot.candles, 14)
            .and_then(|atr| closes.last().map(|&c| if c > 0.0 { atr / c } else { 0.0 }))
            .map(|ratio| (ratio / self.config.max_risk_atr_ratio).clamp(0.0, 1.0))
            .unwrap_or(0.5);
        let dispersion_component = indicators::return_std(&closes, 20)
            .map(|sd| (sd / 0.01).clamp(0.0, 1.0))
            .unwrap_or(0.5);

        (0.4 * atr_component + 0.4 * regime.volatility + 0.2 * dispersion_component)
            .clamp(0.0, 1.0)
    }

    fn liquidity_risk(&self, snapshot: &MarketSnapshot, regime: &MarketRegime) -> f64 {
        let base: f64 = match regime.regime_type {
            RegimeType::LiquidityCrisis => 0.9,
            RegimeType::ShockUp | RegimeType::ShockDown => 0.7,
            RegimeType::NewsDriven => 0.6,
            RegimeType::RangingVolatile => 0.5,
            RegimeType::Breakout => 0.45,
            _ => 0.35,
        };

        // Thin overnight sessions execute worse than the main ones.
        let hour = snapshot.timestamp.hour();
        let session = if !(6..22).contains(&hour) { 0.15 } else { 0.0 };

        let volume_shortfall = match (
            snapshot.volumes.last(),
            indicators::sma(&snapshot.volumes, 20),
        ) {
            (Some(&last), Some(avg)) if avg > 0.0 && last < avg * 0.5 => 0.15,
            _ => 0.0,
        };

        (base + session + volume_shortfall).clamp(0.0, 1.0)
    }

    fn event_risk(&self, snapshot: &MarketSnapshot) -> f64 {
        let now = snapshot.timestamp;
        let mut risk: f64 = 0.0;
        for event in &snapshot.news_events {
            let impact_scale = match event.impact {
                NewsImpact::High => 1.0,
                NewsImpact::Medium => 0.5,
                NewsImpact::Low => continue,
            };
            let delta = event.time - now;
            let hours = delta.num_minutes() as f64 / 60.0;
            let proximity = if hours >= 0.0 && hours <= 24.0 {
                // Upcoming: weight rises as the event approaches.
                0.9 * (1.0 - hours / 24.0)
            } else if hours < 0.0 && hours >= -6.0 {
                // Recent: fades over six hours.
                0.7 * (1.0 - (-hours) / 6.0)
            } else {
                0.0
            };
            risk = risk.max(proximity * impact_scale);
        }
        risk.clamp(0.0, 1.0)
    }

    fn base_probability(
        &self,
        candidate: &CandidateSignal,
        rr: f64,
        regime: &MarketRegime,
        archive: &SignalArchive,
    ) -> f64 {
        let strength_term =
            ((candidate.avg_factor_strength() / 10.0).clamp(0.0, 1.0) - 0.5) * 0.2;
        let confluence_bonus =
            ((candidate.factors.len().saturating_sub(3)) as f64 * 0.02).min(0.10);
        // Farther targets are hit first less often.
        let rr_term = ((2.0 - rr) * 0.03).clamp(-0.08, 0.05);

        let direction_sign = match candidate.direction {
            TradeDirection::Buy => 1.0,
            TradeDirection::Sell => -1.0,
        };
        let alignment = regime.regime_type.directional_bias() * direction_sign * 0.08;

        let stats = archive.regime_stats(regime.regime_type, candidate.direction);
        let history_adjustment = if stats.resolved >= self.config.min_history_for_adjustment {
            ((stats.win_rate - 0.55) * 0.2).clamp(-0.05, 0.05)
        } else {
            0.0
        };

        0.5 + strength_term + confluence_bonus + rr_term + alignment + history_adjustment
    }

    /// Resample probability and R-multiple around their point estimates
    /// and report the 5th/95th percentile of the trial probabilities.
    /// Seeded, so identical inputs give identical intervals.
    fn monte_carlo_interval(&self, probability: f64, rr: f64) -> (f64, f64) {
        let mc = &self.config.monte_carlo;
        if mc.trials == 0 {
            return (probability, probability);
        }

        let mut rng = fastrand::Rng::with_seed(mc.seed);
        let mut samples: Vec<f64> = Vec::with_capacity(mc.trials);
        for _ in 0..mc.trials {
            let p_trial = (probability + (rng.f64() * 2.0 - 1.0) * mc.probability_jitter)
                .clamp(0.01, 0.99);
            let rr_trial = (rr + (rng.f64() * 2.0 - 1.0) * mc.rr_jitter).max(0.1);
            // A wider target in the trial lowers the hit probability.
            let barrier_shift = if rr > 0.0 {
                (rr / rr_trial).powf(0.3)
            } else {
                1.0
            };
            samples.push((p_trial * barrier_shift).clamp(0.01, 0.99));
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let lo_idx = mc.trials * 5 / 100;
        let hi_idx = (mc.trials * 95 / 100).min(mc.trials - 1);
        let lo = samples[lo_idx].min(probability);
        let hi = samples[hi_idx].max(probability);
        (lo, hi)
    }
}
