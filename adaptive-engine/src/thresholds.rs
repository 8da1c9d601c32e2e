//! Adaptive acceptance thresholds
//!
//! One threshold per regime, seeded from a default table and self-tuned
//! by a momentum-smoothed performance gradient. The [min, max] bounds
//! hold under every update path.

use chrono::{DateTime, Duration, Utc};
use common::BoundedHistory;
use regime::RegimeType;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::ThresholdConfig;

/// Rolling performance behind one regime's threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ThresholdPerformance {
    pub accuracy: f64,
    pub profitability: f64,
    pub sharpe: f64,
    pub drawdown: f64,
}

/// Minimum net edge to accept a trade in one regime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    pub regime_type: RegimeType,
    pub threshold: f64,
    pub confidence: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub performance: ThresholdPerformance,
    velocity: f64,
    returns: BoundedHistory<f64>,
}

impl AdaptiveThreshold {
    fn seeded(regime_type: RegimeType) -> Self {
        Self {
            regime_type,
            threshold: default_threshold(regime_type),
            confidence: 0.5,
            last_update: None,
            performance: ThresholdPerformance::default(),
            velocity: 0.0,
            returns: BoundedHistory::new(100),
        }
    }

    pub fn trades_recorded(&self) -> usize {
        self.returns.len()
    }
}

/// Default acceptance thresholds per regime (net edge, fractional)
fn default_threshold(regime_type: RegimeType) -> f64 {
    match regime_type {
        RegimeType::TrendingBullish | RegimeType::TrendingBearish => 0.015,
        RegimeType::RangingTight => 0.008,
        RegimeType::RangingVolatile => 0.012,
        RegimeType::ShockUp | RegimeType::ShockDown => 0.025,
        RegimeType::LiquidityCrisis => 0.030,
        RegimeType::NewsDriven => 0.020,
        RegimeType::Breakout => 0.018,
        RegimeType::Consolidation => 0.010,
        RegimeType::Neutral => 0.015,
    }
}

/// Owns every regime's threshold state. Single writer: the engine
/// mutates it only inside a decision cycle or an outcome update.
#[derive(Debug)]
pub struct ThresholdManager {
    thresholds: HashMap<RegimeType, AdaptiveThreshold>,
    config: ThresholdConfig,
}

impl ThresholdManager {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            thresholds: HashMap::new(),
            config,
        }
    }

    /// Current threshold for a regime, seeding the default on first use.
    pub fn current(&mut self, regime_type: RegimeType) -> f64 {
        self.entry(regime_type).threshold
    }

    /// Read-only view for reporting; does not seed.
    pub fn get(&self, regime_type: RegimeType) -> Option<&AdaptiveThreshold> {
        self.thresholds.get(&regime_type)
    }

    fn entry(&mut self, regime_type: RegimeType) -> &mut AdaptiveThreshold {
        self.thresholds
            .entry(regime_type)
            .or_insert_with(|| AdaptiveThreshold::seeded(regime_type))
    }

    /// Record a realized trade return (R multiples) for a regime and
    /// run the gradient update when the gating conditions are met.
    pub fn record_trade(&mut self, regime_type: RegimeType, pnl_r: f64, now: DateTime<Utc>) {
        let config = self.config.clone();
        let entry = self.entry(regime_type);
        entry.returns.push(pnl_r);

        if entry.returns.len() < config.min_trades_for_update {
            return;
        }
        if let Some(last) = entry.last_update {
            if now - last < Duration::hours(config.update_interval_hours) {
                return;
            }
        }

        let returns: Vec<f64> = entry.returns.iter().copied().collect();
        let mean = returns.iter().copied().mean();
        let std = returns.iter().copied().std_dev();
        let sharpe = if std > 0.0 { mean / std } else { 0.0 };

        let wins = returns.iter().filter(|r| **r > 0.0).count();
        let win_rate = wins as f64 / returns.len() as f64;

        let mut equity: f64 = 0.0;
        let mut peak: f64 = 0.0;
        let mut drawdown: f64 = 0.0;
        for r in &returns {
            equity += r;
            peak = peak.max(equity);
            drawdown = drawdown.max(peak - equity);
        }
        let drawdown_penalty = (drawdown / returns.len() as f64).clamp(0.0, 1.0);

        // Positive gradient raises the bar; good performance lowers it.
        let gradient = -0.5 * sharpe.tanh()
            + 0.3 * (config.target_win_rate - win_rate) * 2.0
            + 0.2 * drawdown_penalty;

        entry.velocity = config.momentum * entry.velocity
            + config.learning_rate * gradient * default_threshold(regime_type);
        entry.threshold = (entry.threshold + entry.velocity)
            .clamp(config.min_threshold, config.max_threshold);
        entry.last_update = Some(now);
        entry.confidence = (returns.len() as f64 / 100.0).clamp(0.2, 0.9);
        entry.performance = ThresholdPerformance {
            accuracy: win_rate,
            profitability: mean,
            sharpe,
            drawdown: drawdown_penalty,
        };

        info!(
            regime = regime_type.key(),
            threshold = format!("{:.5}", entry.threshold),
            sharpe = format!("{:.2}", sharpe),
            win_rate = format!("{:.2}", win_rate),
            "Adaptive threshold updated"
        );
    }

    /// Auto-relaxation from the rejection feedback loop: cut the
    /// threshold by 5%, within bounds.
    pub fn relax(&mut self, regime_type: RegimeType) {
        let min = self.config.min_threshold;
        let max = self.config.max_threshold;
        let entry = self.entry(regime_type);
        let before = entry.threshold;
        entry.threshold = (entry.threshold * 0.95).clamp(min, max);
        debug!(
            regime = regime_type.key(),
            before = format!("{:.5}", before),
            after = format!("{:.5}", entry.threshold),
            "Threshold relaxed after rejection pattern"
        );
    }
}
