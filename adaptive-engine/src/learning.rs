//! Online learning
//!
//! Per-regime feature weights, one multiplier per factor category,
//! nudged toward recently profitable categories at each recalibration.

use chrono::{DateTime, Duration, Utc};
use common::FactorCategory;
use regime::RegimeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::config::LearningConfig;

/// Mutable learning state for one regime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineLearningState {
    pub regime_type: RegimeType,
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub volatility: f64,
    pub last_calibration: Option<DateTime<Utc>>,
    pub feature_weights: HashMap<FactorCategory, f64>,
    trades_since_calibration: usize,
    wins: usize,
    m2: f64,
    category_pnl: HashMap<FactorCategory, f64>,
}

impl OnlineLearningState {
    fn new(regime_type: RegimeType) -> Self {
        let feature_weights = FactorCategory::ALL
            .iter()
            .map(|category| (*category, 1.0))
            .collect();
        Self {
            regime_type,
            total_trades: 0,
            win_rate: 0.0,
            avg_return: 0.0,
            volatility: 0.0,
            last_calibration: None,
            feature_weights,
            trades_since_calibration: 0,
            wins: 0,
            m2: 0.0,
            category_pnl: HashMap::new(),
        }
    }

    /// Welford running update of mean/variance plus win tracking.
    fn observe(&mut self, pnl_r: f64) {
        self.total_trades += 1;
        self.trades_since_calibration += 1;
        if pnl_r > 0.0 {
            self.wins += 1;
        }
        self.win_rate = self.wins as f64 / self.total_trades as f64;

        let delta = pnl_r - self.avg_return;
        self.avg_return += delta / self.total_trades as f64;
        self.m2 += delta * (pnl_r - self.avg_return);
        if self.total_trades > 1 {
            self.volatility = (self.m2 / (self.total_trades - 1) as f64).sqrt();
        }
    }
}

/// Owns all per-regime learning states
#[derive(Debug)]
pub struct LearningManager {
    states: HashMap<RegimeType, OnlineLearningState>,
    config: LearningConfig,
}

impl LearningManager {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            states: HashMap::new(),
            config,
        }
    }

    /// Feature weights for the regime; unit weights before any learning.
    pub fn weights(&self, regime_type: RegimeType) -> HashMap<FactorCategory, f64> {
        self.states
            .get(&regime_type)
            .map(|s| s.feature_weights.clone())
            .unwrap_or_else(|| {
                FactorCategory::ALL
                    .iter()
                    .map(|category| (*category, 1.0))
                    .collect()
            })
    }

    pub fn state(&self, regime_type: RegimeType) -> Option<&OnlineLearningState> {
        self.states.get(&regime_type)
    }

    /// Record a realized trade with the factor categories that voted for
    /// it. Recalibrates after 20 trades or 7 days, whichever first.
    pub fn record_trade(
        &mut self,
        regime_type: RegimeType,
        categories: &[FactorCategory],
        pnl_r: f64,
        now: DateTime<Utc>,
    ) {
        let config = self.config.clone();
        let state = self
            .states
            .entry(regime_type)
            .or_insert_with(|| OnlineLearningState::new(regime_type));

        state.observe(pnl_r);
        for category in categories {
            *state.category_pnl.entry(*category).or_insert(0.0) += pnl_r;
        }

        let due_by_trades = state.trades_since_calibration >= config.recalibration_trades;
        let due_by_time = state
            .last_calibration
            .map(|last| now - last >= Duration::days(config.recalibration_days))
            .unwrap_or(false);

        if due_by_trades || due_by_time {
            Self::recalibrate(state, &config, now);
        }
    }

    fn recalibrate(state: &mut OnlineLearningState, config: &LearningConfig, now: DateTime<Utc>) {
        for category in FactorCategory::ALL {
            let pnl = state.category_pnl.get(&category).copied().unwrap_or(0.0);
            let weight = state.feature_weights.entry(category).or_insert(1.0);
            // Monotonic clamp-and-nudge toward the winning categories.
            let target = if pnl > 0.0 {
                (*weight * config.nudge).clamp(config.weight_min, config.weight_max)
            } else if pnl < 0.0 {
                (*weight / config.nudge).clamp(config.weight_min, config.weight_max)
            } else {
                *weight
            };
            *weight = (config.decay_old * *weight + (1.0 - config.decay_old) * target)
                .clamp(config.weight_min, config.weight_max);
        }

        state.trades_since_calibration = 0;
        state.category_pnl.clear();
        state.last_calibration = Some(now);

        info!(
            regime = state.regime_type.key(),
            total_trades = state.total_trades,
            win_rate = format!("{:.2}", state.win_rate),
            "Feature weights recalibrated"
        );
    }
}
