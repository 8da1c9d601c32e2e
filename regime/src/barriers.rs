// Dynamic Barrier Calculator
// Stop-loss / take-profit levels conditioned on regime volatility

use common::{Candle, TradeDirection};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::detector::MarketRegime;
use crate::indicators;

/// Stop-loss and take-profit levels for a candidate entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BarrierLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl BarrierLevels {
    /// Stop distance as a fraction of the entry price.
    pub fn stop_distance_pct(&self, entry: Decimal) -> f64 {
        if entry.is_zero() {
            return 0.0;
        }
        ((entry - self.stop_loss).abs() / entry)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Target distance as a fraction of the entry price.
    pub fn target_distance_pct(&self, entry: Decimal) -> f64 {
        if entry.is_zero() {
            return 0.0;
        }
        ((self.take_profit - entry).abs() / entry)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Reward-to-risk ratio implied by the two barriers.
    pub fn risk_reward(&self, entry: Decimal) -> f64 {
        let risk = self.stop_distance_pct(entry);
        if risk == 0.0 {
            return 0.0;
        }
        self.target_distance_pct(entry) / risk
    }
}

/// Barrier derivation tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// ATR lookback for the volatility proxy
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Stop distance in ATR multiples before regime scaling
    #[serde(default = "default_sl_atr_multiplier")]
    pub sl_atr_multiplier: f64,
    /// Fallback stop distance (fraction of entry) when ATR is unavailable
    #[serde(default = "default_fallback_sl_pct")]
    pub fallback_sl_pct: f64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            sl_atr_multiplier: default_sl_atr_multiplier(),
            fallback_sl_pct: default_fallback_sl_pct(),
        }
    }
}

fn default_atr_period() -> usize {
    14
}

fn default_sl_atr_multiplier() -> f64 {
    1.5
}

fn default_fallback_sl_pct() -> f64 {
    0.01
}

/// Derives barrier levels from entry, direction, regime and recent
/// candles. Stateless; every call is a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct BarrierCalculator {
    config: BarrierConfig,
}

impl BarrierCalculator {
    pub fn new(config: BarrierConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        entry: Decimal,
        direction: TradeDirection,
        regime: &MarketRegime,
        candles: &[Candle],
    ) -> BarrierLevels {
        let entry_f = entry.to_f64().unwrap_or(0.0);
        let atr = indicators::atr(candles, self.config.atr_period)
            .filter(|v| *v > 0.0)
            .unwrap_or(entry_f * self.config.fallback_sl_pct);

        // Wider stops in volatile regimes, tighter in quiet ones.
        let regime_scale = 0.75 + 0.5 * regime.volatility;
        let sl_distance = atr * self.config.sl_atr_multiplier * regime_scale;
        let tp_distance = sl_distance * regime.regime_type.reward_ratio();

        let sl = Decimal::from_f64(sl_distance).unwrap_or(Decimal::ZERO);
        let tp = Decimal::from_f64(tp_distance).unwrap_or(Decimal::ZERO);

        match direction {
            TradeDirection::Buy => BarrierLevels {
                stop_loss: entry - sl,
                take_profit: entry + tp,
            },
            TradeDirection::Sell => BarrierLevels {
                stop_loss: entry + sl,
                take_profit: entry - tp,
            },
        }
    }
}
