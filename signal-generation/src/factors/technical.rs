// Technical factor analyzer
// Oscillator extremes, moving-average crosses and band touches

use common::{FactorCategory, MarketSnapshot};
use regime::indicators;
use tracing::debug;

use crate::factors::FactorAnalyzer;
use crate::signals::{FactorDirection, TechnicalFactor};

/// Scans RSI, SMA crosses and Bollinger bands
#[derive(Debug, Clone, Default)]
pub struct TechnicalAnalyzer;

impl FactorAnalyzer for TechnicalAnalyzer {
    fn category(&self) -> FactorCategory {
        FactorCategory::Technical
    }

    fn analyze(&self, snapshot: &MarketSnapshot) -> Vec<TechnicalFactor> {
        let closes: Vec<f64> = snapshot.candles.iter().map(|c| c.close).collect();
        if closes.len() < 21 {
            debug!("Not enough closes for technical factors");
            return Vec::new();
        }

        let mut factors = Vec::new();

        if let Some(rsi) = indicators::rsi(&closes, 14) {
            if rsi <= 30.0 {
                let strength = ((30.0 - rsi) / 30.0 * 10.0).min(10.0).max(3.0);
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "rsi_oversold",
                    FactorDirection::Buy,
                    strength,
                    0.65,
                ));
            } else if rsi >= 70.0 {
                let strength = ((rsi - 70.0) / 30.0 * 10.0).min(10.0).max(3.0);
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "rsi_overbought",
                    FactorDirection::Sell,
                    strength,
                    0.65,
                ));
            }
        }

        let fast = indicators::sma(&closes, 10);
        let slow = indicators::sma(&closes, 20);
        let prev_fast = indicators::sma(&closes[..closes.len() - 1], 10);
        let prev_slow = indicators::sma(&closes[..closes.len() - 1], 20);
        if let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow)) =
            (fast, slow, prev_fast, prev_slow)
        {
            // Fresh cross is a stronger vote than standing separation.
            let crossed_up = prev_fast <= prev_slow && fast > slow;
            let crossed_down = prev_fast >= prev_slow && fast < slow;
            if crossed_up {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "sma_cross_up",
                    FactorDirection::Buy,
                    7.0,
                    0.7,
                ));
            } else if crossed_down {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "sma_cross_down",
                    FactorDirection::Sell,
                    7.0,
                    0.7,
                ));
            } else if slow > 0.0 {
                let separation = (fast - slow) / slow;
                if separation.abs() > 0.002 {
                    let direction = if separation > 0.0 {
                        FactorDirection::Buy
                    } else {
                        FactorDirection::Sell
                    };
                    let strength = (separation.abs() * 1000.0).min(6.0).max(3.0);
                    factors.push(TechnicalFactor::new(
                        self.category(),
                        "sma_alignment",
                        direction,
                        strength,
                        0.55,
                    ));
                }
            }
        }

        if let Some((lower, _middle, upper)) = indicators::bollinger(&closes, 20, 2.0) {
            let last = closes[closes.len() - 1];
            if last <= lower {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "bollinger_lower_touch",
                    FactorDirection::Buy,
                    5.0,
                    0.6,
                ));
            } else if last >= upper {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "bollinger_upper_touch",
                    FactorDirection::Sell,
                    5.0,
                    0.6,
                ));
            }
        }

        factors
    }
}
