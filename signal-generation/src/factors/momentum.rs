// Momentum factor analyzer
// Rate-of-change over short and medium lookbacks, plus acceleration

use common::{FactorCategory, MarketSnapshot};
use regime::indicators;

use crate::factors::FactorAnalyzer;
use crate::signals::{FactorDirection, TechnicalFactor};

/// Scans 5- and 10-bar rate of change
#[derive(Debug, Clone)]
pub struct MomentumAnalyzer {
    /// Absolute ROC below this is treated as noise
    pub min_roc: f64,
}

impl Default for MomentumAnalyzer {
    fn default() -> Self {
        Self { min_roc: 0.003 }
    }
}

impl MomentumAnalyzer {
    fn roc_factor(&self, name: &str, value: f64, confidence: f64) -> Option<TechnicalFactor> {
        if value.abs() < self.min_roc {
            return None;
        }
        let direction = if value > 0.0 {
            FactorDirection::Buy
        } else {
            FactorDirection::Sell
        };
        let strength = (value.abs() / self.min_roc).min(9.0).max(3.0);
        Some(TechnicalFactor::new(
            FactorCategory::Momentum,
            name,
            direction,
            strength,
            confidence,
        ))
    }
}

impl FactorAnalyzer for MomentumAnalyzer {
    fn category(&self) -> FactorCategory {
        FactorCategory::Momentum
    }

    fn analyze(&self, snapshot: &MarketSnapshot) -> Vec<TechnicalFactor> {
        let closes: Vec<f64> = snapshot.candles.iter().map(|c| c.close).collect();
        if closes.len() < 11 {
            return Vec::new();
        }

        let mut factors = Vec::new();

        let roc5 = indicators::roc(&closes, 5);
        let roc10 = indicators::roc(&closes, 10);

        if let Some(value) = roc5 {
            if let Some(factor) = self.roc_factor("roc_5", value, 0.6) {
                factors.push(factor);
            }
        }
        if let Some(value) = roc10 {
            if let Some(factor) = self.roc_factor("roc_10", value, 0.55) {
                factors.push(factor);
            }
        }

        // Acceleration: short-horizon momentum outrunning the medium one.
        if let (Some(short), Some(medium)) = (roc5, roc10) {
            let acceleration = short - medium / 2.0;
            if acceleration.abs() > self.min_roc && short.signum() == acceleration.signum() {
                let direction = if acceleration > 0.0 {
                    FactorDirection::Buy
                } else {
                    FactorDirection::Sell
                };
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "momentum_acceleration",
                    direction,
                    (acceleration.abs() / self.min_roc * 2.0).min(8.0).max(3.0),
                    0.5,
                ));
            }
        }

        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Candle, PortfolioSnapshot};

    fn snapshot(closes: &[f64]) -> MarketSnapshot {
        MarketSnapshot {
            pair: "EURUSD".to_string(),
            candles: closes
                .iter()
                .map(|&c| Candle {
                    timestamp: Utc::now(),
                    open: c,
                    high: c + 0.1,
                    low: c - 0.1,
                    close: c,
                    volume: 1000.0,
                })
                .collect(),
            current_price: *closes.last().unwrap_or(&1.0),
            volumes: vec![1000.0; closes.len()],
            order_book: None,
            recent_trades: Vec::new(),
            news_events: Vec::new(),
            portfolio: PortfolioSnapshot::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_strong_rally_emits_buy_momentum() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + 0.005 * i as f64)).collect();
        let factors = MomentumAnalyzer::default().analyze(&snapshot(&closes));
        assert!(factors.len() >= 2);
        assert!(factors.iter().all(|f| f.direction == FactorDirection::Buy));
    }

    #[test]
    fn test_flat_market_emits_nothing() {
        let closes = vec![100.0; 20];
        let factors = MomentumAnalyzer::default().analyze(&snapshot(&closes));
        assert!(factors.is_empty());
    }

    #[test]
    fn test_selloff_emits_sell_momentum() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 - 0.004 * i as f64)).collect();
        let factors = MomentumAnalyzer::default().analyze(&snapshot(&closes));
        assert!(factors
            .iter()
            .any(|f| f.name == "roc_5" && f.direction == FactorDirection::Sell));
    }
}
