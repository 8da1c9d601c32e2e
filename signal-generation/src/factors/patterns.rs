// Candlestick pattern analyzer

use common::{Candle, FactorCategory, MarketSnapshot};

use crate::factors::FactorAnalyzer;
use crate::signals::{FactorDirection, TechnicalFactor};

/// Scans the most recent candles for reversal/indecision patterns
#[derive(Debug, Clone, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    fn body(candle: &Candle) -> f64 {
        (candle.close - candle.open).abs()
    }

    fn range(candle: &Candle) -> f64 {
        candle.high - candle.low
    }

    fn is_bullish(candle: &Candle) -> bool {
        candle.close > candle.open
    }
}

impl FactorAnalyzer for PatternAnalyzer {
    fn category(&self) -> FactorCategory {
        FactorCategory::Pattern
    }

    fn analyze(&self, snapshot: &MarketSnapshot) -> Vec<TechnicalFactor> {
        let candles = &snapshot.candles;
        if candles.len() < 3 {
            return Vec::new();
        }

        let mut factors = Vec::new();
        let last = &candles[candles.len() - 1];
        let prev = &candles[candles.len() - 2];

        let last_body = Self::body(last);
        let prev_body = Self::body(prev);
        let last_range = Self::range(last);

        // Engulfing: current body swallows the previous, opposite color.
        if last_body > prev_body * 1.2 && prev_body > 0.0 {
            if Self::is_bullish(last)
                && !Self::is_bullish(prev)
                && last.close >= prev.open
                && last.open <= prev.close
            {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "bullish_engulfing",
                    FactorDirection::Buy,
                    6.5,
                    0.65,
                ));
            } else if !Self::is_bullish(last)
                && Self::is_bullish(prev)
                && last.close <= prev.open
                && last.open >= prev.close
            {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "bearish_engulfing",
                    FactorDirection::Sell,
                    6.5,
                    0.65,
                ));
            }
        }

        if last_range > 0.0 && last_body > 0.0 {
            let lower_wick = last.open.min(last.close) - last.low;
            let upper_wick = last.high - last.open.max(last.close);

            if lower_wick > last_body * 2.0 && upper_wick < last_body * 0.5 {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "hammer",
                    FactorDirection::Buy,
                    5.5,
                    0.6,
                ));
            } else if upper_wick > last_body * 2.0 && lower_wick < last_body * 0.5 {
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "shooting_star",
                    FactorDirection::Sell,
                    5.5,
                    0.6,
                ));
            }
        }

        // Doji: tiny body relative to range signals indecision.
        if last_range > 0.0 && last_body / last_range < 0.1 {
            factors.push(TechnicalFactor::new(
                self.category(),
                "doji_indecision",
                FactorDirection::Neutral,
                3.0,
                0.5,
            ));
        }

        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::PortfolioSnapshot;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn snapshot(candles: Vec<Candle>) -> MarketSnapshot {
        MarketSnapshot {
            pair: "EURUSD".to_string(),
            current_price: candles.last().map(|c| c.close).unwrap_or(1.0),
            volumes: vec![1000.0; candles.len()],
            candles,
            order_book: None,
            recent_trades: Vec::new(),
            news_events: Vec::new(),
            portfolio: PortfolioSnapshot::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_bullish_engulfing_detected() {
        let candles = vec![
            candle(100.0, 100.5, 99.5, 100.0),
            candle(100.0, 100.2, 99.3, 99.4),
            candle(99.3, 100.6, 99.2, 100.5),
        ];
        let factors = PatternAnalyzer.analyze(&snapshot(candles));
        assert!(factors
            .iter()
            .any(|f| f.name == "bullish_engulfing" && f.direction == FactorDirection::Buy));
    }

    #[test]
    fn test_hammer_detected() {
        let candles = vec![
            candle(100.0, 100.5, 99.5, 100.0),
            candle(100.0, 100.1, 99.9, 100.0),
            candle(100.0, 100.12, 99.0, 100.1),
        ];
        let factors = PatternAnalyzer.analyze(&snapshot(candles));
        assert!(factors.iter().any(|f| f.name == "hammer"));
    }

    #[test]
    fn test_doji_is_neutral() {
        let candles = vec![
            candle(100.0, 100.5, 99.5, 100.0),
            candle(100.0, 100.5, 99.5, 100.0),
            candle(100.0, 100.5, 99.5, 100.01),
        ];
        let factors = PatternAnalyzer.analyze(&snapshot(candles));
        assert!(factors
            .iter()
            .any(|f| f.name == "doji_indecision" && f.direction == FactorDirection::Neutral));
    }
}
