// Volume factor analyzer
// Spike detection and on-balance-volume trend

use common::{FactorCategory, MarketSnapshot};
use regime::indicators;

use crate::factors::FactorAnalyzer;
use crate::signals::{FactorDirection, TechnicalFactor};

/// Scans volume surges and OBV accumulation/distribution
#[derive(Debug, Clone)]
pub struct VolumeAnalyzer {
    /// Last-bar volume vs 20-bar average that counts as a spike
    pub spike_ratio: f64,
}

impl Default for VolumeAnalyzer {
    fn default() -> Self {
        Self { spike_ratio: 2.0 }
    }
}

impl FactorAnalyzer for VolumeAnalyzer {
    fn category(&self) -> FactorCategory {
        FactorCategory::Volume
    }

    fn analyze(&self, snapshot: &MarketSnapshot) -> Vec<TechnicalFactor> {
        let candles = &snapshot.candles;
        if candles.len() < 21 {
            return Vec::new();
        }

        let mut factors = Vec::new();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        if let (Some(&last_volume), Some(avg)) =
            (volumes.last(), indicators::sma(&volumes[..volumes.len() - 1], 20))
        {
            if avg > 0.0 && last_volume / avg >= self.spike_ratio {
                let last = &candles[candles.len() - 1];
                // A spike confirms whichever way the bar resolved.
                let direction = if last.close > last.open {
                    FactorDirection::Buy
                } else if last.close < last.open {
                    FactorDirection::Sell
                } else {
                    FactorDirection::Neutral
                };
                let strength = ((last_volume / avg - 1.0) * 3.0).min(9.0).max(3.0);
                factors.push(TechnicalFactor::new(
                    self.category(),
                    "volume_spike",
                    direction,
                    strength,
                    0.6,
                ));
            }
        }

        let obv = indicators::obv(candles);
        if obv.len() >= 10 {
            let recent = &obv[obv.len() - 10..];
            let delta = recent[recent.len() - 1] - recent[0];
            let total_volume: f64 = volumes[volumes.len() - 10..].iter().sum();
            if total_volume > 0.0 {
                let slope = delta / total_volume;
                if slope.abs() > 0.15 {
                    let direction = if slope > 0.0 {
                        FactorDirection::Buy
                    } else {
                        FactorDirection::Sell
                    };
                    factors.push(TechnicalFactor::new(
                        self.category(),
                        "obv_trend",
                        direction,
                        (slope.abs() * 10.0).min(8.0).max(3.0),
                        0.55,
                    ));
                }
            }
        }

        factors
    }
}
