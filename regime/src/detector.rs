// Regime Detector
// Ordered-rule classification of market behavior from candles, volume and news

use chrono::{DateTime, Duration, Utc};
use common::{Candle, FactorCategory, NewsEvent, NewsImpact, OrderBook};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators;

/// Discrete market regime classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RegimeType {
    TrendingBullish,
    TrendingBearish,
    RangingTight,
    RangingVolatile,
    ShockUp,
    ShockDown,
    LiquidityCrisis,
    NewsDriven,
    Breakout,
    Consolidation,
    Neutral,
}

impl RegimeType {
    pub const ALL: [RegimeType; 11] = [
        RegimeType::TrendingBullish,
        RegimeType::TrendingBearish,
        RegimeType::RangingTight,
        RegimeType::RangingVolatile,
        RegimeType::ShockUp,
        RegimeType::ShockDown,
        RegimeType::LiquidityCrisis,
        RegimeType::NewsDriven,
        RegimeType::Breakout,
        RegimeType::Consolidation,
        RegimeType::Neutral,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RegimeType::TrendingBullish => "trending_bullish",
            RegimeType::TrendingBearish => "trending_bearish",
            RegimeType::RangingTight => "ranging_tight",
            RegimeType::RangingVolatile => "ranging_volatile",
            RegimeType::ShockUp => "shock_up",
            RegimeType::ShockDown => "shock_down",
            RegimeType::LiquidityCrisis => "liquidity_crisis",
            RegimeType::NewsDriven => "news_driven",
            RegimeType::Breakout => "breakout",
            RegimeType::Consolidation => "consolidation",
            RegimeType::Neutral => "neutral",
        }
    }

    /// Directional bias in [-1, 1]: positive favors buys, negative sells.
    pub fn directional_bias(&self) -> f64 {
        match self {
            RegimeType::TrendingBullish => 1.0,
            RegimeType::TrendingBearish => -1.0,
            RegimeType::ShockUp => 0.5,
            RegimeType::ShockDown => -0.5,
            _ => 0.0,
        }
    }

    /// Reward-to-risk ratio used when deriving take-profit distances.
    pub fn reward_ratio(&self) -> f64 {
        match self {
            RegimeType::TrendingBullish | RegimeType::TrendingBearish => 2.5,
            RegimeType::Breakout => 2.2,
            RegimeType::RangingTight | RegimeType::RangingVolatile => 1.6,
            RegimeType::ShockUp | RegimeType::ShockDown => 1.2,
            RegimeType::LiquidityCrisis => 1.0,
            RegimeType::NewsDriven => 1.8,
            RegimeType::Consolidation => 1.6,
            RegimeType::Neutral => 2.0,
        }
    }

    /// Typical holding time for a trade opened in this regime.
    pub fn base_holding_minutes(&self) -> f64 {
        match self {
            RegimeType::TrendingBullish | RegimeType::TrendingBearish => 240.0,
            RegimeType::Breakout => 180.0,
            RegimeType::RangingTight => 480.0,
            RegimeType::RangingVolatile => 360.0,
            RegimeType::ShockUp | RegimeType::ShockDown => 60.0,
            RegimeType::LiquidityCrisis => 45.0,
            RegimeType::NewsDriven => 90.0,
            RegimeType::Consolidation => 600.0,
            RegimeType::Neutral => 300.0,
        }
    }

    pub fn is_crisis(&self) -> bool {
        matches!(
            self,
            RegimeType::LiquidityCrisis | RegimeType::ShockUp | RegimeType::ShockDown
        )
    }
}

/// Per-category factor strength multipliers applied by the base model
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdjustmentFactors {
    pub technical: f64,
    pub pattern: f64,
    pub volume: f64,
    pub momentum: f64,
}

impl AdjustmentFactors {
    pub fn unit() -> Self {
        Self {
            technical: 1.0,
            pattern: 1.0,
            volume: 1.0,
            momentum: 1.0,
        }
    }

    pub fn get(&self, category: FactorCategory) -> f64 {
        match category {
            FactorCategory::Technical => self.technical,
            FactorCategory::Pattern => self.pattern,
            FactorCategory::Volume => self.volume,
            FactorCategory::Momentum => self.momentum,
        }
    }

    fn for_regime(regime_type: RegimeType) -> Self {
        let (technical, pattern, volume, momentum) = match regime_type {
            RegimeType::TrendingBullish | RegimeType::TrendingBearish => (1.1, 0.9, 1.0, 1.3),
            RegimeType::RangingTight => (1.2, 1.1, 0.8, 0.7),
            RegimeType::RangingVolatile => (0.9, 1.0, 1.0, 0.8),
            RegimeType::ShockUp | RegimeType::ShockDown => (0.7, 0.6, 1.2, 1.1),
            RegimeType::LiquidityCrisis => (0.5, 0.5, 0.8, 0.6),
            RegimeType::NewsDriven => (0.8, 0.7, 1.1, 1.0),
            RegimeType::Breakout => (1.0, 1.1, 1.3, 1.2),
            RegimeType::Consolidation => (1.1, 1.2, 0.8, 0.6),
            RegimeType::Neutral => (1.0, 1.0, 1.0, 1.0),
        };
        Self {
            technical,
            pattern,
            volume,
            momentum,
        }
    }
}

/// Market regime with confidence and risk context.
///
/// Recomputed on every cycle and passed by value through the pipeline;
/// no component holds a mutable reference to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub regime_type: RegimeType,
    pub volatility: f64,
    pub confidence: f64,
    pub risk_multiplier: f64,
    pub market_depth: f64,
    pub adjustment_factors: AdjustmentFactors,
}

impl MarketRegime {
    /// Low-confidence fallback when there is not enough data to classify.
    pub fn neutral() -> Self {
        Self {
            regime_type: RegimeType::Neutral,
            volatility: 0.5,
            confidence: 0.2,
            risk_multiplier: 1.0,
            market_depth: 0.5,
            adjustment_factors: AdjustmentFactors::unit(),
        }
    }
}

/// Tunables for the regime classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeDetectorConfig {
    /// Minimum candles required for a full classification
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    /// ATR lookback period
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// ATR-to-price ratio mapped to volatility = 1.0
    #[serde(default = "default_max_atr_ratio")]
    pub max_atr_ratio: f64,
    /// Absolute 3-bar return that counts as a shock
    #[serde(default = "default_shock_return")]
    pub shock_return: f64,
    /// Order-book depth below which the market is in liquidity crisis
    #[serde(default = "default_crisis_depth")]
    pub crisis_depth_units: f64,
    /// Order-book depth mapped to market_depth = 1.0
    #[serde(default = "default_full_depth")]
    pub full_depth_units: f64,
    /// High-impact news within this window drives the news regime (minutes)
    #[serde(default = "default_news_window")]
    pub news_window_minutes: i64,
    /// Volume surge ratio (vs 20-bar average) that supports a breakout
    #[serde(default = "default_volume_surge")]
    pub volume_surge_ratio: f64,
    /// Minimum 20-bar absolute return for a trend
    #[serde(default = "default_trend_return")]
    pub trend_return: f64,
    /// Bollinger width (relative to mid) under which the range is tight
    #[serde(default = "default_tight_band_width")]
    pub tight_band_width: f64,
}

impl Default for RegimeDetectorConfig {
    fn default() -> Self {
        Self {
            min_candles: default_min_candles(),
            atr_period: default_atr_period(),
            max_atr_ratio: default_max_atr_ratio(),
            shock_return: default_shock_return(),
            crisis_depth_units: default_crisis_depth(),
            full_depth_units: default_full_depth(),
            news_window_minutes: default_news_window(),
            volume_surge_ratio: default_volume_surge(),
            trend_return: default_trend_return(),
            tight_band_width: default_tight_band_width(),
        }
    }
}

fn default_min_candles() -> usize {
    20
}

fn default_atr_period() -> usize {
    14
}

fn default_max_atr_ratio() -> f64 {
    0.04
}

fn default_shock_return() -> f64 {
    0.025
}

fn default_crisis_depth() -> f64 {
    10_000.0
}

fn default_full_depth() -> f64 {
    50_000.0
}

fn default_news_window() -> i64 {
    60
}

fn default_volume_surge() -> f64 {
    1.8
}

fn default_trend_return() -> f64 {
    0.01
}

fn default_tight_band_width() -> f64 {
    0.012
}

/// Classifies the current market regime. Pure and deterministic: the
/// same inputs always produce the same regime.
#[derive(Debug, Clone, Default)]
pub struct RegimeDetector {
    config: RegimeDetectorConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeDetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        candles: &[Candle],
        order_book: Option<&OrderBook>,
        news: &[NewsEvent],
        now: DateTime<Utc>,
    ) -> MarketRegime {
        if candles.len() < self.config.min_candles {
            debug!(
                candles = candles.len(),
                min = self.config.min_candles,
                "Insufficient candles, falling back to neutral regime"
            );
            return MarketRegime::neutral();
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let last_close = *closes.last().unwrap_or(&0.0);

        let atr = indicators::atr(candles, self.config.atr_period).unwrap_or(0.0);
        let atr_ratio = if last_close > 0.0 { atr / last_close } else { 0.0 };
        let volatility = (atr_ratio / self.config.max_atr_ratio).clamp(0.0, 1.0);

        let r3 = indicators::roc(&closes, 3).unwrap_or(0.0);
        let r20 = indicators::roc(&closes, self.config.min_candles.min(20)).unwrap_or(0.0);
        let band = indicators::bollinger(&closes, 20, 2.0);
        let volume_ratio = match (volumes.last(), indicators::sma(&volumes, 20)) {
            (Some(&last), Some(avg)) if avg > 0.0 => last / avg,
            _ => 1.0,
        };

        let market_depth = order_book
            .map(|book| (book.total_depth() / self.config.full_depth_units).clamp(0.0, 1.0))
            .unwrap_or(0.5);

        let (regime_type, confidence, risk_multiplier) = self.classify(
            r3,
            r20,
            volatility,
            volume_ratio,
            band,
            last_close,
            order_book,
            news,
            now,
        );

        debug!(
            regime = regime_type.key(),
            volatility = format!("{:.3}", volatility),
            confidence = format!("{:.2}", confidence),
            "Regime classified"
        );

        MarketRegime {
            regime_type,
            volatility,
            confidence,
            risk_multiplier,
            market_depth,
            adjustment_factors: AdjustmentFactors::for_regime(regime_type),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        r3: f64,
        r20: f64,
        volatility: f64,
        volume_ratio: f64,
        band: Option<(f64, f64, f64)>,
        last_close: f64,
        order_book: Option<&OrderBook>,
        news: &[NewsEvent],
        now: DateTime<Utc>,
    ) -> (RegimeType, f64, f64) {
        // Rules are ordered most-severe first; the first match wins.
        if r3.abs() >= self.config.shock_return {
            let regime = if r3 > 0.0 {
                RegimeType::ShockUp
            } else {
                RegimeType::ShockDown
            };
            let confidence = (0.6 + (r3.abs() / self.config.shock_return - 1.0) * 0.2).min(0.9);
            return (regime, confidence, 2.0);
        }

        if let Some(book) = order_book {
            if book.total_depth() < self.config.crisis_depth_units {
                return (RegimeType::LiquidityCrisis, 0.8, 2.5);
            }
        }

        let news_window = Duration::minutes(self.config.news_window_minutes);
        let near_high_impact = news.iter().any(|event| {
            event.impact == NewsImpact::High
                && (event.time - now).abs() <= news_window
        });
        if near_high_impact {
            return (RegimeType::NewsDriven, 0.7, 1.5);
        }

        if let Some((lower, middle, upper)) = band {
            if middle > 0.0 {
                let width = (upper - lower) / middle;
                let broke_band = last_close > upper || last_close < lower;
                if broke_band && volume_ratio >= self.config.volume_surge_ratio {
                    return (RegimeType::Breakout, 0.7, 1.3);
                }

                if r20.abs() >= self.config.trend_return {
                    let regime = if r20 > 0.0 {
                        RegimeType::TrendingBullish
                    } else {
                        RegimeType::TrendingBearish
                    };
                    let strength = (r20.abs() / self.config.trend_return).min(3.0);
                    let confidence = (0.5 + strength * 0.12).min(0.9);
                    return (regime, confidence, 1.0);
                }

                if width < self.config.tight_band_width {
                    if volume_ratio < 0.8 {
                        return (RegimeType::Consolidation, 0.6, 0.9);
                    }
                    return (RegimeType::RangingTight, 0.65, 0.8);
                }
                if volatility > 0.5 {
                    return (RegimeType::RangingVolatile, 0.6, 1.2);
                }
            }
        }

        (RegimeType::Neutral, 0.4, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::BookLevel;

    fn candle(ts: DateTime<Utc>, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: close,
            high: close * 1.002,
            low: close * 0.998,
            close,
            volume,
        }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| candle(start + Duration::minutes(i as i64 * 5), c, 1000.0))
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_insufficient_candles_returns_neutral() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let candles = series(&[100.0, 100.5, 101.0]);
        let regime = detector.detect(&candles, None, &[], now());
        assert_eq!(regime.regime_type, RegimeType::Neutral);
        assert!(regime.confidence <= 0.3);
    }

    #[test]
    fn test_steady_uptrend_classified_bullish() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * (1.0 + 0.002 * i as f64)).collect();
        let regime = detector.detect(&series(&closes), None, &[], now());
        assert_eq!(regime.regime_type, RegimeType::TrendingBullish);
        assert!(regime.confidence > 0.5);
    }

    #[test]
    fn test_shock_move_detected() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let mut closes: Vec<f64> = vec![100.0; 30];
        closes.extend_from_slice(&[100.0, 98.5, 96.0]);
        let regime = detector.detect(&series(&closes), None, &[], now());
        assert_eq!(regime.regime_type, RegimeType::ShockDown);
        assert!(regime.risk_multiplier >= 2.0);
    }

    #[test]
    fn test_thin_book_is_liquidity_crisis() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let closes: Vec<f64> = vec![100.0; 40];
        let book = OrderBook {
            bids: vec![BookLevel {
                price: 99.9,
                size: 2_000.0,
            }],
            asks: vec![BookLevel {
                price: 100.1,
                size: 3_000.0,
            }],
            spread: 0.2,
            timestamp: now(),
        };
        let regime = detector.detect(&series(&closes), Some(&book), &[], now());
        assert_eq!(regime.regime_type, RegimeType::LiquidityCrisis);
    }

    #[test]
    fn test_high_impact_news_drives_regime() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let closes: Vec<f64> = vec![100.0; 40];
        let news = vec![NewsEvent {
            time: now() + Duration::minutes(30),
            currency: "USD".to_string(),
            impact: NewsImpact::High,
        }];
        let regime = detector.detect(&series(&closes), None, &news, now());
        assert_eq!(regime.regime_type, RegimeType::NewsDriven);
    }

    #[test]
    fn test_determinism() {
        let detector = RegimeDetector::new(RegimeDetectorConfig::default());
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let candles = series(&closes);
        let a = detector.detect(&candles, None, &[], now());
        let b = detector.detect(&candles, None, &[], now());
        assert_eq!(a.regime_type, b.regime_type);
        assert_eq!(a.volatility, b.volatility);
        assert_eq!(a.confidence, b.confidence);
    }
}
