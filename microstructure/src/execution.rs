// Execution Quality
// Slippage, impact, timing and sweep risk rolled into a 0-100 score

use common::{Candle, OrderBook, TradeDirection};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::liquidity::LiquidityMetrics;
use crate::order_flow::OrderFlowMetrics;

/// Execution-quality assessment for a reference order
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionQuality {
    /// Expected slippage walking the book, fraction of mid
    pub expected_slippage_pct: f64,
    /// Linear (Kyle-lambda) market impact, fraction of mid
    pub market_impact_pct: f64,
    /// Short-horizon return volatility while the order works
    pub timing_risk: f64,
    /// Probability-like sweep risk in [0, 1]
    pub sweep_risk: f64,
    /// Composite execution score, 0 (unusable) to 100 (excellent)
    pub score: f64,
}

/// Execution analyzer tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Reference order size for the depth walk
    #[serde(default = "default_reference_order")]
    pub reference_order_size: f64,
    /// Kyle-lambda impact coefficient (flagged for calibration)
    #[serde(default = "default_impact_lambda")]
    pub impact_lambda: f64,
    /// Bars used for timing-risk volatility
    #[serde(default = "default_timing_bars")]
    pub timing_risk_bars: usize,
    /// Top-of-book size under this is considered thin
    #[serde(default = "default_thin_top")]
    pub thin_top_size: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            reference_order_size: default_reference_order(),
            impact_lambda: default_impact_lambda(),
            timing_risk_bars: default_timing_bars(),
            thin_top_size: default_thin_top(),
        }
    }
}

fn default_reference_order() -> f64 {
    1_000.0
}

fn default_impact_lambda() -> f64 {
    0.3
}

fn default_timing_bars() -> usize {
    20
}

fn default_thin_top() -> f64 {
    500.0
}

/// Scores execution conditions for a reference order size
#[derive(Debug, Clone, Default)]
pub struct ExecutionAnalyzer {
    config: ExecutionConfig,
}

impl ExecutionAnalyzer {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        book: &OrderBook,
        candles: &[Candle],
        flow: &OrderFlowMetrics,
        liquidity: &LiquidityMetrics,
    ) -> ExecutionQuality {
        let mid = book.mid_price().unwrap_or(0.0);
        let expected_slippage_pct =
            self.walk_book(book, self.config.reference_order_size, TradeDirection::Buy, mid);

        let total_depth = liquidity.total_depth();
        let market_impact_pct = if total_depth > 0.0 {
            self.config.impact_lambda * self.config.reference_order_size / total_depth
        } else {
            1.0
        };

        let timing_risk = bar_return_std(candles, self.config.timing_risk_bars).unwrap_or(0.0);
        let sweep_risk = self.sweep_risk(book, flow);

        let score = self.score(
            expected_slippage_pct,
            market_impact_pct,
            timing_risk,
            sweep_risk,
            liquidity,
        );

        debug!(
            slippage_bps = format!("{:.1}", expected_slippage_pct * 10_000.0),
            score = format!("{:.0}", score),
            sweep_risk = format!("{:.2}", sweep_risk),
            "Execution quality evaluated"
        );

        ExecutionQuality {
            expected_slippage_pct,
            market_impact_pct,
            timing_risk,
            sweep_risk,
            score,
        }
    }

    /// Average fill price vs mid for a marketable order of `size`.
    fn walk_book(
        &self,
        book: &OrderBook,
        size: f64,
        direction: TradeDirection,
        mid: f64,
    ) -> f64 {
        if mid <= 0.0 || size <= 0.0 {
            return 0.0;
        }
        let levels = match direction {
            TradeDirection::Buy => &book.asks,
            TradeDirection::Sell => &book.bids,
        };
        if levels.is_empty() {
            return 1.0;
        }

        let mut remaining = size;
        let mut notional = 0.0;
        for level in levels {
            let take = remaining.min(level.size);
            notional += take * level.price;
            remaining -= take;
            if remaining <= 0.0 {
                break;
            }
        }
        if remaining > 0.0 {
            // Book exhausted: charge the worst level for the remainder.
            let worst = levels.last().map(|l| l.price).unwrap_or(mid);
            notional += remaining * worst * 1.01;
        }
        let avg_fill = notional / size;
        ((avg_fill - mid) / mid).abs()
    }

    /// Sweep risk from imbalance, thin top-of-book and aggression.
    fn sweep_risk(&self, book: &OrderBook, flow: &OrderFlowMetrics) -> f64 {
        let top_size = match (book.bids.first(), book.asks.first()) {
            (Some(bid), Some(ask)) => bid.size.min(ask.size),
            (Some(bid), None) => bid.size,
            (None, Some(ask)) => ask.size,
            (None, None) => 0.0,
        };
        let thin_top = if top_size < self.config.thin_top_size {
            1.0 - (top_size / self.config.thin_top_size).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (0.4 * flow.imbalance.abs() + 0.35 * thin_top + 0.25 * flow.aggressive_ratio)
            .clamp(0.0, 1.0)
    }

    fn score(
        &self,
        slippage_pct: f64,
        impact_pct: f64,
        timing_risk: f64,
        sweep_risk: f64,
        liquidity: &LiquidityMetrics,
    ) -> f64 {
        let mut score = 100.0;
        score -= (slippage_pct * 10_000.0) * 2.0; // 2 points per bp of slippage
        score -= (impact_pct * 10_000.0) * 1.5;
        score -= (timing_risk * 1_000.0).min(20.0);
        score -= sweep_risk * 25.0;
        score -= liquidity.toxicity * 20.0;
        if liquidity.resilience > 0.2 {
            score += 5.0;
        }
        score.clamp(0.0, 100.0)
    }
}

/// Standard deviation of bar-to-bar returns over the last `bars` candles.
fn bar_return_std(candles: &[Candle], bars: usize) -> Option<f64> {
    if candles.len() < 3 {
        return None;
    }
    let start = candles.len().saturating_sub(bars + 1);
    let closes: Vec<f64> = candles[start..].iter().map(|c| c.close).collect();
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|p| p[0] != 0.0)
        .map(|p| (p[1] - p[0]) / p[0])
        .collect();
    if returns.len() < 2 {
        return None;
    }
    Some(returns.iter().copied().std_dev())
}
