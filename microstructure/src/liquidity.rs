// Liquidity Analysis
// Book depth, resilience and toxicity metrics from order-book snapshots

use common::OrderBook;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Liquidity metrics for a single book snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    pub bid_depth: f64,
    pub ask_depth: f64,
    /// Bid/ask depth imbalance in [-1, 1]
    pub depth_imbalance: f64,
    pub avg_order_size: f64,
    /// Resting size within 0.1% of the mid price
    pub near_mid_depth: f64,
    /// Trend of total liquidity over recent snapshots, in [-1, 1]
    pub resilience: f64,
    /// Composite toxicity score in [0, 1]
    pub toxicity: f64,
    /// Spread as a fraction of mid
    pub spread_pct: f64,
}

impl LiquidityMetrics {
    pub fn total_depth(&self) -> f64 {
        self.bid_depth + self.ask_depth
    }
}

/// Liquidity analyzer tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Band around mid counted as near-mid depth (fraction of mid)
    #[serde(default = "default_near_mid_band")]
    pub near_mid_band: f64,
    /// Snapshots used for the resilience trend
    #[serde(default = "default_resilience_window")]
    pub resilience_window: usize,
    /// Total depth under this is treated as a thin book
    #[serde(default = "default_thin_book_depth")]
    pub thin_book_depth: f64,
    /// Spread change vs previous snapshot that counts as rapid
    #[serde(default = "default_rapid_spread_change")]
    pub rapid_spread_change: f64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            near_mid_band: default_near_mid_band(),
            resilience_window: default_resilience_window(),
            thin_book_depth: default_thin_book_depth(),
            rapid_spread_change: default_rapid_spread_change(),
        }
    }
}

fn default_near_mid_band() -> f64 {
    0.001
}

fn default_resilience_window() -> usize {
    10
}

fn default_thin_book_depth() -> f64 {
    10_000.0
}

fn default_rapid_spread_change() -> f64 {
    0.5
}

/// Computes liquidity metrics from book snapshots plus recent depth and
/// spread history supplied by the owning analyzer.
#[derive(Debug, Clone, Default)]
pub struct LiquidityAnalyzer {
    config: LiquidityConfig,
}

impl LiquidityAnalyzer {
    pub fn new(config: LiquidityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        book: &OrderBook,
        depth_history: &[f64],
        prev_spread_pct: Option<f64>,
    ) -> LiquidityMetrics {
        let bid_depth = book.bid_depth();
        let ask_depth = book.ask_depth();
        let total = bid_depth + ask_depth;

        let depth_imbalance = if total > 0.0 {
            (bid_depth - ask_depth) / total
        } else {
            0.0
        };

        let level_count = book.bids.len() + book.asks.len();
        let avg_order_size = if level_count > 0 {
            total / level_count as f64
        } else {
            0.0
        };

        let mid = book.mid_price().unwrap_or(0.0);
        let near_mid_depth = if mid > 0.0 {
            let band = mid * self.config.near_mid_band;
            let bids: f64 = book
                .bids
                .iter()
                .filter(|l| (mid - l.price) <= band)
                .map(|l| l.size)
                .sum();
            let asks: f64 = book
                .asks
                .iter()
                .filter(|l| (l.price - mid) <= band)
                .map(|l| l.size)
                .sum();
            bids + asks
        } else {
            0.0
        };

        let spread_pct = if mid > 0.0 { book.spread / mid } else { 0.0 };
        let resilience = self.resilience(depth_history);
        let toxicity = self.toxicity(book, total, avg_order_size, spread_pct, prev_spread_pct);

        debug!(
            total_depth = format!("{:.0}", total),
            toxicity = format!("{:.2}", toxicity),
            resilience = format!("{:.2}", resilience),
            "Liquidity snapshot analyzed"
        );

        LiquidityMetrics {
            bid_depth,
            ask_depth,
            depth_imbalance,
            avg_order_size,
            near_mid_depth,
            resilience,
            toxicity,
            spread_pct,
        }
    }

    /// Liquidity-change trend over the recent snapshots, normalized to
    /// [-1, 1]. Positive means the book has been refilling.
    fn resilience(&self, depth_history: &[f64]) -> f64 {
        let window = self.config.resilience_window;
        if depth_history.len() < 2 {
            return 0.0;
        }
        let slice = if depth_history.len() > window {
            &depth_history[depth_history.len() - window..]
        } else {
            depth_history
        };
        let first = slice[0];
        let last = slice[slice.len() - 1];
        if first <= 0.0 {
            return 0.0;
        }
        ((last - first) / first).clamp(-1.0, 1.0)
    }

    fn toxicity(
        &self,
        book: &OrderBook,
        total_depth: f64,
        avg_order_size: f64,
        spread_pct: f64,
        prev_spread_pct: Option<f64>,
    ) -> f64 {
        // Round-number clustering: resting size parked at round prices.
        let round_volume: f64 = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .filter(|l| is_round_price(l.price))
            .map(|l| l.size)
            .sum();
        let round_clustering = if total_depth > 0.0 {
            (round_volume / total_depth).min(1.0)
        } else {
            0.0
        };

        // Large-order clustering: share of levels far above the average size.
        let large_levels = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .filter(|l| avg_order_size > 0.0 && l.size > avg_order_size * 3.0)
            .count();
        let level_count = (book.bids.len() + book.asks.len()).max(1);
        let large_clustering = (large_levels as f64 / level_count as f64 * 3.0).min(1.0);

        let rapid_spread = match prev_spread_pct {
            Some(prev) if prev > 0.0 => {
                let change = (spread_pct - prev).abs() / prev;
                (change / self.config.rapid_spread_change).min(1.0)
            }
            _ => 0.0,
        };

        let thin_book = if total_depth < self.config.thin_book_depth {
            1.0 - (total_depth / self.config.thin_book_depth).clamp(0.0, 1.0)
        } else {
            0.0
        };

        (0.25 * round_clustering + 0.25 * large_clustering + 0.2 * rapid_spread + 0.3 * thin_book)
            .clamp(0.0, 1.0)
    }
}

fn is_round_price(price: f64) -> bool {
    if price <= 0.0 {
        return false;
    }
    // Round to the nearest "00" level for the price's magnitude.
    let magnitude = 10f64.powf(price.abs().log10().floor() - 1.0);
    let rounded = (price / magnitude).round() * magnitude;
    ((price - rounded).abs() / price) < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::BookLevel;

    fn book(bid_sizes: &[f64], ask_sizes: &[f64], spread: f64) -> OrderBook {
        let mid = 100.0;
        OrderBook {
            bids: bid_sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| BookLevel {
                    price: mid - spread / 2.0 - i as f64 * 0.05,
                    size,
                })
                .collect(),
            asks: ask_sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| BookLevel {
                    price: mid + spread / 2.0 + i as f64 * 0.05,
                    size,
                })
                .collect(),
            spread,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_depth_imbalance_sign() {
        let analyzer = LiquidityAnalyzer::default();
        let metrics = analyzer.analyze(&book(&[800.0, 700.0], &[100.0, 100.0], 0.02), &[], None);
        assert!(metrics.depth_imbalance > 0.5);
    }

    #[test]
    fn test_thin_book_raises_toxicity() {
        let analyzer = LiquidityAnalyzer::default();
        let thin = analyzer.analyze(&book(&[500.0], &[500.0], 0.02), &[], None);
        let deep = analyzer.analyze(&book(&[20_000.0], &[20_000.0], 0.02), &[], None);
        assert!(thin.toxicity > deep.toxicity);
    }

    #[test]
    fn test_resilience_tracks_depth_trend() {
        let analyzer = LiquidityAnalyzer::default();
        let b = book(&[5_000.0], &[5_000.0], 0.02);
        let draining = analyzer.analyze(&b, &[20_000.0, 15_000.0, 12_000.0, 8_000.0], None);
        assert!(draining.resilience < 0.0);
        let refilling = analyzer.analyze(&b, &[8_000.0, 12_000.0, 15_000.0, 20_000.0], None);
        assert!(refilling.resilience > 0.0);
    }

    #[test]
    fn test_rapid_spread_change_raises_toxicity() {
        let analyzer = LiquidityAnalyzer::default();
        let b = book(&[5_000.0], &[5_000.0], 0.10);
        let stable = analyzer.analyze(&b, &[], Some(0.001));
        let widened = analyzer.analyze(&b, &[], Some(0.0002));
        assert!(widened.toxicity > stable.toxicity);
    }
}
