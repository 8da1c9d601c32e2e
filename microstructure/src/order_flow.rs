// Order Flow Analysis
// Buy/sell pressure and aggression metrics from recent trade prints

use common::{TradePrint, TradeSide};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregated order-flow metrics over a window of trade prints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderFlowMetrics {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub net_flow: f64,
    pub vwap: f64,
    /// Buy/sell volume imbalance in [-1, 1]
    pub imbalance: f64,
    /// Fraction of volume from outsized prints
    pub aggressive_ratio: f64,
    pub trade_count: usize,
}

impl OrderFlowMetrics {
    /// Neutral metrics when no trade data is available.
    pub fn empty() -> Self {
        Self {
            buy_volume: 0.0,
            sell_volume: 0.0,
            net_flow: 0.0,
            vwap: 0.0,
            imbalance: 0.0,
            aggressive_ratio: 0.0,
            trade_count: 0,
        }
    }
}

/// Order flow analyzer tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowConfig {
    /// Prints this many times the average size count as aggressive
    #[serde(default = "default_aggressive_multiple")]
    pub aggressive_size_multiple: f64,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            aggressive_size_multiple: default_aggressive_multiple(),
        }
    }
}

fn default_aggressive_multiple() -> f64 {
    1.5
}

/// Computes order-flow metrics from trade prints
#[derive(Debug, Clone, Default)]
pub struct OrderFlowAnalyzer {
    config: OrderFlowConfig,
}

impl OrderFlowAnalyzer {
    pub fn new(config: OrderFlowConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, trades: &[TradePrint]) -> OrderFlowMetrics {
        if trades.is_empty() {
            debug!("No trade prints available, order flow is neutral");
            return OrderFlowMetrics::empty();
        }

        let mut buy_volume = 0.0;
        let mut sell_volume = 0.0;
        let mut notional = 0.0;
        let mut total_size = 0.0;

        for trade in trades {
            match trade.side {
                TradeSide::Buy => buy_volume += trade.size,
                TradeSide::Sell => sell_volume += trade.size,
            }
            notional += trade.price * trade.size;
            total_size += trade.size;
        }

        let vwap = if total_size > 0.0 {
            notional / total_size
        } else {
            0.0
        };

        let avg_size = total_size / trades.len() as f64;
        let aggressive_volume: f64 = trades
            .iter()
            .filter(|t| t.size > avg_size * self.config.aggressive_size_multiple)
            .map(|t| t.size)
            .sum();

        let imbalance = if total_size > 0.0 {
            (buy_volume - sell_volume) / total_size
        } else {
            0.0
        };

        OrderFlowMetrics {
            buy_volume,
            sell_volume,
            net_flow: buy_volume - sell_volume,
            vwap,
            imbalance,
            aggressive_ratio: if total_size > 0.0 {
                aggressive_volume / total_size
            } else {
                0.0
            },
            trade_count: trades.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn print(price: f64, size: f64, side: TradeSide) -> TradePrint {
        TradePrint {
            price,
            size,
            side,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_trades_is_neutral() {
        let metrics = OrderFlowAnalyzer::default().analyze(&[]);
        assert_eq!(metrics.imbalance, 0.0);
        assert_eq!(metrics.trade_count, 0);
    }

    #[test]
    fn test_buy_pressure_positive_imbalance() {
        let trades = vec![
            print(100.0, 30.0, TradeSide::Buy),
            print(100.1, 40.0, TradeSide::Buy),
            print(100.0, 10.0, TradeSide::Sell),
        ];
        let metrics = OrderFlowAnalyzer::default().analyze(&trades);
        assert!(metrics.imbalance > 0.5);
        assert_eq!(metrics.net_flow, 60.0);
    }

    #[test]
    fn test_imbalance_bounds() {
        let trades = vec![print(100.0, 50.0, TradeSide::Sell)];
        let metrics = OrderFlowAnalyzer::default().analyze(&trades);
        assert_eq!(metrics.imbalance, -1.0);
    }

    #[test]
    fn test_aggressive_ratio_flags_outsized_prints() {
        let mut trades = vec![print(100.0, 10.0, TradeSide::Buy); 10];
        trades.push(print(100.0, 200.0, TradeSide::Buy));
        let metrics = OrderFlowAnalyzer::default().analyze(&trades);
        assert!(metrics.aggressive_ratio > 0.5);
    }

    #[test]
    fn test_vwap_weighted_by_size() {
        let trades = vec![
            print(100.0, 90.0, TradeSide::Buy),
            print(110.0, 10.0, TradeSide::Sell),
        ];
        let metrics = OrderFlowAnalyzer::default().analyze(&trades);
        assert!((metrics.vwap - 101.0).abs() < 1e-9);
    }
}
